//! Engine configuration, fixed at construction.

use serde::Deserialize;
use std::path::PathBuf;

/// Arbitration engine configuration.
///
/// All values are set once when the engine is built; there is no runtime
/// reconfiguration surface. Deserializable so deployments can load it from
/// a JSON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grid side length; both axes run in `[0, grid_size)`.
    pub grid_size: u16,

    /// Minimum wait between an actor's successful captures (milliseconds).
    pub cooldown_ms: u64,

    /// Window after a capture during which only the capturing actor may
    /// recapture that cell (milliseconds).
    pub lock_ms: u64,

    /// Trailing-edge debounce window for snapshot writes (milliseconds).
    pub save_debounce_ms: u64,

    /// Snapshot file location. `None` disables persistence entirely.
    pub save_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            cooldown_ms: 2_000,
            lock_ms: 10_000,
            save_debounce_ms: 1_000,
            save_path: None,
        }
    }
}
