//! Rejection taxonomy for claim arbitration.
//!
//! `ClaimError` is the closed set of reasons a claim or registration is
//! refused. These are expected outcomes of normal contention: they travel
//! back to the requesting actor as data and are never logged as faults.
//! `ProtocolError` is the smaller malformed-input class, which IS logged
//! server-side.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a claim or registration was refused.
///
/// `Display` renders the user-facing rejection text shown to the actor.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ClaimError {
    /// The actor id has no registered record.
    #[error("User not found")]
    UnknownActor,

    /// A coordinate component falls outside `[0, grid_size)`.
    #[error("Out of bounds")]
    OutOfBounds { x: i32, y: i32 },

    /// The actor captured another cell too recently.
    #[error("Cooldown! Wait {}s", cooldown_secs(.remaining_ms))]
    OnCooldown { remaining_ms: u64 },

    /// Another actor's capture of this cell is still inside its lock
    /// window.
    #[error("Block is locked!")]
    CellLocked,

    /// Strict registration was attempted for an id that already exists.
    #[error("Actor is already registered")]
    DuplicateActor,
}

/// Remaining cooldown rendered to one decimal place of seconds.
fn cooldown_secs(remaining_ms: &u64) -> String {
    format!("{:.1}", *remaining_ms as f64 / 1000.0)
}

/// Malformed input from the wire: a protocol violation rather than game
/// contention. Reported generically to the offending actor, logged
/// server-side, and never allowed to touch shared state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(String),
}
