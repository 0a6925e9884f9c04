// Save/Load system for the grid snapshot
// MessagePack + LZ4 compression with versioning and integrity checks

pub mod error;
pub mod format;
pub mod manager;

pub use error::SaveError;
pub use format::{decompress_and_deserialize, serialize_and_compress, current_timestamp, GridSave};
pub use manager::{load_from_path, save_to_path, SaveScheduler};

pub const SAVE_VERSION: u32 = 1;
