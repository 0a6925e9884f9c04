//! Grid domain types: coordinates, cell ownership records, actor records.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cell coordinate on the square grid.
///
/// Valid coordinates have both components in `[0, size)` for the configured
/// grid size. Wire input arrives as `i32` and is bounds-checked by the
/// engine before a `Coord` is ever built, so a `Coord` held by the store is
/// always in range.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub x: u16,
    pub y: u16,
}

impl Coord {
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Whether both components lie in `[0, size)`.
    pub fn in_bounds(self, size: u16) -> bool {
        self.x < size && self.y < size
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Ownership record for a single captured cell.
///
/// Absence of a record is the unclaimed state. Once a cell has an owner it
/// never transitions back to unclaimed; every later capture overwrites the
/// record in place.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CellOwnership {
    pub coord: Coord,

    /// Identity of the actor holding the cell. A by-value identity, not a
    /// structural reference: the actor record may be gone while this
    /// record lives on.
    pub owner_id: String,

    /// Capturing actor's color at capture time. A visual snapshot; it does
    /// not follow later changes to the actor's color.
    pub color: String,

    /// Capture timestamp, unix milliseconds.
    pub captured_at: u64,

    /// Until this timestamp only `owner_id` may recapture the cell.
    /// Always `captured_at + lock_ms` at creation.
    pub locked_until: u64,
}

impl CellOwnership {
    /// Whether the lock blocks `actor_id` at time `now`.
    ///
    /// The lock only ever blocks actors other than the current owner.
    pub fn is_locked_for(&self, actor_id: &str, now: u64) -> bool {
        self.owner_id != actor_id && now < self.locked_until
    }
}

/// Session-scoped actor state. Created on join, removed on leave, never
/// persisted; on restart the roster rebuilds as actors rejoin.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ActorRecord {
    pub id: String,
    pub display_name: String,
    pub color: String,

    /// Timestamp of the last successful capture, 0 before any.
    pub last_move_at: u64,

    /// Number of cells currently owned. Derived only: recomputed by full
    /// recount after every grid mutation, never incrementally tracked.
    pub score: u32,
}

impl ActorRecord {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            color: color.into(),
            last_move_at: 0,
            score: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coord_bounds() {
        assert!(Coord::new(0, 0).in_bounds(10));
        assert!(Coord::new(9, 9).in_bounds(10));
        assert!(!Coord::new(10, 9).in_bounds(10));
        assert!(!Coord::new(9, 10).in_bounds(10));
        assert!(!Coord::new(0, 0).in_bounds(0));
    }

    #[test]
    fn test_coord_display_matches_map_key_format() {
        assert_eq!(Coord::new(5, 12).to_string(), "5,12");
    }

    #[test]
    fn test_lock_blocks_others_but_never_the_owner() {
        let cell = CellOwnership {
            coord: Coord::new(3, 4),
            owner_id: "u1".to_string(),
            color: "hsl(120, 70%, 60%)".to_string(),
            captured_at: 1_000,
            locked_until: 11_000,
        };

        assert!(cell.is_locked_for("u2", 5_000));
        assert!(!cell.is_locked_for("u2", 11_000)); // lock expired
        assert!(!cell.is_locked_for("u1", 5_000)); // owner bypasses
    }

    #[test]
    fn test_new_actor_starts_unscored() {
        let actor = ActorRecord::new("u1", "Alice", "hsl(10, 70%, 60%)");
        assert_eq!(actor.last_move_at, 0);
        assert_eq!(actor.score, 0);
    }
}
