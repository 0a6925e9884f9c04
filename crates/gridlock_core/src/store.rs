//! Ownership Store: the two in-memory maps plus durable snapshotting.
//!
//! Holds the coordinate -> ownership mapping and the actor roster. The
//! arbitration engine is the single logical owner and serializes all
//! access; the store itself does no locking.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::grid::{ActorRecord, CellOwnership, Coord};
use crate::save::{load_from_path, GridSave, SaveError, SaveScheduler};

pub struct OwnershipStore {
    cells: HashMap<Coord, CellOwnership>,
    actors: HashMap<String, ActorRecord>,
    saver: Option<SaveScheduler>,
    save_path: Option<PathBuf>,
}

impl OwnershipStore {
    /// Build a store. `save_path: None` disables persistence (snapshots are
    /// neither loaded nor written).
    pub fn new(save_path: Option<PathBuf>, debounce: Duration) -> Self {
        let saver =
            save_path.clone().map(|path| SaveScheduler::spawn(path, debounce));

        Self { cells: HashMap::new(), actors: HashMap::new(), saver, save_path }
    }

    /// Load the durable snapshot, replacing the in-memory grid.
    ///
    /// A missing or corrupt snapshot is treated as absence: the grid starts
    /// empty and the condition is logged, never propagated. This boundary
    /// deliberately swallows every `SaveError`.
    pub fn load(&mut self) {
        let Some(path) = &self.save_path else { return };

        match load_from_path(path) {
            Ok(save) => {
                self.cells = save.cells.into_iter().map(|cell| (cell.coord, cell)).collect();
                log::info!("Loaded {} blocks from disk", self.cells.len());
            }
            Err(SaveError::FileNotFound { .. }) => {
                log::info!("No snapshot at {:?}, starting with an empty grid", path);
            }
            Err(err) => {
                log::warn!("Failed to load snapshot from {:?}: {}; starting empty", path, err);
            }
        }
    }

    /// Schedule a durable write of the entire grid mapping. Coalesced by
    /// the writer's debounce window; returns immediately.
    pub fn save_async(&self) {
        if let Some(saver) = &self.saver {
            saver.queue(GridSave::new(self.snapshot()));
        }
    }

    /// Persist the pending snapshot without waiting out the debounce
    /// window. Used on graceful shutdown.
    pub fn flush(&self) {
        if let Some(saver) = &self.saver {
            saver.flush();
        }
    }

    /// Consistent owned copy of the full grid mapping, ordered by
    /// coordinate for a stable wire representation.
    pub fn snapshot(&self) -> Vec<CellOwnership> {
        let mut cells: Vec<CellOwnership> = self.cells.values().cloned().collect();
        cells.sort_by_key(|cell| cell.coord);
        cells
    }

    pub fn cell(&self, coord: Coord) -> Option<&CellOwnership> {
        self.cells.get(&coord)
    }

    /// Create or overwrite the ownership record at the cell's coordinate.
    pub fn put_cell(&mut self, cell: CellOwnership) {
        self.cells.insert(cell.coord, cell);
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn actor(&self, id: &str) -> Option<&ActorRecord> {
        self.actors.get(id)
    }

    pub fn actor_mut(&mut self, id: &str) -> Option<&mut ActorRecord> {
        self.actors.get_mut(id)
    }

    pub fn put_actor(&mut self, actor: ActorRecord) {
        self.actors.insert(actor.id.clone(), actor);
    }

    /// Idempotent: removing an unknown id is a no-op.
    pub fn remove_actor(&mut self, id: &str) -> bool {
        self.actors.remove(id).is_some()
    }

    pub fn actors(&self) -> impl Iterator<Item = &ActorRecord> {
        self.actors.values()
    }

    /// Recompute every actor's score as the exact count of cells they own.
    ///
    /// Full recount, not incremental: stays correct regardless of how many
    /// records changed owner, including the overwrite-of-another-owner case.
    /// Cells owned by departed actors count for nobody.
    pub fn recount_scores(&mut self) {
        for actor in self.actors.values_mut() {
            actor.score = 0;
        }

        for cell in self.cells.values() {
            if let Some(actor) = self.actors.get_mut(&cell.owner_id) {
                actor.score += 1;
            }
        }
    }
}
