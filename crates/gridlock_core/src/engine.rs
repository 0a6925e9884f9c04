//! Capture arbitration: the single authority deciding and applying claim
//! attempts.
//!
//! Every operation takes `&mut self` (or `&self` for pure reads); callers
//! provide the mutual-exclusion domain. [`crate::session::GridSession`]
//! wraps the engine in one `Mutex` so the whole evaluate-then-apply
//! sequence runs without interleaving.

use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::ClaimError;
use crate::grid::{ActorRecord, CellOwnership, Coord};
use crate::save::current_timestamp;
use crate::store::OwnershipStore;

/// Broadcast payloads stay bounded under high churn.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 5;

pub struct GridEngine {
    config: EngineConfig,
    store: OwnershipStore,
}

impl GridEngine {
    /// Build the engine and load the durable snapshot if persistence is
    /// configured. Never fails: a missing or corrupt snapshot means an
    /// empty grid.
    pub fn new(config: EngineConfig) -> Self {
        let mut store = OwnershipStore::new(
            config.save_path.clone(),
            Duration::from_millis(config.save_debounce_ms),
        );
        store.load();

        Self { config, store }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Strict registration: refuses an id that is already present.
    pub fn register_actor(
        &mut self,
        id: &str,
        display_name: &str,
        color: &str,
    ) -> Result<ActorRecord, ClaimError> {
        if self.store.actor(id).is_some() {
            return Err(ClaimError::DuplicateActor);
        }

        let actor = ActorRecord::new(id, display_name, color);
        self.store.put_actor(actor.clone());
        self.store.recount_scores();
        log::debug!("actor {} registered as {:?}", id, display_name);

        Ok(self.store.actor(id).cloned().unwrap_or(actor))
    }

    /// Rejoin-friendly registration: an existing id gets its display
    /// attributes refreshed and keeps `last_move_at`, so a reconnecting
    /// actor neither dodges cooldown nor loses captured territory.
    pub fn upsert_actor(&mut self, id: &str, display_name: &str, color: &str) -> ActorRecord {
        match self.store.actor_mut(id) {
            Some(actor) => {
                actor.display_name = display_name.to_string();
                actor.color = color.to_string();
                log::debug!("actor {} rejoined as {:?}", id, display_name);
            }
            None => {
                self.store.put_actor(ActorRecord::new(id, display_name, color));
                log::debug!("actor {} joined as {:?}", id, display_name);
            }
        }

        // Restores the score of a returning actor whose cells survived the
        // disconnect
        self.store.recount_scores();

        self.store.actor(id).cloned().expect("actor present after upsert")
    }

    /// Idempotent: deregistering an unknown id is a no-op. Cells captured
    /// by the actor stay owned by the departed id.
    pub fn deregister_actor(&mut self, id: &str) {
        if self.store.remove_actor(id) {
            log::debug!("actor {} left", id);
        }
    }

    /// Pure decision for a claim attempt at the current time.
    pub fn evaluate_claim(&self, id: &str, x: i32, y: i32) -> Result<(), ClaimError> {
        self.evaluate_claim_at(id, x, y, current_timestamp())
    }

    /// Pure decision at an explicit `now` (unix milliseconds).
    ///
    /// Checks run in order and short-circuit on the first failure:
    /// unknown actor, bounds, cooldown, lock. The lock only blocks actors
    /// other than the cell's current owner.
    pub fn evaluate_claim_at(&self, id: &str, x: i32, y: i32, now: u64) -> Result<(), ClaimError> {
        let actor = self.store.actor(id).ok_or(ClaimError::UnknownActor)?;

        let size = i32::from(self.config.grid_size);
        if x < 0 || y < 0 || x >= size || y >= size {
            return Err(ClaimError::OutOfBounds { x, y });
        }

        let elapsed = now.saturating_sub(actor.last_move_at);
        if elapsed < self.config.cooldown_ms {
            return Err(ClaimError::OnCooldown {
                remaining_ms: self.config.cooldown_ms - elapsed,
            });
        }

        let coord = Coord::new(x as u16, y as u16);
        if let Some(cell) = self.store.cell(coord) {
            if cell.is_locked_for(id, now) {
                return Err(ClaimError::CellLocked);
            }
        }

        Ok(())
    }

    /// Decide and apply a claim at the current time.
    pub fn apply_claim(&mut self, id: &str, x: i32, y: i32) -> Result<CellOwnership, ClaimError> {
        self.apply_claim_at(id, x, y, current_timestamp())
    }

    /// Decide and apply a claim at an explicit `now`.
    ///
    /// Re-runs the full evaluation first: under the caller's lock this
    /// makes check-then-act one atomic unit, so two concurrent attempts on
    /// the same cell cannot both pass.
    pub fn apply_claim_at(
        &mut self,
        id: &str,
        x: i32,
        y: i32,
        now: u64,
    ) -> Result<CellOwnership, ClaimError> {
        self.evaluate_claim_at(id, x, y, now)?;

        let actor = self.store.actor_mut(id).ok_or(ClaimError::UnknownActor)?;
        actor.last_move_at = now;
        let color = actor.color.clone();

        let cell = CellOwnership {
            coord: Coord::new(x as u16, y as u16),
            owner_id: id.to_string(),
            color,
            captured_at: now,
            locked_until: now + self.config.lock_ms,
        };

        self.store.put_cell(cell.clone());
        self.store.recount_scores();
        self.store.save_async();

        Ok(cell)
    }

    /// Top `limit` actor records by score, descending. Tie order is
    /// unspecified.
    pub fn leaderboard(&self, limit: usize) -> Vec<ActorRecord> {
        let mut actors: Vec<ActorRecord> = self.store.actors().cloned().collect();
        actors.sort_by(|a, b| b.score.cmp(&a.score));
        actors.truncate(limit);
        actors
    }

    /// Full grid snapshot for onboarding a newly joined actor.
    pub fn full_state(&self) -> Vec<CellOwnership> {
        self.store.snapshot()
    }

    /// Push the pending snapshot to disk without waiting out the debounce
    /// window. Dropping the engine does this too.
    pub fn flush(&self) {
        self.store.flush();
    }
}
