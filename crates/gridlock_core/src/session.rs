//! Session dispatch: one mutual-exclusion domain around the engine.
//!
//! `GridSession` is the cloneable handle a transport holds per connection
//! worker. Each command locks the engine once for the whole
//! evaluate-then-apply sequence, which is the serialization point the
//! arbitration rules rely on; partial locking would reopen the
//! two-winners race.

use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::engine::{GridEngine, DEFAULT_LEADERBOARD_LIMIT};
use crate::protocol::{Audience, ClientCommand, LeaderboardEntry, ServerEvent};

/// Per-connection context assigned by the transport: the stable actor id
/// for the session and the server-chosen color. Name sanitization and
/// color picking are transport concerns and happen before this layer.
#[derive(Debug, Clone)]
pub struct Connection {
    pub actor_id: String,
    pub color: String,
}

impl Connection {
    pub fn new(actor_id: impl Into<String>, color: impl Into<String>) -> Self {
        Self { actor_id: actor_id.into(), color: color.into() }
    }
}

#[derive(Clone)]
pub struct GridSession {
    engine: Arc<Mutex<GridEngine>>,
}

impl GridSession {
    pub fn new(config: EngineConfig) -> Self {
        Self::from_engine(GridEngine::new(config))
    }

    pub fn from_engine(engine: GridEngine) -> Self {
        Self { engine: Arc::new(Mutex::new(engine)) }
    }

    /// Handle one command and return the addressed events the transport
    /// must deliver.
    pub fn handle(&self, conn: &Connection, command: ClientCommand) -> Vec<(Audience, ServerEvent)> {
        let mut engine = self.engine.lock().expect("engine lock poisoned");

        match command {
            ClientCommand::Join { display_name } => {
                let actor = engine.upsert_actor(&conn.actor_id, &display_name, &conn.color);

                vec![
                    (
                        Audience::Requester,
                        ServerEvent::PlayerInfo {
                            id: actor.id,
                            display_name: actor.display_name,
                            color: actor.color,
                        },
                    ),
                    (
                        Audience::Requester,
                        ServerEvent::InitialState { cells: engine.full_state() },
                    ),
                    (Audience::Everyone, leaderboard_event(&engine)),
                ]
            }

            ClientCommand::Claim { x, y } => match engine.apply_claim(&conn.actor_id, x, y) {
                Ok(cell) => vec![
                    (Audience::Everyone, ServerEvent::OwnershipUpdate { cell }),
                    (Audience::Everyone, leaderboard_event(&engine)),
                ],
                Err(reason) => {
                    vec![(Audience::Requester, ServerEvent::ClaimRejected { reason, x, y })]
                }
            },

            ClientCommand::Leave => {
                engine.deregister_actor(&conn.actor_id);
                vec![(Audience::Everyone, leaderboard_event(&engine))]
            }
        }
    }

    /// Handle a raw wire payload. A payload that does not parse is the
    /// protocol-violation class: logged server-side, answered with a
    /// generic fatal error to the requester only, and state is untouched.
    pub fn handle_raw(&self, conn: &Connection, raw: &str) -> Vec<(Audience, ServerEvent)> {
        match ClientCommand::from_json(raw) {
            Ok(command) => self.handle(conn, command),
            Err(err) => {
                log::warn!("protocol violation from {}: {}", conn.actor_id, err);
                vec![(
                    Audience::Requester,
                    ServerEvent::FatalError { message: err.to_string() },
                )]
            }
        }
    }

    /// Run a closure against the locked engine. Tooling hook; transports
    /// should stick to `handle`.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut GridEngine) -> R) -> R {
        let mut engine = self.engine.lock().expect("engine lock poisoned");
        f(&mut engine)
    }
}

fn leaderboard_event(engine: &GridEngine) -> ServerEvent {
    let entries: Vec<LeaderboardEntry> = engine
        .leaderboard(DEFAULT_LEADERBOARD_LIMIT)
        .iter()
        .map(LeaderboardEntry::from)
        .collect();

    ServerEvent::LeaderboardUpdate { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> GridSession {
        GridSession::new(EngineConfig {
            grid_size: 10,
            cooldown_ms: 0,
            lock_ms: 10_000,
            save_debounce_ms: 1_000,
            save_path: None,
        })
    }

    fn join(session: &GridSession, conn: &Connection, name: &str) {
        session.handle(conn, ClientCommand::Join { display_name: name.to_string() });
    }

    #[test]
    fn test_join_onboards_requester_and_broadcasts_ranking() {
        let session = session();
        let conn = Connection::new("u1", "red");

        let events =
            session.handle(&conn, ClientCommand::Join { display_name: "Alice".to_string() });

        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            (Audience::Requester, ServerEvent::PlayerInfo { id, color, .. })
                if id == "u1" && color == "red"
        ));
        assert!(matches!(
            &events[1],
            (Audience::Requester, ServerEvent::InitialState { cells }) if cells.is_empty()
        ));
        assert!(matches!(
            &events[2],
            (Audience::Everyone, ServerEvent::LeaderboardUpdate { entries }) if entries.len() == 1
        ));
    }

    #[test]
    fn test_successful_claim_broadcasts_update_and_ranking() {
        let session = session();
        let conn = Connection::new("u1", "red");
        join(&session, &conn, "Alice");

        let events = session.handle(&conn, ClientCommand::Claim { x: 5, y: 5 });

        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[0],
            (Audience::Everyone, ServerEvent::OwnershipUpdate { cell })
                if cell.owner_id == "u1" && cell.color == "red"
        ));
        assert!(matches!(
            &events[1],
            (Audience::Everyone, ServerEvent::LeaderboardUpdate { entries })
                if entries[0].score == 1
        ));
    }

    #[test]
    fn test_rejection_goes_to_requester_only() {
        let session = session();
        let conn = Connection::new("u1", "red");
        join(&session, &conn, "Alice");

        let events = session.handle(&conn, ClientCommand::Claim { x: 99, y: 99 });

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            (Audience::Requester, ServerEvent::ClaimRejected { x: 99, y: 99, .. })
        ));
    }

    #[test]
    fn test_leave_broadcasts_ranking_without_the_actor() {
        let session = session();
        let conn = Connection::new("u1", "red");
        join(&session, &conn, "Alice");

        let events = session.handle(&conn, ClientCommand::Leave);

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            (Audience::Everyone, ServerEvent::LeaderboardUpdate { entries }) if entries.is_empty()
        ));
    }

    #[test]
    fn test_malformed_payload_gets_fatal_error_and_touches_nothing() {
        let session = session();
        let conn = Connection::new("u1", "red");
        join(&session, &conn, "Alice");

        let events = session.handle_raw(&conn, r#"{"type": "claim", "x": "five"}"#);

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            (Audience::Requester, ServerEvent::FatalError { .. })
        ));
        assert!(session.with_engine(|engine| engine.full_state().is_empty()));
    }

    #[test]
    fn test_simultaneous_claims_on_one_cell_have_exactly_one_winner() {
        let session = session();
        let alice = Connection::new("u1", "red");
        let bob = Connection::new("u2", "blue");
        join(&session, &alice, "Alice");
        join(&session, &bob, "Bob");

        let mut handles = Vec::new();
        for conn in [alice, bob] {
            let session = session.clone();
            handles.push(std::thread::spawn(move || {
                session.handle(&conn, ClientCommand::Claim { x: 5, y: 5 })
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let winners = results
            .iter()
            .filter(|events| {
                matches!(events[0], (Audience::Everyone, ServerEvent::OwnershipUpdate { .. }))
            })
            .count();
        let losers = results
            .iter()
            .filter(|events| {
                matches!(events[0], (Audience::Requester, ServerEvent::ClaimRejected { .. }))
            })
            .count();

        // Never both succeed, never both fail
        assert_eq!(winners, 1);
        assert_eq!(losers, 1);
        assert!(session.with_engine(|engine| engine.full_state().len() == 1));
    }
}
