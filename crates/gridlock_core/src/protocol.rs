//! Logical message surface between the engine and the transport.
//!
//! The transport (socket server, test harness, bot driver) speaks these
//! types; it never touches the store directly. Everything is serde-tagged
//! JSON so any delivery channel can carry it.

use serde::{Deserialize, Serialize};

use crate::error::{ClaimError, ProtocolError};
use crate::grid::{ActorRecord, CellOwnership};

/// Inbound: actor -> engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    Join { display_name: String },
    Claim { x: i32, y: i32 },
    Leave,
}

impl ClientCommand {
    /// Parse a raw wire payload. Failure is the malformed-input class: the
    /// caller reports it generically and logs it, and no state is touched.
    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|err| ProtocolError::Malformed(err.to_string()))
    }
}

/// Outbound: engine -> transport.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Full grid snapshot, sent once to a newly joined actor.
    InitialState { cells: Vec<CellOwnership> },

    /// The joining actor's assigned identity and display attributes.
    PlayerInfo { id: String, display_name: String, color: String },

    /// Broadcast after every successful claim.
    OwnershipUpdate { cell: CellOwnership },

    /// Broadcast after every join, leave, or successful claim.
    LeaderboardUpdate { entries: Vec<LeaderboardEntry> },

    /// Sent only to the requesting actor.
    ClaimRejected { reason: ClaimError, x: i32, y: i32 },

    /// Conditions outside the rejection taxonomy (malformed input).
    FatalError { message: String },
}

impl ServerEvent {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// One row of the ranked broadcast.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub display_name: String,
    pub color: String,
    pub score: u32,
}

impl From<&ActorRecord> for LeaderboardEntry {
    fn from(actor: &ActorRecord) -> Self {
        Self {
            display_name: actor.display_name.clone(),
            color: actor.color.clone(),
            score: actor.score,
        }
    }
}

/// Who an outbound event is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Only the actor whose command produced the event.
    Requester,
    /// Every connected actor.
    Everyone,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Coord;

    #[test]
    fn test_command_wire_shape() {
        let cmd = ClientCommand::from_json(r#"{"type": "claim", "x": 5, "y": 7}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Claim { x: 5, y: 7 });

        let cmd = ClientCommand::from_json(r#"{"type": "join", "display_name": "Alice"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::Join { display_name: "Alice".to_string() });
    }

    #[test]
    fn test_malformed_commands_rejected() {
        // Wrong shape, missing fields, not JSON at all
        assert!(ClientCommand::from_json(r#"{"type": "claim"}"#).is_err());
        assert!(ClientCommand::from_json(r#"{"type": "warp", "x": 1}"#).is_err());
        assert!(ClientCommand::from_json("not json").is_err());
    }

    #[test]
    fn test_event_round_trip() {
        let event = ServerEvent::OwnershipUpdate {
            cell: CellOwnership {
                coord: Coord::new(5, 5),
                owner_id: "u1".to_string(),
                color: "hsl(120, 70%, 60%)".to_string(),
                captured_at: 1_700_000_000_000,
                locked_until: 1_700_000_010_000,
            },
        };

        let json = event.to_json().unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_rejection_event_carries_structured_reason() {
        let event = ServerEvent::ClaimRejected {
            reason: ClaimError::OnCooldown { remaining_ms: 700 },
            x: 4,
            y: 2,
        };

        let value: serde_json::Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "claim_rejected");
        assert_eq!(value["reason"]["reason"], "on_cooldown");
        assert_eq!(value["reason"]["remaining_ms"], 700);
        assert_eq!(value["x"], 4);
    }
}
