//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::grid::{Cell, GridPos};
use crate::game::player::{BombVariant, PlayerId};

/// Buttons held by a view for the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub place_bomb: bool,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Controller state for the next tick
    Input { controller: ControllerInput },

    /// Start a new match after one has been decided
    Rematch,
}

/// Untagged `{"controller": {...}}` frame sent by plain views
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BareFrame {
    controller: ControllerInput,
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported frame: {0}")]
    Unsupported(String),
}

/// Parse a text frame from a client. Accepts the tagged envelope or a
/// bare controller frame.
pub fn parse_client_frame(text: &str) -> Result<ClientMsg, ProtocolError> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("type").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    if value.get("controller").is_some() {
        let frame: BareFrame = serde_json::from_value(value)?;
        return Ok(ClientMsg::Input {
            controller: frame.controller,
        });
    }
    Err(ProtocolError::Unsupported(text.chars().take(64).collect()))
}

/// Match phase as seen by views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Fewer than two players seated
    Waiting,
    InProgress,
    /// A winner was declared, waiting for a rematch
    Ended,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Seat assignment after connection
    Assigned {
        player_id: PlayerId,
        width: usize,
        height: usize,
    },

    /// Full world state, sent every tick
    Snapshot(Box<WorldSnapshot>),

    /// Error message
    Error { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldSnapshot {
    /// Server tick number
    pub tick: u64,
    pub players: Vec<PlayerSnapshot>,
    pub bombs: Vec<BombSnapshot>,
    pub explosions: Vec<ExplosionSnapshot>,
    /// Cell codes, row-major
    pub map: Vec<Vec<Cell>>,
    pub map_name: String,
    pub lives: [u32; 2],
    pub phase: MatchPhase,
    pub winner: Option<PlayerId>,
    /// Events that occurred since last snapshot
    pub events: Vec<GameEvent>,
    /// Server wall clock, seconds
    pub timestamp: f64,
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub pixel_x: f32,
    pub pixel_y: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct BombSnapshot {
    pub x: i32,
    pub y: i32,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplosionSnapshot {
    pub sectors: Vec<GridPos>,
    pub bomb_type: BombVariant,
}

/// Game events, drained into the next snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    PlayerJoined { player_id: PlayerId },

    PlayerLeft { player_id: PlayerId },

    BombPlaced { player_id: PlayerId, x: i32, y: i32 },

    BombExploded {
        player_id: PlayerId,
        x: i32,
        y: i32,
        /// Detonated by another blast rather than its own fuse
        chained: bool,
    },

    PlayerHit {
        player_id: PlayerId,
        /// Owner of the blast
        by: PlayerId,
        lives_left: u32,
    },

    RoundReset { map_index: usize, map_name: String },

    MatchStarted,

    MatchEnded { winner: Option<PlayerId> },

    /// All lives restored after a player ran out
    GameReset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_controller_frame_is_accepted() {
        let msg = parse_client_frame(
            r#"{"controller":{"up":false,"down":true,"left":false,"right":false,"place_bomb":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMsg::Input {
                controller: ControllerInput {
                    down: true,
                    place_bomb: true,
                    ..Default::default()
                }
            }
        );
    }

    #[test]
    fn tagged_frames_are_accepted() {
        let msg = parse_client_frame(r#"{"type":"input","controller":{"left":true}}"#).unwrap();
        assert_eq!(
            msg,
            ClientMsg::Input {
                controller: ControllerInput {
                    left: true,
                    ..Default::default()
                }
            }
        );
        assert_eq!(
            parse_client_frame(r#"{"type":"rematch"}"#).unwrap(),
            ClientMsg::Rematch
        );
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert!(parse_client_frame("not json").is_err());
        assert!(parse_client_frame(r#"{"buttons":{}}"#).is_err());
        assert!(parse_client_frame(r#"{"controller":{"jump":true}}"#).is_err());
        assert!(parse_client_frame(r#"{"controller":{"up":"yes"}}"#).is_err());
        assert!(parse_client_frame(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn error_message_carries_reason() {
        let json = serde_json::to_value(ServerMsg::Error {
            error: "Server full".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "Server full");
    }

    #[test]
    fn events_are_tagged() {
        let json = serde_json::to_value(GameEvent::PlayerHit {
            player_id: 1,
            by: 0,
            lives_left: 2,
        })
        .unwrap();
        assert_eq!(json["event_type"], "player_hit");
        assert_eq!(json["lives_left"], 2);
    }
}
