//! Game gateway wire messages
//! These are the JSON shapes exchanged with the game server over WebSocket

use serde::{Deserialize, Deserializer, Serialize};

use crate::game::{Ball, GameState, MatchStatus, Paddle, Point, Velocity};

/// Notification type sent by the classic game mode
pub const CLASSIC_NOTIFICATION: &str = "classic_notification";
/// Periodic game snapshot type
pub const GAME_STATE: &str = "game_state";

/// Minimal view of any inbound frame, used to route it
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Inbound frames the bot reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Server matched the bot into a game and waits for it to be ready
    Connected,
    /// Game is over
    Finished,
    /// Game snapshot while playing
    GameState,
    /// Anything else; accepted on the wire and ignored
    Other {
        kind: Option<String>,
        status: Option<String>,
    },
}

impl Envelope {
    pub fn classify(&self) -> Inbound {
        match (self.kind.as_deref(), self.status.as_deref()) {
            (Some(CLASSIC_NOTIFICATION), Some("connected")) => Inbound::Connected,
            (Some(CLASSIC_NOTIFICATION), Some("finished")) => Inbound::Finished,
            (Some(GAME_STATE), Some("playing")) => Inbound::GameState,
            _ => Inbound::Other {
                kind: self.kind.clone(),
                status: self.status.clone(),
            },
        }
    }
}

/// Paddle record as sent by the server
#[derive(Debug, Clone, Deserialize)]
pub struct WirePaddle {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "truncated_u32")]
    pub score: u32,
    #[serde(rename = "X", deserialize_with = "truncated_i32")]
    pub x: i32,
    #[serde(rename = "Y", deserialize_with = "truncated_i32")]
    pub y: i32,
    #[serde(default)]
    pub ready: bool,
}

/// Ball record as sent by the server
#[derive(Debug, Clone, Deserialize)]
pub struct WireBall {
    #[serde(deserialize_with = "truncated_i32")]
    pub x: i32,
    #[serde(deserialize_with = "truncated_i32")]
    pub y: i32,
    #[serde(deserialize_with = "truncated_i32")]
    pub vx: i32,
    #[serde(deserialize_with = "truncated_i32")]
    pub vy: i32,
}

/// Full `game_state` frame
#[derive(Debug, Clone, Deserialize)]
pub struct GameStateMsg {
    #[serde(default)]
    pub status: Option<String>,
    pub player: WirePaddle,
    pub opponent: WirePaddle,
    pub ball: WireBall,
    #[serde(default, deserialize_with = "truncated_i64")]
    pub timestamp: i64,
}

/// Messages sent from the bot to the game server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Acknowledges the "connected" notification
    #[serde(rename_all = "camelCase")]
    Ready { player_id: String, game_id: String },

    /// Paddle displacement request
    #[serde(rename_all = "camelCase")]
    PaddleMove {
        bot_id: String,
        game_id: String,
        delta_y: i32,
    },
}

impl MatchStatus {
    pub fn from_wire(status: Option<&str>) -> Self {
        match status {
            Some("finished") => MatchStatus::Finished,
            Some("connecting") | Some("connected") => MatchStatus::Connecting,
            _ => MatchStatus::Playing,
        }
    }
}

impl From<WirePaddle> for Paddle {
    fn from(p: WirePaddle) -> Self {
        Paddle {
            id: p.id,
            name: p.name,
            position: Point { x: p.x, y: p.y },
            score: p.score,
            ready: p.ready,
        }
    }
}

impl From<WireBall> for Ball {
    fn from(b: WireBall) -> Self {
        Ball {
            position: Point { x: b.x, y: b.y },
            velocity: Velocity { vx: b.vx, vy: b.vy },
        }
    }
}

impl From<GameStateMsg> for GameState {
    fn from(msg: GameStateMsg) -> Self {
        GameState {
            status: MatchStatus::from_wire(msg.status.as_deref()),
            me: msg.player.into(),
            opponent: msg.opponent.into(),
            ball: msg.ball.into(),
            timestamp: msg.timestamp,
        }
    }
}

/// Decode a `game_state` frame into a domain snapshot
pub fn decode_game_state(text: &str) -> Result<GameState, serde_json::Error> {
    serde_json::from_str::<GameStateMsg>(text).map(GameState::from)
}

// The server simulates with floating point physics; coordinates are
// truncated toward zero.

fn truncated_i32<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
    f64::deserialize(d).map(|v| v as i32)
}

fn truncated_u32<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
    f64::deserialize(d).map(|v| v as u32)
}

fn truncated_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    f64::deserialize(d).map(|v| v as i64)
}
