//! Immutable game snapshots as seen by a single bot

use super::PADDLE_STEP;

/// Lifecycle status of a game as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStatus {
    Connecting,
    Playing,
    Finished,
}

/// Game mode a bot joins; selects the gateway endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    Classic,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Classic => "classic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Velocity {
    pub vx: i32,
    pub vy: i32,
}

/// One side of the court
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paddle {
    pub id: String,
    pub name: String,
    pub position: Point,
    pub score: u32,
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ball {
    pub position: Point,
    pub velocity: Velocity,
}

/// Authoritative snapshot pushed by the game server.
///
/// A new snapshot replaces the previous one on every update; nothing mutates
/// a snapshot after it has been decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct GameState {
    pub status: MatchStatus,
    /// The paddle controlled by this bot
    pub me: Paddle,
    pub opponent: Paddle,
    pub ball: Ball,
    pub timestamp: i64,
}

/// Discrete paddle command produced by a decision engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementCommand {
    MoveUp,
    MoveDown,
    Stay,
}

impl MovementCommand {
    /// Vertical displacement requested by this command.
    ///
    /// Screen coordinates grow downwards, so moving up is negative.
    pub fn delta_y(&self) -> i32 {
        match self {
            MovementCommand::MoveUp => -PADDLE_STEP,
            MovementCommand::MoveDown => PADDLE_STEP,
            MovementCommand::Stay => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deltas() {
        assert_eq!(MovementCommand::MoveUp.delta_y(), -10);
        assert_eq!(MovementCommand::MoveDown.delta_y(), 10);
        assert_eq!(MovementCommand::Stay.delta_y(), 0);
    }

    #[test]
    fn test_game_mode_path() {
        assert_eq!(GameMode::default().as_str(), "classic");
    }
}
