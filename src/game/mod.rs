//! Game domain types observed and produced by bots

pub mod state;

pub use state::{Ball, GameMode, GameState, MatchStatus, MovementCommand, Paddle, Point, Velocity};

/// Court width in game units
pub const COURT_WIDTH: i32 = 900;
/// Court height in game units
pub const COURT_HEIGHT: i32 = 550;
/// Vertical center of the court
pub const COURT_CENTER_Y: i32 = COURT_HEIGHT / 2;
/// Paddle travel per movement command
pub const PADDLE_STEP: i32 = 10;
