//! Decision engines: game snapshot + memory -> paddle command

use std::time::Duration;

use crate::game::{GameState, MovementCommand, COURT_CENTER_Y, COURT_WIDTH, PADDLE_STEP};

use super::prediction::project_intercept;

/// Default paddle inset from the court edge
pub const DEFAULT_PLAYER_OFFSET: i32 = 20;

/// Dead zone around the target inside which the paddle holds still
pub const HYSTERESIS_BAND: i32 = 15;

const EASY_COOLDOWN: Duration = Duration::from_millis(1000);

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Difficulty {
    #[default]
    Easy,
}

impl Difficulty {
    /// Resolve a requested difficulty by name. Unknown names fall back to
    /// the default level.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            _ => Difficulty::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
        }
    }
}

/// Tunables shared by every engine, fixed at startup
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Distance of each paddle from its court edge
    pub player_offset: i32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            player_offset: DEFAULT_PLAYER_OFFSET,
        }
    }
}

/// Per-bot scratch state carried between decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionMemory {
    /// Paddle position as last read from the server, then advanced by the
    /// commands issued since
    pub last_known_paddle_y: i32,
    pub target_y: i32,
    /// Server timestamp of the last recompute
    pub last_decision_timestamp: i64,
}

impl Default for DecisionMemory {
    fn default() -> Self {
        Self {
            last_known_paddle_y: COURT_CENTER_Y,
            target_y: COURT_CENTER_Y,
            last_decision_timestamp: 0,
        }
    }
}

/// A bot's decision strategy, one variant per difficulty
#[derive(Debug, Clone)]
pub enum DecisionEngine {
    Easy(EasyStrategy),
}

impl DecisionEngine {
    pub fn new(difficulty: Difficulty, settings: EngineSettings) -> Self {
        match difficulty {
            Difficulty::Easy => DecisionEngine::Easy(EasyStrategy::new(settings)),
        }
    }

    /// Decide the next command.
    ///
    /// `recompute` marks a tick allowed to refresh the target; other calls
    /// only derive a command from what is already remembered.
    pub fn decide(&mut self, state: &GameState, recompute: bool) -> MovementCommand {
        match self {
            DecisionEngine::Easy(strategy) => strategy.decide(state, recompute),
        }
    }

    /// Minimum interval between recompute ticks
    pub fn cooldown(&self) -> Duration {
        match self {
            DecisionEngine::Easy(_) => EASY_COOLDOWN,
        }
    }

    #[cfg(test)]
    pub fn difficulty(&self) -> Difficulty {
        match self {
            DecisionEngine::Easy(_) => Difficulty::Easy,
        }
    }

    #[cfg(test)]
    pub fn memory(&self) -> &DecisionMemory {
        match self {
            DecisionEngine::Easy(strategy) => &strategy.memory,
        }
    }
}

/// Linear intercept prediction with a single wall fold, recentering while
/// the ball travels away
#[derive(Debug, Clone)]
pub struct EasyStrategy {
    memory: DecisionMemory,
    player_offset: i32,
}

impl EasyStrategy {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            memory: DecisionMemory::default(),
            player_offset: settings.player_offset,
        }
    }

    fn decide(&mut self, state: &GameState, recompute: bool) -> MovementCommand {
        let moving_away = self.ball_moving_away(state);

        if recompute {
            self.memory.last_known_paddle_y = state.me.position.y;
            self.memory.last_decision_timestamp = state.timestamp;
            if !moving_away {
                self.memory.target_y = project_intercept(&state.ball, state.me.position.x);
            }
        }

        if moving_away {
            self.memory.target_y = COURT_CENTER_Y;
        }

        self.step_towards_target()
    }

    /// The paddle sits on its boundary line and the ball heads for the far side
    fn ball_moving_away(&self, state: &GameState) -> bool {
        let paddle_x = state.me.position.x;
        let vx = state.ball.velocity.vx;

        (paddle_x == self.player_offset && vx > 0)
            || (paddle_x == COURT_WIDTH - self.player_offset && vx < 0)
    }

    fn step_towards_target(&mut self) -> MovementCommand {
        let paddle_y = self.memory.last_known_paddle_y;
        let target_y = self.memory.target_y;

        // wire values saturate at the i32 bounds, so the band must too
        if target_y < paddle_y.saturating_sub(HYSTERESIS_BAND) {
            self.memory.last_known_paddle_y = paddle_y.saturating_sub(PADDLE_STEP);
            MovementCommand::MoveUp
        } else if target_y > paddle_y.saturating_add(HYSTERESIS_BAND) {
            self.memory.last_known_paddle_y = paddle_y.saturating_add(PADDLE_STEP);
            MovementCommand::MoveDown
        } else {
            MovementCommand::Stay
        }
    }
}
