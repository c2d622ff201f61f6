//! A single running bot: engine + game connection

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::game::{GameMode, GameState, MovementCommand};
use crate::ws::{ClientError, DisconnectHandler, GameClient};
#[cfg(test)]
use crate::ws::session::ClientPhase;

use super::engine::DecisionEngine;
#[cfg(test)]
use super::engine::Difficulty;

/// Who a bot is and which game it plays in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub bot_id: String,
    pub game_id: String,
}

impl BotIdentity {
    /// `bot_` + game id + caller supplied suffix
    pub fn new(game_id: &str, name_suffix: &str) -> Self {
        Self {
            bot_id: format!("bot_{}{}", game_id, name_suffix),
            game_id: game_id.to_string(),
        }
    }
}

/// Fields touched by state updates; one update at a time per bot
struct Brain {
    engine: DecisionEngine,
    current_state: Option<GameState>,
    last_action: Option<Instant>,
}

pub struct BotInstance {
    identity: BotIdentity,
    /// Distinguishes this instance from a later bot reusing the same id
    instance_id: Uuid,
    client: GameClient,
    brain: Mutex<Brain>,
}

impl BotInstance {
    pub fn new(
        identity: BotIdentity,
        instance_id: Uuid,
        engine: DecisionEngine,
        on_disconnect: DisconnectHandler,
    ) -> Arc<Self> {
        let client = GameClient::new(
            identity.bot_id.clone(),
            identity.game_id.clone(),
            on_disconnect,
        );

        Arc::new(Self {
            identity,
            instance_id,
            client,
            brain: Mutex::new(Brain {
                engine,
                current_state: None,
                last_action: None,
            }),
        })
    }

    /// Connect to the game; snapshots are fed back into [`Self::on_state_update`]
    pub fn start(self: &Arc<Self>, game_ws_url: &str, mode: GameMode) {
        let bot = Arc::downgrade(self);
        self.client.connect(
            game_ws_url,
            mode,
            Arc::new(move |state| {
                if let Some(bot) = bot.upgrade() {
                    bot.on_state_update(state);
                }
            }),
        );
    }

    /// Entry point for every snapshot pushed by the server
    ///
    /// A failing update is logged and dropped; the bot keeps playing.
    pub fn on_state_update(&self, state: GameState) {
        let now = Instant::now();
        if catch_unwind(AssertUnwindSafe(|| self.handle_update(state, now))).is_err() {
            error!(bot_id = %self.identity.bot_id, "State update panicked, skipping");
        }
    }

    fn handle_update(&self, state: GameState, now: Instant) {
        let mut brain = self.brain.lock();
        let Brain {
            engine,
            current_state,
            last_action,
        } = &mut *brain;

        let cooldown = engine.cooldown();
        let recompute_due = last_action.map_or(true, |last| now.duration_since(last) > cooldown);

        if recompute_due {
            *last_action = Some(now);
            engine.decide(&state, true);
            *current_state = Some(state);
        }

        let Some(current) = current_state.as_ref() else {
            return;
        };

        let command = engine.decide(current, false);
        if command == MovementCommand::Stay {
            return;
        }

        match self.client.send_command(command) {
            Ok(true) => debug!(bot_id = %self.identity.bot_id, ?command, "Command sent"),
            Ok(false) => {}
            Err(ClientError::QueueFull) => {
                warn!(bot_id = %self.identity.bot_id, ?command, "Outbound queue full, dropping command");
            }
            Err(e) => {
                error!(bot_id = %self.identity.bot_id, error = %e, "Failed to send command");
            }
        }
    }

    /// Leave the game. The disconnect handler removes the bot from its registry.
    pub fn disconnect(&self) {
        info!(bot_id = %self.identity.bot_id, "Disconnecting bot");
        self.client.disconnect();
    }

    pub fn game_id(&self) -> &str {
        &self.identity.game_id
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    #[cfg(test)]
    pub fn difficulty(&self) -> Difficulty {
        self.brain.lock().engine.difficulty()
    }

    #[cfg(test)]
    pub fn phase(&self) -> ClientPhase {
        self.client.phase()
    }
}
