//! Registry of live bots, keyed by bot id

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::GameMode;
use crate::ws::DisconnectHandler;

use super::engine::{DecisionEngine, Difficulty, EngineSettings};
use super::instance::{BotIdentity, BotInstance};

/// Registry errors
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Bot already exists: {0}")]
    AlreadyExists(String),
}

/// Where and how new bots connect
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub game_ws_url: String,
    pub mode: GameMode,
    pub engine: EngineSettings,
}

/// Owns every live bot. Bots remove themselves when their connection ends.
pub struct BotRegistry {
    bots: DashMap<String, Arc<BotInstance>>,
    settings: RegistrySettings,
    this: Weak<BotRegistry>,
}

impl BotRegistry {
    pub fn new(settings: RegistrySettings) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            bots: DashMap::new(),
            settings,
            this: this.clone(),
        })
    }

    /// Create a bot and start connecting it to its game.
    ///
    /// Rejects ids that belong to a live bot; the live bot is left alone.
    pub fn create(
        &self,
        name_suffix: &str,
        game_id: &str,
        difficulty: &str,
    ) -> Result<String, RegistryError> {
        let identity = BotIdentity::new(game_id, name_suffix);
        let bot_id = identity.bot_id.clone();
        let difficulty = Difficulty::from_name(difficulty);

        let bot = match self.bots.entry(bot_id.clone()) {
            Entry::Occupied(_) => {
                warn!(bot_id = %bot_id, "Bot id already in use, rejecting");
                return Err(RegistryError::AlreadyExists(bot_id));
            }
            Entry::Vacant(slot) => {
                let instance_id = Uuid::new_v4();
                let engine = DecisionEngine::new(difficulty, self.settings.engine);
                let on_disconnect = self.release_handler(bot_id.clone(), instance_id);
                let bot = BotInstance::new(identity, instance_id, engine, on_disconnect);
                slot.insert(bot.clone());
                bot
            }
        };

        // A remove racing this create has already disconnected the bot, which
        // turns this into a no-op.
        bot.start(&self.settings.game_ws_url, self.settings.mode);

        info!(
            bot_id = %bot_id,
            game_id = %bot.game_id(),
            difficulty = difficulty.as_str(),
            "Created bot"
        );
        Ok(bot_id)
    }

    /// Remove a bot and close its connection. Unknown ids are ignored.
    pub fn remove(&self, bot_id: &str) -> bool {
        match self.bots.remove(bot_id) {
            Some((_, bot)) => {
                bot.disconnect();
                info!(bot_id = %bot_id, game_id = %bot.game_id(), "Removed bot");
                true
            }
            None => {
                debug!(bot_id = %bot_id, "Remove for unknown bot");
                false
            }
        }
    }

    pub fn count(&self) -> usize {
        self.bots.len()
    }

    #[cfg(test)]
    pub fn get(&self, bot_id: &str) -> Option<Arc<BotInstance>> {
        self.bots.get(bot_id).map(|b| b.value().clone())
    }

    /// Disconnect every bot (server shutdown)
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.bots.iter().map(|b| b.key().clone()).collect();
        info!(bots = ids.len(), "Disconnecting all bots");
        for id in ids {
            self.remove(&id);
        }
    }

    /// Disconnect handler for a new bot, bound to its id and instance
    fn release_handler(&self, bot_id: String, instance_id: Uuid) -> DisconnectHandler {
        let registry = self.this.clone();
        Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.release(&bot_id, instance_id);
            }
        })
    }

    /// Connection ended: drop the entry unless it was already removed or now
    /// holds a newer bot with the same id
    fn release(&self, bot_id: &str, instance_id: Uuid) {
        let removed = self
            .bots
            .remove_if(bot_id, |_, bot| bot.instance_id() == instance_id);

        if removed.is_some() {
            info!(bot_id = %bot_id, "Connection closed, removed bot");
        } else {
            debug!(bot_id = %bot_id, "Connection closed for bot no longer registered");
        }
    }
}
