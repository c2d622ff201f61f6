//! Application state shared across routes

use std::sync::Arc;

use crate::bot::{BotRegistry, EngineSettings, RegistrySettings};
use crate::config::Config;
use crate::game::GameMode;
use crate::util::rate_limit::CreateRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub bots: Arc<BotRegistry>,
    pub create_limiter: CreateRateLimiter,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let bots = BotRegistry::new(RegistrySettings {
            game_ws_url: config.game_ws_url.clone(),
            mode: GameMode::Classic,
            engine: EngineSettings {
                player_offset: config.player_offset,
            },
        });

        let create_limiter = CreateRateLimiter::new(config.bot_create_rate_limit);

        Self {
            config,
            bots,
            create_limiter,
        }
    }
}
