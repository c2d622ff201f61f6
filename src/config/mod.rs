//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

use crate::bot::engine::DEFAULT_PLAYER_OFFSET;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable text
    pub log_json: bool,

    /// Game gateway WebSocket base URL; bots connect to `{url}/{mode}?playerId={id}`
    pub game_ws_url: String,
    /// Paddle inset from the court edge, used by the decision engines
    pub player_offset: i32,

    /// Allowed client origins for CORS (comma-separated, `*` for any)
    pub client_origin: String,
    /// Bot creations accepted per second
    pub bot_create_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        // Hosted platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = match var("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => var("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: var("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_json: var("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),

            game_ws_url: var("GAME_WS_URL")
                .unwrap_or_else(|| "ws://gateway-service:3000/ws".to_string()),
            player_offset: parse_or(&var, "PLAYER_OFFSET", DEFAULT_PLAYER_OFFSET)?,

            client_origin: var("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),
            bot_create_rate_limit: parse_or(&var, "BOT_CREATE_RATE_LIMIT", 10)?,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidNumber(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid number in environment variable: {0}")]
    InvalidNumber(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
