//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::app::AppState;
use crate::bot::RegistryError;
use crate::util::time::uptime_secs;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.client_origin);

    let bot_routes = Router::new()
        .route("/test", get(test_handler))
        .route("/numbers-of-bots", get(count_handler))
        .route("/get-bot/classic", post(create_bot_handler))
        .route("/delete-bot", post(delete_bot_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1/aibot", bot_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS configuration - `*` or a comma-separated origin list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();

    cors.allow_origin(allowed_origins).allow_credentials(true)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_bots: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_bots: state.bots.count(),
    })
}

// ============================================================================
// Bot endpoints
// ============================================================================

async fn test_handler() -> &'static str {
    "Connection reached\n"
}

async fn count_handler(State(state): State<AppState>) -> String {
    format!("Current numbers of bots are: [{}]\n", state.bots.count())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CreateBotRequest {
    name_suffix: String,
    game_id: String,
    difficulty: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateBotResponse {
    bot_id: String,
}

async fn create_bot_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateBotRequest>,
) -> Result<Json<CreateBotResponse>, AppError> {
    if req.game_id.trim().is_empty() {
        return Err(AppError::BadRequest("gameId is required".to_string()));
    }

    if !state.create_limiter.check() {
        warn!(game_id = %req.game_id, "Rate limited bot creation");
        return Err(AppError::RateLimited);
    }

    let bot_id = state
        .bots
        .create(&req.name_suffix, &req.game_id, &req.difficulty)?;

    Ok(Json(CreateBotResponse { bot_id }))
}

/// Body is the bare bot id; a JSON string literal is accepted too
async fn delete_bot_handler(State(state): State<AppState>, body: String) -> String {
    let raw = body.trim();
    let bot_id = serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string());

    if state.bots.remove(&bot_id) {
        info!(bot_id = %bot_id, "Bot deleted on request");
    }

    format!("Deleted bot: {}", bot_id)
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests")]
    RateLimited,
}

impl From<RegistryError> for AppError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::AlreadyExists(_) => AppError::Conflict(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
