//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::app::AppState;
use crate::config::DisplaySettings;
use crate::game::player::PlayerId;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::MatchPhase;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/settings", get(settings_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// `*` allows any origin, otherwise a comma-separated list
fn cors_layer(client_origin: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if client_origin.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let allowed_origins: Vec<HeaderValue> = client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<HeaderValue>().ok())
        .collect();
    cors.allow_origin(allowed_origins)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    connected_players: usize,
    phase: MatchPhase,
    tick: u64,
    sessions: Vec<SessionInfo>,
}

#[derive(Serialize)]
struct SessionInfo {
    conn_id: String,
    player_id: PlayerId,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.game.status();

    let mut sessions: Vec<SessionInfo> = state
        .sessions
        .iter()
        .map(|entry| SessionInfo {
            conn_id: entry.key().to_string(),
            player_id: *entry.value(),
        })
        .collect();
    sessions.sort_by_key(|session| session.player_id);

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        connected_players: status.players,
        phase: status.phase,
        tick: status.tick,
        sessions,
    })
}

// ============================================================================
// Display settings for views
// ============================================================================

async fn settings_handler(State(state): State<AppState>) -> Json<DisplaySettings> {
    Json(state.config.display.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state() -> AppState {
        let config = Config::from_lookup(|_| None).unwrap();
        AppState::new(config).unwrap().0
    }

    #[tokio::test]
    async fn health_reports_match_status() {
        let Json(health) = health_handler(State(state())).await;
        let json = serde_json::to_value(health).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["connected_players"], 0);
        assert_eq!(json["phase"], "waiting");
        assert_eq!(json["tick"], 0);
        assert_eq!(json["sessions"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn health_lists_seated_sessions_by_seat() {
        let state = state();
        let first = uuid::Uuid::new_v4();
        let second = uuid::Uuid::new_v4();
        state.sessions.insert(second, 1);
        state.sessions.insert(first, 0);

        let Json(health) = health_handler(State(state)).await;
        let json = serde_json::to_value(health).unwrap();
        assert_eq!(
            json["sessions"],
            serde_json::json!([
                {"conn_id": first.to_string(), "player_id": 0},
                {"conn_id": second.to_string(), "player_id": 1},
            ])
        );
    }

    #[tokio::test]
    async fn settings_expose_display_config() {
        let Json(display) = settings_handler(State(state())).await;
        let json = serde_json::to_value(display).unwrap();
        assert_eq!(json["tile_size"], 50);
        assert_eq!(json["colors"]["background"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn origin_lists_build_without_panicking() {
        let _ = cors_layer("*");
        let _ = cors_layer("http://localhost:3000, https://arena.example");
    }
}
