use crate::config::ServerConfig;
use crate::room::RoomHandle;
use crate::signaling::{SignalingService, ws_handler};
use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared state handed to every request handler.
pub struct AppState {
    pub signaling: SignalingService,
    pub room: RoomHandle,
}

impl AppState {
    /// Creates the signaling registry and spawns the room actor.
    pub fn new(config: &ServerConfig) -> Self {
        let signaling = SignalingService::new(config.ice_servers.clone());
        let room = RoomHandle::spawn(
            config.capacity,
            config.mailbox_size,
            Arc::new(signaling.clone()),
        );

        Self { signaling, room }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(status_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.room.stats().await {
        Ok(snapshot) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "connectedUsers": snapshot.total_connected,
                "activeStreamers": snapshot.streamers.len(),
                "viewers": snapshot.viewer_count,
                "availableSlots": snapshot.available_slots,
                "capacity": snapshot.capacity,
                "openSockets": state.signaling.connection_count(),
                "timestamp": Utc::now(),
            })),
        ),
        Err(e) => {
            error!("Status query failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
        }
    }
}

/// Binds `config.bind_addr` and serves until the listener fails.
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(&config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!("Signaling server listening on http://{}", config.bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
