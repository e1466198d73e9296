//! Dabble WebSocket relay server
//!
//! Relays draw events between the clients viewing the same drawing and
//! keeps enough state (last snapshot plus recent events) for late joiners
//! to catch up.
//!
//! ## Routes
//!
//! - `GET /` banner, `GET /health` liveness check
//! - `GET /get-uuid` mints a session id: `{ "uuid": "3f2a..." }`
//! - `GET /ws` WebSocket; join with `{ "type": "join", "session": "..." }`
//!   or `{ "type": "share" }`
//! - `GET /ws/{session}` WebSocket joined to `session` on connect

pub mod config;
mod error;
mod relay;
mod rooms;

pub use config::ServerConfig;
pub use error::ServerError;
pub use rooms::AppState;

use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use dabble_core::session::SessionId;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the HTTP router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/get-uuid", get(get_uuid))
        .route("/ws", get(ws_handler))
        .route("/ws/{session}", get(ws_session_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve on an already bound listener.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Bind the configured address and serve until the process stops.
pub async fn run(config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| ServerError::Bind {
            addr: config.bind,
            source,
        })?;

    let addr = listener.local_addr()?;
    info!("Dabble relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);
    info!(
        "History limit {} events, channel capacity {}",
        config.history_limit, config.channel_capacity
    );

    serve(listener, Arc::new(AppState::new(config))).await
}

/// Index page
async fn index() -> &'static str {
    "Dabble Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// Mint a session id for clients that share over HTTP.
async fn get_uuid() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "uuid": SessionId::generate().to_string() }))
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| relay::handle_socket(socket, state, None))
}

/// WebSocket upgrade joined to the session named in the path.
async fn ws_session_handler(
    ws: WebSocketUpgrade,
    Path(session): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    match SessionId::parse(&session) {
        Ok(session) => ws.on_upgrade(move |socket| relay::handle_socket(socket, state, Some(session))),
        Err(e) => {
            warn!("Rejected session path {:?}: {}", session, e);
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}
