use super::state::AppState;
use crate::protocol::ServerStatus;
use crate::session::{ServerSession, SessionConfig, SessionStats};
use crate::transport::{axum_ws, CloseInfo, Outbound};
use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use futures::SinkExt;
use tracing::{error, info, info_span, Instrument};

/// GET {ws_path}
/// Upgrade to a streaming session
pub async fn stream_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let limit = state.config.max_message_size;

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let config = SessionConfig::from_server(&state.config);
    let session_id = config.session_id.clone();
    let span = info_span!("session", id = %session_id);

    async move {
        let (mut tx, rx) = axum_ws::split(socket);

        let engine = match state.engines.create() {
            Ok(engine) => engine,
            Err(e) => {
                error!("Failed to create render engine: {}", e);
                let status = ServerStatus::Error {
                    message: format!("Failed to create render engine: {}", e),
                };
                if let Ok(text) = serde_json::to_string(&status) {
                    let _ = tx.send(Outbound::Text(text)).await;
                }
                let _ = tx
                    .send(Outbound::Close(CloseInfo::internal_error("engine unavailable")))
                    .await;
                return;
            }
        };

        let session = ServerSession::new(config, engine);

        // Register for diagnostics
        {
            let mut sessions = state.sessions.write().await;
            sessions.insert(session_id.clone(), session.counters());
        }
        info!("Client connected");

        let result = session.run(tx, rx).await;

        {
            let mut sessions = state.sessions.write().await;
            sessions.remove(&session_id);
        }

        match result {
            Ok(stats) => info!("Client session ended after {:.1}s", stats.duration_secs),
            Err(e) => error!("Client session ended with error: {}", e),
        }
    }
    .instrument(span)
    .await
}

/// GET /sessions
/// Counters of every live session
pub async fn list_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let sessions = state.sessions.read().await;

    let mut stats: Vec<SessionStats> = sessions
        .values()
        .map(|counters| counters.snapshot())
        .collect();
    stats.sort_by(|a, b| a.started_at.cmp(&b.started_at));

    (StatusCode::OK, Json(stats))
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Number of live sessions, for logging on shutdown
pub(crate) async fn live_sessions(state: &AppState) -> usize {
    state.sessions.read().await.len()
}
