use crate::config::ServerConfig;
use serde::{Deserialize, Serialize};

/// Configuration for one server session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-<uuid>")
    pub session_id: String,

    /// Input sample rate advertised in the welcome status
    pub sample_rate: u32,

    /// Chunk duration advertised in the welcome status
    pub chunk_ms: u32,

    /// Frame pacing target; 0 disables pacing
    pub target_fps: f32,

    /// Largest binary message the session will encode
    pub max_message_size: usize,
}

impl SessionConfig {
    /// Per-session settings derived from the server configuration
    pub fn from_server(server: &ServerConfig) -> Self {
        Self {
            sample_rate: server.sample_rate,
            chunk_ms: server.chunk_ms,
            target_fps: server.target_fps,
            max_message_size: server.max_message_size,
            ..Default::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let server = ServerConfig::default();
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            sample_rate: server.sample_rate,
            chunk_ms: server.chunk_ms,
            target_fps: server.target_fps,
            max_message_size: server.max_message_size,
        }
    }
}
