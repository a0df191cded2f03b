use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Terminal and per-call errors of a client session
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: TransportError,
    },
    #[error("timed out after {timeout:?} connecting to {url}")]
    ConnectTimeout { url: String, timeout: Duration },
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("server disconnected without a close frame")]
    Disconnected,
    #[error("server closed the session with code {code}: {reason}")]
    ServerClosed { code: u16, reason: String },
    #[error("no message from server within {0:?}")]
    ReadTimeout(Duration),
    #[error("session is closed")]
    Closed,
    #[error("failed to serialize control message: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("receive task failed: {0}")]
    Task(String),
}
