//! Server-side streaming session
//!
//! One `ServerSession` per WebSocket connection. It owns:
//! - the render engine instance for that client
//! - the utterance state machine (`SessionState`)
//! - frame pacing and the binary encoder
//! - live counters exposed through the HTTP diagnostics route

mod config;
mod fps;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use fps::FpsController;
pub use session::{ServerSession, SessionError};
pub use state::{SessionState, UtteranceTracker};
pub use stats::{SessionCounters, SessionStats};
