//! HTTP/WebSocket front end of the avatar renderer
//!
//! - GET {ws_path} - Upgrade to a streaming session (default "/")
//! - GET /sessions - Counters of live sessions
//! - GET /health - Health check

mod handlers;
mod routes;
mod server;
mod state;

pub use routes::create_router;
pub use server::{serve, serve_with_shutdown};
pub use state::AppState;
