use crate::config::ServerConfig;
use crate::engine::EngineFactory;
use crate::session::SessionCounters;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,

    /// Builds one render engine per connection
    pub engines: Arc<dyn EngineFactory>,

    /// Live sessions (session_id → counters)
    pub sessions: Arc<RwLock<HashMap<String, Arc<SessionCounters>>>>,
}

impl AppState {
    pub fn new(config: ServerConfig, engines: Arc<dyn EngineFactory>) -> Self {
        Self {
            config: Arc::new(config),
            engines,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}
