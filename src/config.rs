use crate::audio::chunk::{DEFAULT_CHUNK_MS, DEFAULT_SAMPLE_RATE};
use crate::engine::EngineKind;
use crate::protocol::codec::DEFAULT_MAX_MESSAGE_SIZE;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration.
///
/// Sources, lowest priority first: built-in defaults, an optional config file,
/// then `AVATAR__<SECTION>__<KEY>` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Path of the streaming WebSocket endpoint
    pub ws_path: String,
    /// Largest WebSocket message accepted or produced
    pub max_message_size: usize,
    /// Output frame pacing; 0 sends frames as fast as the engine yields them
    pub target_fps: f32,
    /// Input sample rate advertised to clients
    pub sample_rate: u32,
    /// Chunk duration advertised to clients
    pub chunk_ms: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8765,
            ws_path: "/".to_string(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            target_fps: 25.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_ms: DEFAULT_CHUNK_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
    /// Longest silence from the server during an utterance before the session
    /// is torn down
    pub read_timeout_secs: u64,
    pub sample_rate: u32,
    pub chunk_ms: u32,
    /// Sleep one chunk duration between sends to emulate real-time audio
    pub pacing: bool,
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "ws://localhost:8765".to_string(),
            connect_timeout_secs: 10,
            read_timeout_secs: 120,
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_ms: DEFAULT_CHUNK_MS,
            pacing: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub fps: u32,
    pub sample_rate: u32,
    pub channels: u8,
    /// JPEG shown on every rendered frame
    pub image_path: Option<String>,
    pub width: u16,
    pub height: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Loopback,
            fps: 25,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: 1,
            image_path: None,
            width: 512,
            height: 512,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("AVATAR").separator("__"))
            .build()
            .with_context(|| format!("Failed to load configuration from {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_protocol() {
        let config = Config::default();
        assert_eq!(config.server.port, 8765);
        assert_eq!(config.server.sample_rate, 16000);
        assert_eq!(config.server.chunk_ms, 100);
        assert_eq!(config.client.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.client.read_timeout(), Duration::from_secs(120));
        assert_eq!(config.engine.kind, EngineKind::Loopback);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() -> Result<()> {
        let config = Config::load("/nonexistent/avatar-stream")?;
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.client.url, "ws://localhost:8765");
        Ok(())
    }

    #[test]
    fn test_file_overrides_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "[server]\nport = 9100\ntarget_fps = 0.0\n\n[client]\npacing = false")?;

        let path = file.path().to_string_lossy().to_string();
        let config = Config::load(&path)?;

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.target_fps, 0.0);
        assert!(!config.client.pacing);
        assert_eq!(config.server.ws_path, "/");
        Ok(())
    }
}
