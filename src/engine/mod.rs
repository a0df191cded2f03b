//! Rendering engine interface
//!
//! The lip-sync renderer is an external component. Sessions only drive it
//! through [`RenderEngine`]: push audio in, flush or interrupt the current
//! utterance, and consume rendered output from the receiver returned by
//! [`RenderEngine::start`]. Each server session owns its own engine.

mod loopback;

pub use loopback::{LoopbackConfig, LoopbackEngine};

use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Rendered JPEG image for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub width: u16,
    pub height: u16,
    pub jpeg: Vec<u8>,
}

/// Rendered PCM audio aligned with one frame
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedAudio {
    pub sample_rate: u32,
    pub channels: u8,
    pub pcm: Vec<u8>,
}

/// One unit of engine output.
///
/// A frame may carry an image, audio, both, or neither. `end_of_speech` marks
/// the last output of a flushed utterance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedFrame {
    pub image: Option<RenderedImage>,
    pub audio: Option<RenderedAudio>,
    pub end_of_speech: bool,
}

impl RenderedFrame {
    pub fn end_of_speech() -> Self {
        Self {
            end_of_speech: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine has not been started")]
    NotStarted,
    #[error("engine output stopped")]
    Stopped,
    #[error("rendering failed: {0}")]
    Rendering(String),
    #[error("failed to load engine assets: {0}")]
    Assets(#[from] std::io::Error),
}

/// Lazy sequence of engine output, in render order
pub type FrameReceiver = mpsc::UnboundedReceiver<Result<RenderedFrame, EngineError>>;

/// Audio-to-avatar renderer
#[async_trait::async_trait]
pub trait RenderEngine: Send {
    /// Start rendering
    ///
    /// Returns the receiver that yields rendered frames until the engine stops
    async fn start(&mut self) -> Result<FrameReceiver, EngineError>;

    /// Feed 16 kHz mono s16le audio for the current utterance
    async fn push_audio(&mut self, pcm: &[u8]) -> Result<(), EngineError>;

    /// No more audio for the current utterance; drain and finish with an
    /// end-of-speech frame
    async fn flush(&mut self) -> Result<(), EngineError>;

    /// Abandon the current utterance.
    ///
    /// Buffered audio is discarded and nothing more is produced for it.
    async fn interrupt(&mut self) -> Result<(), EngineError>;

    /// Stop rendering and release resources
    async fn stop(&mut self) -> Result<(), EngineError>;

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Creates one engine per session
pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn RenderEngine>, EngineError>;
}

/// Available engine implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Loopback,
}

/// Builds engines from [`EngineConfig`]
pub struct ConfiguredEngineFactory {
    config: EngineConfig,
    image: Option<RenderedImage>,
}

impl ConfiguredEngineFactory {
    /// Load engine assets once so every session shares them
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let image = match &config.image_path {
            Some(path) => Some(RenderedImage {
                width: config.width,
                height: config.height,
                jpeg: std::fs::read(path)?,
            }),
            None => None,
        };

        Ok(Self { config, image })
    }
}

impl EngineFactory for ConfiguredEngineFactory {
    fn create(&self) -> Result<Box<dyn RenderEngine>, EngineError> {
        match self.config.kind {
            EngineKind::Loopback => Ok(Box::new(LoopbackEngine::new(LoopbackConfig {
                sample_rate: self.config.sample_rate,
                channels: self.config.channels,
                fps: self.config.fps,
                image: self.image.clone(),
            }))),
        }
    }
}
