//! Deterministic stand-in renderer
//!
//! Emits one frame per `sample_rate / fps` samples of input: the configured
//! still image (if any) plus the input slice echoed back as output audio.
//! Useful for exercising the streaming path without a lip-sync model.

use super::{
    EngineError, FrameReceiver, RenderEngine, RenderedAudio, RenderedFrame, RenderedImage,
};
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    pub sample_rate: u32,
    pub channels: u8,
    pub fps: u32,
    /// Still image attached to every frame; `None` renders audio-only frames
    pub image: Option<RenderedImage>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            fps: 25,
            image: None,
        }
    }
}

pub struct LoopbackEngine {
    config: LoopbackConfig,
    output: Option<mpsc::UnboundedSender<Result<RenderedFrame, EngineError>>>,
    pending: Vec<u8>,
}

impl LoopbackEngine {
    pub fn new(config: LoopbackConfig) -> Self {
        Self {
            config,
            output: None,
            pending: Vec::new(),
        }
    }

    /// PCM bytes rendered into one frame
    pub fn bytes_per_frame(&self) -> usize {
        let fps = self.config.fps.max(1) as usize;
        let samples = (self.config.sample_rate as usize / fps).max(1);
        samples * 2 * self.config.channels.max(1) as usize
    }

    fn render(&self, pcm: Vec<u8>) -> RenderedFrame {
        RenderedFrame {
            image: self.config.image.clone(),
            audio: Some(RenderedAudio {
                sample_rate: self.config.sample_rate,
                channels: self.config.channels,
                pcm,
            }),
            end_of_speech: false,
        }
    }

    fn emit(&self, frame: RenderedFrame) -> Result<(), EngineError> {
        let output = self.output.as_ref().ok_or(EngineError::NotStarted)?;
        output.send(Ok(frame)).map_err(|_| EngineError::Stopped)
    }
}

#[async_trait::async_trait]
impl RenderEngine for LoopbackEngine {
    async fn start(&mut self) -> Result<FrameReceiver, EngineError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.output = Some(tx);
        self.pending.clear();

        info!(
            "Loopback engine started: {}Hz, {} fps, image={}",
            self.config.sample_rate,
            self.config.fps,
            self.config.image.is_some()
        );

        Ok(rx)
    }

    async fn push_audio(&mut self, pcm: &[u8]) -> Result<(), EngineError> {
        if self.output.is_none() {
            return Err(EngineError::NotStarted);
        }

        self.pending.extend_from_slice(pcm);

        let frame_bytes = self.bytes_per_frame();
        while self.pending.len() >= frame_bytes {
            let rest = self.pending.split_off(frame_bytes);
            let slice = std::mem::replace(&mut self.pending, rest);
            self.emit(self.render(slice))?;
        }

        Ok(())
    }

    async fn flush(&mut self) -> Result<(), EngineError> {
        if !self.pending.is_empty() {
            let slice = std::mem::take(&mut self.pending);
            self.emit(self.render(slice))?;
        }

        debug!("Loopback engine flushed utterance");
        self.emit(RenderedFrame::end_of_speech())
    }

    async fn interrupt(&mut self) -> Result<(), EngineError> {
        debug!("Loopback engine discarding {} buffered bytes", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), EngineError> {
        self.output = None;
        self.pending.clear();
        info!("Loopback engine stopped");
        Ok(())
    }

    fn name(&self) -> &str {
        "loopback"
    }
}
