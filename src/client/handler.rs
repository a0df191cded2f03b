use crate::protocol::{AudioOutChunk, VideoFrame};
use tokio::sync::mpsc;

/// Receives decoded server output, in arrival order
#[async_trait::async_trait]
pub trait FrameHandler: Send + 'static {
    async fn on_video_frame(&mut self, frame: VideoFrame);

    async fn on_audio_chunk(&mut self, chunk: AudioOutChunk);

    /// The server finished rendering the current utterance
    async fn on_end_of_speech(&mut self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Video(VideoFrame),
    Audio(AudioOutChunk),
    EndOfSpeech,
}

/// Forwards every decoded message into a channel
pub struct ChannelHandler {
    tx: mpsc::UnboundedSender<ClientEvent>,
}

impl ChannelHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ClientEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ClientEvent) {
        // Receiver gone means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

#[async_trait::async_trait]
impl FrameHandler for ChannelHandler {
    async fn on_video_frame(&mut self, frame: VideoFrame) {
        self.forward(ClientEvent::Video(frame));
    }

    async fn on_audio_chunk(&mut self, chunk: AudioOutChunk) {
        self.forward(ClientEvent::Audio(chunk));
    }

    async fn on_end_of_speech(&mut self) {
        self.forward(ClientEvent::EndOfSpeech);
    }
}
