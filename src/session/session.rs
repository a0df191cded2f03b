use super::config::SessionConfig;
use super::fps::FpsController;
use super::state::{SessionState, UtteranceTracker};
use super::stats::{SessionCounters, SessionStats};
use crate::engine::{EngineError, FrameReceiver, RenderEngine, RenderedFrame};
use crate::protocol::{AudioFormat, ControlParseError, ControlSignal, FrameEncoder, ServerStatus, VideoFormat};
use crate::transport::{CloseInfo, Inbound, Outbound, TransportError};
use chrono::Utc;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("failed to serialize status: {0}")]
    Status(#[from] serde_json::Error),
}

/// Server side of one client connection.
///
/// Forwards client audio into its own render engine and streams the engine's
/// output back as tagged binary frames, following the utterance lifecycle in
/// [`UtteranceTracker`].
pub struct ServerSession {
    config: SessionConfig,
    engine: Box<dyn RenderEngine>,
    counters: Arc<SessionCounters>,
    tracker: UtteranceTracker,
    fps: FpsController,
    encoder: FrameEncoder,

    /// Next media frame, held until its pacing deadline
    pending: Option<(Instant, RenderedFrame)>,
}

impl ServerSession {
    pub fn new(config: SessionConfig, engine: Box<dyn RenderEngine>) -> Self {
        let counters = Arc::new(SessionCounters::new(config.session_id.clone()));
        let fps = FpsController::new(config.target_fps);
        let encoder = FrameEncoder::new(config.max_message_size);

        Self {
            config,
            engine,
            counters,
            tracker: UtteranceTracker::new(),
            fps,
            encoder,
            pending: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Counters that stay readable while the session runs
    pub fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    pub fn state(&self) -> SessionState {
        self.tracker.state()
    }

    /// Drive the session until the client goes away or the engine fails.
    ///
    /// On an engine failure the client receives an error status followed by a
    /// close with code 1011.
    pub async fn run<Tx, Rx>(mut self, mut tx: Tx, mut rx: Rx) -> Result<SessionStats, SessionError>
    where
        Tx: Sink<Outbound, Error = TransportError> + Unpin + Send,
        Rx: Stream<Item = Result<Inbound, TransportError>> + Unpin + Send,
    {
        info!(
            "Session {} started with engine {}",
            self.config.session_id,
            self.engine.name()
        );

        let mut frames = match self.engine.start().await {
            Ok(frames) => frames,
            Err(e) => return Err(fail(&mut tx, e).await),
        };

        let result = self.serve(&mut tx, &mut rx, &mut frames).await;

        if let Err(e) = self.engine.stop().await {
            warn!("Failed to stop engine: {}", e);
        }

        let stats = self.counters.snapshot();
        match &result {
            Ok(()) => info!(
                "Session {} finished: {} audio chunks in, {} video frames out, {} utterances",
                stats.session_id,
                stats.audio_chunks_received,
                stats.video_frames_sent,
                stats.end_of_speech_sent
            ),
            Err(e) => error!("Session {} failed: {}", stats.session_id, e),
        }

        result.map(|()| stats)
    }

    async fn serve<Tx, Rx>(
        &mut self,
        tx: &mut Tx,
        rx: &mut Rx,
        frames: &mut FrameReceiver,
    ) -> Result<(), SessionError>
    where
        Tx: Sink<Outbound, Error = TransportError> + Unpin + Send,
        Rx: Stream<Item = Result<Inbound, TransportError>> + Unpin + Send,
    {
        let welcome = self.welcome();
        send_status(tx, &welcome).await?;

        loop {
            let due = self.pending.as_ref().map(|(due, _)| *due);

            // Inbound first so an interrupt is never stuck behind a backlog of
            // output. Pacing waits inside the select, so inbound messages are
            // still read while a frame is held.
            tokio::select! {
                biased;

                message = rx.next() => match message {
                    Some(Ok(Inbound::Binary(pcm))) => self.handle_audio(tx, pcm).await?,
                    Some(Ok(Inbound::Text(text))) => self.handle_control(tx, frames, &text).await?,
                    Some(Ok(Inbound::Closed(close))) => {
                        info!("Client closed the connection: {:?}", close);
                        return Ok(());
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        info!("Client disconnected");
                        return Ok(());
                    }
                },

                _ = tokio::time::sleep_until(due.unwrap_or_else(Instant::now)), if due.is_some() => {
                    if let Some((_, frame)) = self.pending.take() {
                        self.handle_frame(tx, frame).await?;
                    }
                }

                // Held frames go out first, keeping engine output in order
                frame = frames.recv(), if self.pending.is_none() => match frame {
                    Some(Ok(frame)) => {
                        if let Some(due) = self.pacing_deadline(&frame) {
                            self.pending = Some((due, frame));
                            continue;
                        }
                        self.handle_frame(tx, frame).await?
                    }
                    Some(Err(e)) => return Err(fail(tx, e).await),
                    None => return Err(fail(tx, EngineError::Stopped).await),
                },
            }
        }
    }

    fn welcome(&self) -> ServerStatus {
        ServerStatus::Connected {
            message: "Avatar renderer ready".to_string(),
            session_id: self.config.session_id.clone(),
            audio_format: AudioFormat {
                sample_rate: self.config.sample_rate,
                channels: 1,
                encoding: "int16_le".to_string(),
                chunk_ms: self.config.chunk_ms,
            },
            video_format: VideoFormat {
                codec: "jpeg".to_string(),
                fps: self.config.target_fps,
            },
        }
    }

    async fn handle_audio<Tx>(&mut self, tx: &mut Tx, pcm: Vec<u8>) -> Result<(), SessionError>
    where
        Tx: Sink<Outbound, Error = TransportError> + Unpin + Send,
    {
        if pcm.is_empty() {
            warn!("Ignoring empty audio message");
            SessionCounters::incr(&self.counters.messages_ignored);
            return Ok(());
        }

        SessionCounters::incr(&self.counters.audio_chunks_received);
        self.counters
            .audio_bytes_received
            .fetch_add(pcm.len() as u64, Ordering::Relaxed);

        if self.tracker.on_audio() {
            debug!("Utterance started");
            SessionCounters::incr(&self.counters.utterances_started);
            self.counters.reset_utterance();
            self.fps.reset();
        }

        if let Err(e) = self.engine.push_audio(&pcm).await {
            return Err(fail(tx, e).await);
        }

        Ok(())
    }

    async fn handle_control<Tx>(
        &mut self,
        tx: &mut Tx,
        frames: &mut FrameReceiver,
        text: &str,
    ) -> Result<(), SessionError>
    where
        Tx: Sink<Outbound, Error = TransportError> + Unpin + Send,
    {
        let signal = match ControlSignal::parse(text) {
            Ok(signal) => signal,
            Err(ControlParseError::UnknownType(kind)) => {
                warn!("Ignoring unknown control message type: {}", kind);
                SessionCounters::incr(&self.counters.messages_ignored);
                return Ok(());
            }
            Err(ControlParseError::Malformed(e)) => {
                warn!("Ignoring malformed control message: {}", e);
                SessionCounters::incr(&self.counters.messages_ignored);
                return Ok(());
            }
        };

        match signal {
            ControlSignal::End => {
                if !self.tracker.on_end() {
                    warn!("Ignoring end: utterance is already being flushed");
                    return Ok(());
                }

                if let Err(e) = self.engine.flush().await {
                    return Err(fail(tx, e).await);
                }
                self.tracker.flush_started();
                debug!("Flushing utterance");
            }
            ControlSignal::Interrupt => {
                if !self.tracker.on_interrupt() {
                    debug!("Interrupt while idle, nothing to do");
                    return Ok(());
                }

                SessionCounters::incr(&self.counters.interrupts);
                if let Err(e) = self.engine.interrupt().await {
                    return Err(fail(tx, e).await);
                }

                // Anything already rendered belongs to the abandoned utterance
                let mut discarded = usize::from(self.pending.take().is_some());
                while let Ok(frame) = frames.try_recv() {
                    if let Err(e) = frame {
                        return Err(fail(tx, e).await);
                    }
                    discarded += 1;
                }

                self.tracker.interrupt_complete();
                self.counters.reset_utterance();
                self.fps.reset();
                info!("Utterance interrupted, {} pending frames discarded", discarded);
            }
        }

        Ok(())
    }

    /// When a media frame has to wait for its slot, the instant it is due
    fn pacing_deadline(&self, frame: &RenderedFrame) -> Option<Instant> {
        if frame.image.is_none() && frame.audio.is_none() {
            return None;
        }

        let now = Instant::now();
        let delay = self.fps.delay_until_next_frame(now);
        (!delay.is_zero()).then(|| now + delay)
    }

    async fn handle_frame<Tx>(&mut self, tx: &mut Tx, frame: RenderedFrame) -> Result<(), SessionError>
    where
        Tx: Sink<Outbound, Error = TransportError> + Unpin + Send,
    {
        if frame.image.is_some() || frame.audio.is_some() {
            self.fps.update(Instant::now());
        }

        let timestamp = unix_timestamp();

        if let Some(image) = frame.image {
            let fps = match self.fps.average_fps() {
                measured if measured > 0.0 => measured,
                _ => self.config.target_fps,
            };

            match self
                .encoder
                .encode_video(image.width, image.height, fps, timestamp, &image.jpeg)
            {
                Ok(bytes) => {
                    tx.send(Outbound::Binary(bytes)).await?;
                    SessionCounters::incr(&self.counters.video_frames_sent);
                    SessionCounters::incr(&self.counters.utterance_frames_sent);
                }
                Err(e) => warn!("Dropping video frame: {}", e),
            }
        }

        if let Some(audio) = frame.audio {
            match self
                .encoder
                .encode_audio(audio.sample_rate, audio.channels, timestamp, &audio.pcm)
            {
                Ok(bytes) => {
                    tx.send(Outbound::Binary(bytes)).await?;
                    SessionCounters::incr(&self.counters.audio_chunks_sent);
                }
                Err(e) => warn!("Dropping audio chunk: {}", e),
            }
        }

        if frame.end_of_speech {
            if self.tracker.on_end_of_speech() {
                tx.send(Outbound::Binary(self.encoder.encode_end_of_speech()))
                    .await?;
                SessionCounters::incr(&self.counters.end_of_speech_sent);
                info!(
                    "Utterance complete: {} video frames sent",
                    self.counters.utterance_frames_sent.load(Ordering::Relaxed)
                );
                self.counters.reset_utterance();
            } else {
                debug!("Discarding stale end-of-speech from engine");
            }
        }

        Ok(())
    }
}

async fn send_status<Tx>(tx: &mut Tx, status: &ServerStatus) -> Result<(), SessionError>
where
    Tx: Sink<Outbound, Error = TransportError> + Unpin + Send,
{
    let text = serde_json::to_string(status)?;
    tx.send(Outbound::Text(text)).await?;
    Ok(())
}

/// Tell the client about a fatal engine error and close with 1011
async fn fail<Tx>(tx: &mut Tx, err: EngineError) -> SessionError
where
    Tx: Sink<Outbound, Error = TransportError> + Unpin + Send,
{
    error!("Engine failure: {}", err);

    let status = ServerStatus::Error {
        message: err.to_string(),
    };
    if let Err(e) = send_status(tx, &status).await {
        warn!("Failed to report engine error to client: {}", e);
    }
    if let Err(e) = tx
        .send(Outbound::Close(CloseInfo::internal_error("rendering failed")))
        .await
    {
        warn!("Failed to close connection: {}", e);
    }

    SessionError::Engine(err)
}

/// Wall-clock time in seconds since the Unix epoch
fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
