use super::error::ClientError;
use super::handler::FrameHandler;
use crate::audio::chunk::ChunkConfig;
use crate::config::ClientConfig;
use crate::protocol::{decode, ControlSignal, DecodedMessage, StatusMessage};
use crate::transport::tungstenite_ws::{self, ConnectFailure};
use crate::transport::{BoxInbound, BoxSink, CloseInfo, Inbound, Outbound};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Counters of a client session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientStats {
    pub audio_chunks_sent: u64,
    pub audio_bytes_sent: u64,
    pub video_frames_received: u64,
    pub audio_chunks_received: u64,
    pub end_of_speech_received: u64,
    pub status_messages_received: u64,
    /// Binary messages dropped because they did not decode
    pub decode_errors: u64,
}

#[derive(Debug, Default)]
struct ClientCounters {
    audio_chunks_sent: AtomicU64,
    audio_bytes_sent: AtomicU64,
    video_frames_received: AtomicU64,
    audio_chunks_received: AtomicU64,
    end_of_speech_received: AtomicU64,
    status_messages_received: AtomicU64,
    decode_errors: AtomicU64,
}

impl ClientCounters {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ClientStats {
        ClientStats {
            audio_chunks_sent: self.audio_chunks_sent.load(Ordering::Relaxed),
            audio_bytes_sent: self.audio_bytes_sent.load(Ordering::Relaxed),
            video_frames_received: self.video_frames_received.load(Ordering::Relaxed),
            audio_chunks_received: self.audio_chunks_received.load(Ordering::Relaxed),
            end_of_speech_received: self.end_of_speech_received.load(Ordering::Relaxed),
            status_messages_received: self.status_messages_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// Client side of one connection to the avatar renderer.
///
/// Sending happens on the caller's task; decoding and dispatch to the
/// [`FrameHandler`] happen on a background receive task. All sending methods
/// take `&self`, so the session can be shared (e.g. in an `Arc`) to interrupt
/// a `stream` call from another task.
pub struct ClientSession {
    config: ClientConfig,

    /// Outbound half, serialized so chunks and control messages never interleave
    sink: Arc<Mutex<BoxSink>>,

    counters: Arc<ClientCounters>,

    /// Flips to true once, when either side ends the session
    closed: Arc<watch::Sender<bool>>,

    /// Bumped on every `interrupt` so an in-flight `stream` stops sending
    interrupts: watch::Sender<u64>,

    /// True from the first audio of an utterance until its end-of-speech or
    /// an interrupt. The read timeout only runs while this is set.
    in_flight: Arc<watch::Sender<bool>>,

    status_rx: Option<mpsc::UnboundedReceiver<StatusMessage>>,

    /// Handle for the receive task
    receiver: Arc<Mutex<Option<JoinHandle<Result<(), ClientError>>>>>,
}

impl ClientSession {
    /// Open a WebSocket connection to `url` and start the receive task
    pub async fn connect<H: FrameHandler>(
        url: &str,
        config: &ClientConfig,
        handler: H,
    ) -> Result<Self, ClientError> {
        let timeout = config.connect_timeout();
        let (sink, stream) = tungstenite_ws::connect(url, timeout)
            .await
            .map_err(|e| match e {
                ConnectFailure::Timeout => ClientError::ConnectTimeout {
                    url: url.to_string(),
                    timeout,
                },
                ConnectFailure::Transport(source) => ClientError::Connect {
                    url: url.to_string(),
                    source,
                },
            })?;

        info!("Connected to {}", url);
        Ok(Self::from_transport(sink, stream, config.clone(), handler))
    }

    /// Run a session over an already established transport
    pub fn from_transport<H: FrameHandler>(
        sink: BoxSink,
        stream: BoxInbound,
        config: ClientConfig,
        handler: H,
    ) -> Self {
        let counters = Arc::new(ClientCounters::default());
        let (closed, _) = watch::channel(false);
        let closed = Arc::new(closed);
        let (interrupts, _) = watch::channel(0u64);
        let (in_flight, _) = watch::channel(false);
        let in_flight = Arc::new(in_flight);
        let (status_tx, status_rx) = mpsc::unbounded_channel();

        let receive = ReceiveLoop {
            stream,
            handler,
            status_tx,
            counters: Arc::clone(&counters),
            read_timeout: config.read_timeout(),
            closed: closed.subscribe(),
            in_flight: Arc::clone(&in_flight),
        };

        let task_closed = Arc::clone(&closed);
        let handle = tokio::spawn(async move {
            let result = receive.run().await;
            task_closed.send_replace(true);
            match &result {
                Ok(()) => info!("Receive task finished"),
                Err(e) => warn!("Receive task ended: {}", e),
            }
            result
        });

        Self {
            config,
            sink: Arc::new(Mutex::new(sink)),
            counters,
            closed,
            interrupts,
            in_flight,
            status_rx: Some(status_rx),
            receiver: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Status/diagnostic text messages from the server, delivered apart from
    /// binary frames. Can be taken once.
    pub fn take_status_events(&mut self) -> Option<mpsc::UnboundedReceiver<StatusMessage>> {
        self.status_rx.take()
    }

    pub fn stats(&self) -> ClientStats {
        self.counters.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Send one raw PCM chunk
    pub async fn send_audio(&self, pcm: &[u8]) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let mut sink = self.sink.lock().await;
        sink.send(Outbound::Binary(pcm.to_vec())).await?;
        self.record_sent(pcm.len());
        Ok(())
    }

    pub async fn send_control(&self, signal: ControlSignal) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let text = signal.to_json()?;
        let mut sink = self.sink.lock().await;
        sink.send(Outbound::Text(text)).await?;
        match signal {
            ControlSignal::End => set_in_flight(&self.in_flight, true),
            ControlSignal::Interrupt => {
                self.interrupts.send_modify(|epoch| *epoch += 1);
                set_in_flight(&self.in_flight, false);
            }
        }
        debug!("Sent control message: {:?}", signal);
        Ok(())
    }

    /// Send a whole utterance: chunk `pcm`, send each chunk (paced to real
    /// time when configured), then send `end`.
    ///
    /// Returns early without sending `end` if [`interrupt`](Self::interrupt)
    /// is called meanwhile, and fails with [`ClientError::Closed`] if the
    /// session closes.
    pub async fn stream(&self, pcm: &[u8]) -> Result<(), ClientError> {
        let chunker = ChunkConfig::new(self.config.chunk_ms, self.config.sample_rate);
        let chunk_duration = chunker.chunk_duration();
        let chunks = chunker.chunks(pcm);
        let total = chunks.len();

        let mut closed = self.closed.subscribe();
        let mut interrupts = self.interrupts.subscribe();
        interrupts.borrow_and_update();

        info!(
            "Streaming {} bytes as {} chunks of {:?}",
            pcm.len(),
            total,
            chunk_duration
        );

        for (index, chunk) in chunks.enumerate() {
            {
                // `close` raises the flag before taking the lock, so checking
                // here keeps chunks from following the close frame
                let mut sink = self.sink.lock().await;
                if *closed.borrow() {
                    return Err(ClientError::Closed);
                }
                if interrupts.has_changed().unwrap_or(false) {
                    info!("Streaming interrupted after {} of {} chunks", index, total);
                    return Ok(());
                }
                sink.send(Outbound::Binary(chunk.to_vec())).await?;
            }
            self.record_sent(chunk.len());

            if self.config.pacing && index + 1 < total {
                tokio::select! {
                    _ = tokio::time::sleep(chunk_duration) => {}
                    _ = closed.changed() => return Err(ClientError::Closed),
                    _ = interrupts.changed() => {
                        info!("Streaming interrupted after {} of {} chunks", index + 1, total);
                        return Ok(());
                    }
                }
            }
        }

        let mut sink = self.sink.lock().await;
        if *closed.borrow() {
            return Err(ClientError::Closed);
        }
        if interrupts.has_changed().unwrap_or(false) {
            info!("Streaming interrupted before end");
            return Ok(());
        }
        sink.send(Outbound::Text(ControlSignal::End.to_json()?)).await?;
        set_in_flight(&self.in_flight, true);
        debug!("Sent end after {} chunks", total);
        Ok(())
    }

    /// Abandon the current utterance, including any `stream` in progress
    pub async fn interrupt(&self) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::Closed);
        }

        let text = ControlSignal::Interrupt.to_json()?;
        let mut sink = self.sink.lock().await;
        self.interrupts.send_modify(|epoch| *epoch += 1);
        set_in_flight(&self.in_flight, false);
        sink.send(Outbound::Text(text)).await?;
        info!("Sent interrupt");
        Ok(())
    }

    /// Close the connection with a normal close frame and stop the receive task
    pub async fn close(&self) -> Result<(), ClientError> {
        if self.closed.send_replace(true) {
            return Ok(());
        }

        let mut sink = self.sink.lock().await;
        sink.send(Outbound::Close(CloseInfo::normal())).await?;
        info!("Closed connection");
        Ok(())
    }

    /// Wait for the receive task to finish.
    ///
    /// Returns the final counters, or the error that ended the session.
    pub async fn join(&self) -> Result<ClientStats, ClientError> {
        let handle = self.receiver.lock().await.take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| ClientError::Task(e.to_string()))??;
        }
        Ok(self.counters.snapshot())
    }

    fn record_sent(&self, len: usize) {
        set_in_flight(&self.in_flight, true);
        ClientCounters::incr(&self.counters.audio_chunks_sent);
        self.counters
            .audio_bytes_sent
            .fetch_add(len as u64, Ordering::Relaxed);
    }
}

/// Update the in-flight flag, waking watchers only on an actual change
fn set_in_flight(in_flight: &watch::Sender<bool>, active: bool) {
    in_flight.send_if_modified(|current| {
        let changed = *current != active;
        *current = active;
        changed
    });
}

struct ReceiveLoop<H> {
    stream: BoxInbound,
    handler: H,
    status_tx: mpsc::UnboundedSender<StatusMessage>,
    counters: Arc<ClientCounters>,
    read_timeout: Duration,
    closed: watch::Receiver<bool>,
    in_flight: Arc<watch::Sender<bool>>,
}

impl<H: FrameHandler> ReceiveLoop<H> {
    async fn run(mut self) -> Result<(), ClientError> {
        let mut in_flight = self.in_flight.subscribe();

        loop {
            if *self.closed.borrow() {
                return Ok(());
            }

            // An idle connection may stay silent indefinitely; only a started
            // utterance is expected to produce output within the timeout.
            let armed = *in_flight.borrow_and_update();
            let next = if armed {
                tokio::select! {
                    _ = self.closed.changed() => return Ok(()),
                    _ = in_flight.changed() => continue,
                    next = tokio::time::timeout(self.read_timeout, self.stream.next()) => match next {
                        Ok(next) => next,
                        Err(_) => return Err(ClientError::ReadTimeout(self.read_timeout)),
                    },
                }
            } else {
                tokio::select! {
                    _ = self.closed.changed() => return Ok(()),
                    _ = in_flight.changed() => continue,
                    next = self.stream.next() => next,
                }
            };

            match next {
                None => return Err(ClientError::Disconnected),
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(Inbound::Binary(bytes))) => self.dispatch(&bytes).await,
                Some(Ok(Inbound::Text(text))) => {
                    ClientCounters::incr(&self.counters.status_messages_received);
                    let status = StatusMessage::parse(&text);
                    debug!("Status from server: {} {:?}", status.kind, status.message);
                    // Nobody took the status channel
                    let _ = self.status_tx.send(status);
                }
                Some(Ok(Inbound::Closed(close))) => {
                    return match close {
                        Some(close) if !close.is_normal() => Err(ClientError::ServerClosed {
                            code: close.code,
                            reason: close.reason,
                        }),
                        _ => {
                            info!("Server closed the connection");
                            Ok(())
                        }
                    };
                }
            }
        }
    }

    async fn dispatch(&mut self, bytes: &[u8]) {
        match decode(bytes) {
            Ok(DecodedMessage::Video(frame)) => {
                ClientCounters::incr(&self.counters.video_frames_received);
                self.handler.on_video_frame(frame).await;
            }
            Ok(DecodedMessage::Audio(chunk)) => {
                ClientCounters::incr(&self.counters.audio_chunks_received);
                self.handler.on_audio_chunk(chunk).await;
            }
            Ok(DecodedMessage::EndOfSpeech) => {
                ClientCounters::incr(&self.counters.end_of_speech_received);
                set_in_flight(&self.in_flight, false);
                self.handler.on_end_of_speech().await;
            }
            Err(e) => {
                ClientCounters::incr(&self.counters.decode_errors);
                warn!("Dropping undecodable message: {}", e);
            }
        }
    }
}
