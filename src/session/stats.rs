use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one server session, shared with the HTTP diagnostics route
#[derive(Debug)]
pub struct SessionCounters {
    session_id: String,
    started_at: DateTime<Utc>,
    pub audio_chunks_received: AtomicU64,
    pub audio_bytes_received: AtomicU64,
    pub video_frames_sent: AtomicU64,
    pub audio_chunks_sent: AtomicU64,
    pub end_of_speech_sent: AtomicU64,
    pub interrupts: AtomicU64,
    pub utterances_started: AtomicU64,
    /// Video frames sent for the current utterance
    pub utterance_frames_sent: AtomicU64,
    /// Malformed or unknown client messages that were dropped
    pub messages_ignored: AtomicU64,
}

impl SessionCounters {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            started_at: Utc::now(),
            audio_chunks_received: AtomicU64::new(0),
            audio_bytes_received: AtomicU64::new(0),
            video_frames_sent: AtomicU64::new(0),
            audio_chunks_sent: AtomicU64::new(0),
            end_of_speech_sent: AtomicU64::new(0),
            interrupts: AtomicU64::new(0),
            utterances_started: AtomicU64::new(0),
            utterance_frames_sent: AtomicU64::new(0),
            messages_ignored: AtomicU64::new(0),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Clear the per-utterance counters
    pub fn reset_utterance(&self) {
        self.utterance_frames_sent.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SessionStats {
        let duration_secs = (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0;

        SessionStats {
            session_id: self.session_id.clone(),
            started_at: self.started_at,
            duration_secs,
            audio_chunks_received: self.audio_chunks_received.load(Ordering::Relaxed),
            audio_bytes_received: self.audio_bytes_received.load(Ordering::Relaxed),
            video_frames_sent: self.video_frames_sent.load(Ordering::Relaxed),
            audio_chunks_sent: self.audio_chunks_sent.load(Ordering::Relaxed),
            end_of_speech_sent: self.end_of_speech_sent.load(Ordering::Relaxed),
            interrupts: self.interrupts.load(Ordering::Relaxed),
            utterances_started: self.utterances_started.load(Ordering::Relaxed),
            utterance_frames_sent: self.utterance_frames_sent.load(Ordering::Relaxed),
            messages_ignored: self.messages_ignored.load(Ordering::Relaxed),
        }
    }
}

/// Statistics about a server session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// When the client connected
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    pub audio_chunks_received: u64,
    pub audio_bytes_received: u64,
    pub video_frames_sent: u64,
    pub audio_chunks_sent: u64,
    pub end_of_speech_sent: u64,
    pub interrupts: u64,
    pub utterances_started: u64,
    pub utterance_frames_sent: u64,
    pub messages_ignored: u64,
}
