//! Per-utterance state machine of a server session
//!
//! ```text
//! Idle ──audio──▶ ReceivingAudio ──end──▶ Flushing ──flushed──▶ AwaitingCompletion
//!  ▲                                                                 │
//!  └──────────────────────── end-of-speech ◀─────────────────────────┘
//!
//! any non-idle state ──interrupt──▶ Interrupted ──drained──▶ Idle
//! ```

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    ReceivingAudio,
    Flushing,
    AwaitingCompletion,
    Interrupted,
}

/// Tracks where the session is within the current utterance.
///
/// Each method applies one transition and tells the caller whether the
/// engine needs to act on it.
#[derive(Debug, Default)]
pub struct UtteranceTracker {
    state: SessionState,
}

impl UtteranceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// An audio chunk arrived. Returns true when it opens a new utterance.
    ///
    /// Audio arriving while a flushed utterance is still completing is
    /// forwarded but does not change state.
    pub fn on_audio(&mut self) -> bool {
        match self.state {
            SessionState::Idle | SessionState::Interrupted => {
                self.state = SessionState::ReceivingAudio;
                true
            }
            SessionState::ReceivingAudio
            | SessionState::Flushing
            | SessionState::AwaitingCompletion => false,
        }
    }

    /// `end` arrived. Returns true when the engine must be flushed.
    ///
    /// An `end` with no audio still flushes, so the client gets its
    /// end-of-speech marker. A second `end` before completion is ignored.
    pub fn on_end(&mut self) -> bool {
        match self.state {
            SessionState::Idle | SessionState::ReceivingAudio | SessionState::Interrupted => {
                self.state = SessionState::Flushing;
                true
            }
            SessionState::Flushing | SessionState::AwaitingCompletion => false,
        }
    }

    /// The engine accepted the flush and is draining its output
    pub fn flush_started(&mut self) {
        if self.state == SessionState::Flushing {
            self.state = SessionState::AwaitingCompletion;
        }
    }

    /// `interrupt` arrived. Returns true when there is an utterance to abandon;
    /// interrupting an idle session is a no-op.
    pub fn on_interrupt(&mut self) -> bool {
        match self.state {
            SessionState::Idle => false,
            _ => {
                self.state = SessionState::Interrupted;
                true
            }
        }
    }

    /// The engine dropped everything it had for the interrupted utterance
    pub fn interrupt_complete(&mut self) {
        if self.state == SessionState::Interrupted {
            self.state = SessionState::Idle;
        }
    }

    /// The engine finished an utterance. Returns true when the marker belongs
    /// to a flushed utterance and must be sent; stale markers are dropped.
    pub fn on_end_of_speech(&mut self) -> bool {
        match self.state {
            SessionState::Flushing | SessionState::AwaitingCompletion => {
                self.state = SessionState::Idle;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let mut tracker = UtteranceTracker::new();
        assert_eq!(tracker.state(), SessionState::Idle);

        assert!(tracker.on_audio());
        assert_eq!(tracker.state(), SessionState::ReceivingAudio);

        assert!(!tracker.on_audio());
        assert_eq!(tracker.state(), SessionState::ReceivingAudio);

        assert!(tracker.on_end());
        assert_eq!(tracker.state(), SessionState::Flushing);

        tracker.flush_started();
        assert_eq!(tracker.state(), SessionState::AwaitingCompletion);

        assert!(tracker.on_end_of_speech());
        assert_eq!(tracker.state(), SessionState::Idle);
    }

    #[test]
    fn test_interrupt_when_idle_is_noop() {
        let mut tracker = UtteranceTracker::new();
        assert!(!tracker.on_interrupt());
        assert_eq!(tracker.state(), SessionState::Idle);
        assert!(!tracker.on_interrupt());
        assert_eq!(tracker.state(), SessionState::Idle);
    }

    #[test]
    fn test_interrupt_from_any_active_state() {
        for setup in [
            |t: &mut UtteranceTracker| {
                t.on_audio();
            },
            |t: &mut UtteranceTracker| {
                t.on_audio();
                t.on_end();
            },
            |t: &mut UtteranceTracker| {
                t.on_audio();
                t.on_end();
                t.flush_started();
            },
        ] {
            let mut tracker = UtteranceTracker::new();
            setup(&mut tracker);

            assert!(tracker.on_interrupt());
            assert_eq!(tracker.state(), SessionState::Interrupted);
            tracker.interrupt_complete();
            assert_eq!(tracker.state(), SessionState::Idle);
        }
    }

    #[test]
    fn test_stale_end_of_speech_is_dropped() {
        let mut tracker = UtteranceTracker::new();
        assert!(!tracker.on_end_of_speech());

        tracker.on_audio();
        assert!(!tracker.on_end_of_speech());
        assert_eq!(tracker.state(), SessionState::ReceivingAudio);
    }

    #[test]
    fn test_duplicate_end_is_ignored() {
        let mut tracker = UtteranceTracker::new();
        tracker.on_audio();
        assert!(tracker.on_end());
        tracker.flush_started();
        assert!(!tracker.on_end());
        assert_eq!(tracker.state(), SessionState::AwaitingCompletion);
    }

    #[test]
    fn test_end_without_audio_still_flushes() {
        let mut tracker = UtteranceTracker::new();
        assert!(tracker.on_end());
        tracker.flush_started();
        assert!(tracker.on_end_of_speech());
        assert_eq!(tracker.state(), SessionState::Idle);
    }

    #[test]
    fn test_audio_during_completion_keeps_state() {
        let mut tracker = UtteranceTracker::new();
        tracker.on_audio();
        tracker.on_end();
        tracker.flush_started();

        assert!(!tracker.on_audio());
        assert_eq!(tracker.state(), SessionState::AwaitingCompletion);
    }
}
