use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: usize = 25;

/// Paces outgoing video frames to a target rate and measures the rate achieved
#[derive(Debug)]
pub struct FpsController {
    interval: Option<Duration>,
    last_frame: Option<Instant>,
    intervals: VecDeque<Duration>,
}

impl FpsController {
    /// A `target_fps` of zero or less disables pacing
    pub fn new(target_fps: f32) -> Self {
        let interval = (target_fps > 0.0)
            .then(|| Duration::from_nanos((1e9 / target_fps as f64).round() as u64));
        Self {
            interval,
            last_frame: None,
            intervals: VecDeque::with_capacity(WINDOW),
        }
    }

    /// How long to wait before sending the next frame
    pub fn delay_until_next_frame(&self, now: Instant) -> Duration {
        match (self.interval, self.last_frame) {
            (Some(interval), Some(last)) => (last + interval).saturating_duration_since(now),
            _ => Duration::ZERO,
        }
    }

    /// Record that a frame went out at `now`
    pub fn update(&mut self, now: Instant) {
        if let Some(last) = self.last_frame {
            if self.intervals.len() == WINDOW {
                self.intervals.pop_front();
            }
            self.intervals.push_back(now.saturating_duration_since(last));
        }
        self.last_frame = Some(now);
    }

    /// Frame rate over the last few frames; 0 until two frames were sent
    pub fn average_fps(&self) -> f32 {
        let total: Duration = self.intervals.iter().sum();
        if total.is_zero() {
            return 0.0;
        }
        self.intervals.len() as f32 / total.as_secs_f32()
    }

    /// Forget the previous utterance's timing
    pub fn reset(&mut self) {
        self.last_frame = None;
        self.intervals.clear();
    }
}
