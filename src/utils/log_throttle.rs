use std::time::{Duration, Instant};

/// Per-call-site rate limiter for repetitive log lines.
///
/// The first call in a window emits; later calls inside the window are
/// counted as suppressed and reported with the next emission.
#[derive(Debug)]
pub struct LogThrottle {
    interval: Duration,
    window_started_at: Option<Instant>,
    suppressed: u64,
}

impl LogThrottle {
    pub fn new(interval: Duration) -> Self {
        LogThrottle {
            interval,
            window_started_at: None,
            suppressed: 0,
        }
    }

    /// Returns `Some(suppressed_count)` when the caller should emit,
    /// otherwise `None` and the event is counted for the active window.
    pub fn should_emit(&mut self) -> Option<u64> {
        let now = Instant::now();
        match self.window_started_at {
            Some(started) if now.duration_since(started) < self.interval => {
                self.suppressed += 1;
                None
            }
            _ => {
                self.window_started_at = Some(now);
                let suppressed = self.suppressed;
                self.suppressed = 0;
                Some(suppressed)
            }
        }
    }
}
