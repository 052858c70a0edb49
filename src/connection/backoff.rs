//! Backoff between reconnect attempts.

use std::time::Duration;

/// A stateless mapping from attempt count to delay. The supervisor owns the
/// attempt counter; the policy itself never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffPolicy {
    /// The same delay after every failed attempt.
    Fixed(Duration),
    /// Doubling delays starting at `base`, saturating at `cap`.
    Exponential { base: Duration, cap: Duration },
}

impl BackoffPolicy {
    /// Delay to sleep after the failed attempt with the given zero-based
    /// index.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed(delay) => *delay,
            BackoffPolicy::Exponential { base, cap } => {
                let factor = 2u32.saturating_pow(attempt);
                base.saturating_mul(factor).min(*cap)
            }
        }
    }
}
