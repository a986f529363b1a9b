use std::time::Duration;

/// Exponential backoff bounds for the outbound API clients.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Backoff {
    pub const fn new(initial_ms: u64, max_ms: u64, factor: u32) -> Self {
        Self {
            initial: Duration::from_millis(initial_ms),
            max: Duration::from_millis(max_ms),
            factor,
        }
    }

    /// Delay before retry number `retry` (1-based), capped at `max`.
    pub fn delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exponent);
        self.initial.saturating_mul(multiplier).min(self.max)
    }
}
