use std::time::Duration;

/// Transport-failure backoff for the keeper loop
///
/// Doubles from `initial_delay` up to `max_delay` on consecutive failures. With
/// `initial == max` this is a fixed backoff. There is no retry cap: the keeper keeps going
/// until it is stopped.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_delay: Duration,
    max_delay: Duration,
    current_attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial_delay: initial,
            max_delay: max.max(initial),
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt; advances the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.current_attempt.min(16));
        let delay = std::cmp::min(self.initial_delay.saturating_mul(factor), self.max_delay);

        self.current_attempt = self.current_attempt.saturating_add(1);
        log::warn!(
            "⏳ Transport retry attempt {} in {}s",
            self.current_attempt,
            delay.as_secs()
        );
        delay
    }

    pub fn attempts(&self) -> u32 {
        self.current_attempt
    }

    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
