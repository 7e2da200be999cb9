use std::time::Duration;

use rand::Rng;

use cohere_core::RegistrationConfig;

/// Capped exponential backoff between registration attempts.
///
/// Each delay gets up to 10% of random jitter on top, never past `max_delay`.
pub struct RetryPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    attempt: u32,
}

impl RetryPolicy {
    pub fn new(config: &RegistrationConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            multiplier: config.multiplier.max(1.0),
            attempt: 0,
        }
    }

    /// Attempts that have failed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn next_delay(&mut self) -> Duration {
        let exponent = self.attempt.min(64) as i32;
        self.attempt = self.attempt.saturating_add(1);

        let max_ms = self.max_delay.as_millis() as f64;
        let base_ms =
            (self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent)).min(max_ms);
        let jittered = base_ms * rand::thread_rng().gen_range(1.0..=1.1);

        Duration::from_millis(jittered.min(max_ms) as u64)
    }
}
