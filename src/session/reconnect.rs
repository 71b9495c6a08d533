//! Reconnection policy
//!
//! Bounds consecutive failed connection attempts and paces retries. The
//! baseline delay is fixed; a multiplier above 1.0 turns it into capped
//! exponential backoff without changing the attempt budget.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::Config;

/// Phase of the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPhase {
    /// No failure since the last success or reset
    Idle,
    /// At least one failure, budget left
    Attempting,
    /// Budget spent; stays here until `reset`
    Exhausted,
}

/// Consecutive-failure budget and retry pacing
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    delay: Duration,
    multiplier: f64,
    max_delay: Duration,
    attempt_count: u32,
    last_attempt_at: Option<Instant>,
    phase: ReconnectPhase,
}

impl ReconnectPolicy {
    /// Fixed-delay policy
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            multiplier: 1.0,
            max_delay: delay,
            attempt_count: 0,
            last_attempt_at: None,
            phase: ReconnectPhase::Idle,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.max_reconnect_attempts, config.reconnect_delay())
            .with_backoff(config.reconnect_backoff_multiplier, config.max_reconnect_delay())
    }

    /// Grow the delay by `multiplier` per consecutive failure, capped at `max_delay`
    pub fn with_backoff(mut self, multiplier: f64, max_delay: Duration) -> Self {
        self.multiplier = if multiplier.is_finite() { multiplier.max(1.0) } else { 1.0 };
        self.max_delay = max_delay.max(self.delay);
        self
    }

    /// Whether another attempt is allowed
    pub fn should_retry(&self) -> bool {
        self.attempt_count < self.max_attempts
    }

    /// Count a failed attempt
    pub fn record_failure(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.last_attempt_at = Some(Instant::now());

        if self.should_retry() {
            self.phase = ReconnectPhase::Attempting;
            debug!(
                attempt = self.attempt_count,
                max_attempts = self.max_attempts,
                "Connection attempt failed"
            );
        } else {
            self.phase = ReconnectPhase::Exhausted;
            warn!(
                max_attempts = self.max_attempts,
                "Maximum reconnection attempts reached"
            );
        }
    }

    /// A connection was established
    pub fn record_success(&mut self) {
        self.attempt_count = 0;
        self.phase = ReconnectPhase::Idle;
    }

    /// External reset, e.g. a user-triggered reconnect
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.last_attempt_at = None;
        self.phase = ReconnectPhase::Idle;
    }

    /// Wait before the next attempt
    pub fn delay(&self) -> Duration {
        if self.multiplier <= 1.0 || self.attempt_count <= 1 {
            return self.delay;
        }

        let exponent = (self.attempt_count - 1).min(32) as i32;
        let factor = self.multiplier.powi(exponent);
        if self.delay.as_secs_f64() * factor >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        self.delay.mul_f64(factor)
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn last_attempt_at(&self) -> Option<Instant> {
        self.last_attempt_at
    }

    pub fn phase(&self) -> ReconnectPhase {
        self.phase
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(5))
    }
}
