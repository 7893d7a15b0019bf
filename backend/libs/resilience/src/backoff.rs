/// Bounded exponential backoff for reconnecting a dropped live channel
use std::time::Duration;
use tracing::warn;

/// Computes the delay before reconnect attempt `attempt` (1-based)
pub type BackoffFn = fn(base: Duration, attempt: u32) -> Duration;

/// `base * 2^(attempt-1)`, saturating instead of overflowing
pub fn exponential(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32
        .checked_shl(attempt.saturating_sub(1))
        .unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Same delay for every attempt
pub fn fixed(base: Duration, _attempt: u32) -> Duration {
    base
}

/// Reconnect policy: bounded attempts, base delay and the backoff function
///
/// Injected into the connection manager so tests can swap in zero delays.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Attempts allowed after a failure before giving up
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: BackoffFn,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            backoff: exponential,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffFn) -> Self {
        self.backoff = backoff;
        self
    }

    /// Delay before `attempt`, or `None` once the cap is exceeded
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        Some((self.backoff)(self.base_delay, attempt))
    }

    /// Fresh attempt counter bound to this policy
    pub fn tracker(&self) -> Backoff {
        Backoff {
            policy: self.clone(),
            attempt: 0,
        }
    }
}

/// Consecutive-failure counter
///
/// `next_delay` is called once per failure; `reset` on every successful open.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    /// Records a failure and returns the delay before the next attempt,
    /// or `None` when the attempt cap has been exceeded
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt = self.attempt.saturating_add(1);
        let delay = self.policy.delay_for(self.attempt);
        if delay.is_none() {
            warn!(
                "Max reconnect attempts ({}) reached",
                self.policy.max_attempts
            );
        }
        delay
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts scheduled since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}
