//! Circuit breaker for provider rate limiting and IP bans.
//!
//! When the provider answers HTTP 403 (IP ban) or fails repeatedly (429, 5xx,
//! network errors), the breaker opens and refuses all requests for a cooldown
//! period. While open, fetches go straight to fallback data without touching
//! the network.

use crate::sync::lock;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// State of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation, requests are allowed.
    Closed,
    /// Tripped, requests are refused until the cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub const DEFAULT_THRESHOLD: u32 = 3;

    pub fn new(cooldown: Duration) -> Self {
        Self::with_threshold(cooldown, Self::DEFAULT_THRESHOLD)
    }

    /// A threshold of 0 is treated as 1.
    pub fn with_threshold(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
            }),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// Five-minute cooldown, trips after three consecutive failures.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_secs(5 * 60))
    }

    pub fn state(&self) -> BreakerState {
        lock(&self.inner).state
    }

    /// Check if requests are currently allowed. Closes the breaker once the
    /// cooldown has elapsed.
    pub fn is_allowed(&self) -> bool {
        let mut inner = lock(&self.inner);
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    info!("circuit breaker cooldown elapsed, closing");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        lock(&self.inner).consecutive_failures = 0;
    }

    /// Count a failure; opens the breaker once the threshold is reached.
    pub fn record_failure(&self) {
        let mut inner = lock(&self.inner);
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.failure_threshold
            && inner.state == BreakerState::Closed
        {
            inner.state = BreakerState::Open {
                tripped_at: Instant::now(),
            };
            warn!(
                failures = inner.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "circuit breaker tripped after repeated failures"
            );
        }
    }

    /// Immediately open the breaker (403 Forbidden / IP ban).
    pub fn trip(&self) {
        lock(&self.inner).state = BreakerState::Open {
            tripped_at: Instant::now(),
        };
        warn!(
            cooldown_secs = self.cooldown.as_secs(),
            "circuit breaker tripped by provider refusal"
        );
    }

    /// Remaining cooldown (zero if closed).
    pub fn remaining_cooldown(&self) -> Duration {
        match lock(&self.inner).state {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => {
                self.cooldown.saturating_sub(tripped_at.elapsed())
            }
        }
    }
}
