//! Global adaptive rate limiting
//!
//! A single shared delay spaces all outgoing requests. Observed throttling
//! widens the delay multiplicatively; sustained success decays it back down.
//! Both directions are hard-clamped to the configured floor and ceiling, and
//! every adjustment applies to all future acquirers.

use crate::config::RateLimitConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Multiplier applied to the delay when the server signals throttling
const INCREASE_FACTOR: f64 = 1.5;

/// Multiplier applied to the delay on a successful response
const DECAY_FACTOR: f64 = 0.9;

/// Outcome signal reported back after a request completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSignal {
    /// The request succeeded
    Ok,
    /// The server indicated rate limiting (HTTP 429)
    Limited,
}

struct RateState {
    delay: Duration,
    last_granted: Option<Instant>,
}

/// Enforces a minimum inter-request interval shared by every caller
///
/// Acquisition is serialized through one async lock, so concurrent callers
/// are granted strictly one at a time, each spaced by the current delay.
pub struct RateLimiter {
    state: Mutex<RateState>,
    floor: Duration,
    ceiling: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            state: Mutex::new(RateState {
                delay: Duration::from_millis(config.initial_delay_ms),
                last_granted: None,
            }),
            floor: Duration::from_millis(config.min_delay_ms),
            ceiling: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Waits until the minimum delay since the previous grant has elapsed
    ///
    /// The lock is held across the wait on purpose: it is what spaces
    /// concurrent callers instead of releasing them in a burst.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;
        if let Some(last) = state.last_granted {
            let elapsed = last.elapsed();
            if elapsed < state.delay {
                sleep(state.delay - elapsed).await;
            }
        }
        state.last_granted = Some(Instant::now());
    }

    /// Adjusts the shared delay based on an observed response
    pub async fn report(&self, signal: RateSignal) {
        let mut state = self.state.lock().await;
        let adjusted = match signal {
            RateSignal::Limited => state.delay.mul_f64(INCREASE_FACTOR).min(self.ceiling),
            RateSignal::Ok => state.delay.mul_f64(DECAY_FACTOR).max(self.floor),
        };
        if adjusted != state.delay {
            tracing::debug!(
                "Adaptive rate limit: delay {:?} -> {:?}",
                state.delay,
                adjusted
            );
            state.delay = adjusted;
        }
    }

    /// The current inter-request delay (diagnostics and tests)
    pub async fn current_delay(&self) -> Duration {
        self.state.lock().await.delay
    }
}
