//! Token-bucket admission control shared by every inbound call

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use crate::clock::Clock;
use crate::config::RateLimitConfig;
use crate::errors::AppError;

use super::{GuardStage, InboundCall};

#[derive(Debug)]
struct BucketState {
    available: u32,
    /// Sub-token refill carried between admissions, always in `[0, 1)`.
    fractional: f64,
    last_refill_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimiterSnapshot {
    pub enabled: bool,
    pub capacity: u32,
    pub available_tokens: u32,
    pub refill_per_second: f64,
    pub last_refill_epoch_millis: u64,
}

#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    capacity: u32,
    refill_per_ms: f64,
    clock: Arc<dyn Clock>,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.capacity.max(1);
        let refill_per_ms = if config.refill_per_second > 0.0 {
            config.refill_per_second / 1000.0
        } else {
            0.0
        };
        let now = clock.now_ms();

        Self {
            enabled: config.enabled,
            capacity,
            refill_per_ms,
            clock,
            state: Mutex::new(BucketState {
                available: capacity,
                fractional: 0.0,
                last_refill_ms: now,
            }),
        }
    }

    /// Takes one token, returning how many remain. Rejections leave the bucket untouched.
    ///
    /// A disabled limiter admits everything and reports `None`.
    pub fn try_acquire(&self) -> Result<Option<u32>, AppError> {
        if !self.enabled {
            return Ok(None);
        }

        let now = self.clock.now_ms();
        let mut state = self.state.lock();
        self.refill(&mut state, now);

        if state.available == 0 {
            return Err(AppError::RateLimited {
                capacity: self.capacity,
            });
        }

        state.available -= 1;
        Ok(Some(state.available))
    }

    fn refill(&self, state: &mut BucketState, now: u64) {
        if now <= state.last_refill_ms {
            return;
        }

        let elapsed_ms = (now - state.last_refill_ms) as f64;
        let tokens_to_add = elapsed_ms * self.refill_per_ms + state.fractional;
        let capacity = f64::from(self.capacity);
        let current = f64::from(state.available);

        let refilled = (current + tokens_to_add.floor()).min(capacity);
        let new_available = refilled as u32;
        state.available = new_available;
        state.fractional = if new_available >= self.capacity {
            0.0
        } else {
            ((current + tokens_to_add).min(capacity) - refilled).max(0.0)
        };
        state.last_refill_ms = now;
    }

    pub fn snapshot(&self) -> RateLimiterSnapshot {
        let state = self.state.lock();
        RateLimiterSnapshot {
            enabled: self.enabled,
            capacity: self.capacity,
            available_tokens: state.available,
            refill_per_second: self.refill_per_ms * 1000.0,
            last_refill_epoch_millis: state.last_refill_ms,
        }
    }
}

pub struct RateLimitGuard {
    limiter: Arc<RateLimiter>,
}

impl RateLimitGuard {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl GuardStage for RateLimitGuard {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    fn check(&self, call: &mut InboundCall) -> Result<(), AppError> {
        let remaining = self.limiter.try_acquire()?;
        if let Some(remaining) = remaining {
            debug!(tokens_remaining = remaining, "rate limiter admitted call");
        }
        call.tokens_remaining = remaining;
        Ok(())
    }
}
