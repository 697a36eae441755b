//! Bounded retry backoff for validation drivers.
//!
//! Produces a finite, monotonic non-decreasing sequence of delays. The
//! defaults start at one minute and double up to an hourly cap:
//!
//! Assumptions:
//!     [1] Each TLS validation is ~10KB of certs+handshake+payload.
//!     [2] Networks typically provision clients with <=4 nameservers.
//!     [3] Average month has 30 days.
//!
//! Each validation pass in a given hour is ~1.2MB of data, and 24 such
//! passes per day is about ~30MB per month in the worst case.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff schedule configuration.
///
/// `build()` yields a fresh [`Backoff`] for each validation driver. The
/// schedule is explicit configuration: tests shrink it to milliseconds,
/// deployments retune the retry budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffBuilder {
    /// First delay (milliseconds)
    pub initial_delay_ms: u64,
    /// Delay cap (milliseconds)
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays
    pub multiplier: u32,
    /// Total number of delays the sequence yields
    pub max_timeouts: u32,
}

impl Default for BackoffBuilder {
    fn default() -> Self {
        Self {
            initial_delay_ms: 60_000,   // 1 minute
            max_delay_ms: 3_600_000,    // 1 hour
            multiplier: 2,
            max_timeouts: 30,           // ~one day of retries once capped
        }
    }
}

impl BackoffBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    pub fn with_max_timeouts(mut self, max_timeouts: u32) -> Self {
        self.max_timeouts = max_timeouts;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.initial_delay_ms == 0 {
            return Err(Error::config("backoff initial delay must be > 0"));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(Error::config(
                "backoff max delay must be >= initial delay",
            ));
        }
        if self.multiplier == 0 {
            return Err(Error::config("backoff multiplier must be >= 1"));
        }
        Ok(())
    }

    /// Build a fresh sequence starting from the initial delay
    pub fn build(&self) -> Backoff {
        Backoff {
            current_ms: self.initial_delay_ms,
            max_delay_ms: self.max_delay_ms.max(self.initial_delay_ms),
            multiplier: u64::from(self.multiplier.max(1)),
            remaining: self.max_timeouts,
        }
    }
}

/// A single driver's retry schedule
#[derive(Debug, Clone)]
pub struct Backoff {
    current_ms: u64,
    max_delay_ms: u64,
    multiplier: u64,
    remaining: u32,
}

impl Backoff {
    /// Whether another delay is available
    pub fn has_next(&self) -> bool {
        self.remaining > 0
    }

    /// The next delay. Advances the sequence; once the budget is spent the
    /// cap is returned unchanged.
    pub fn next(&mut self) -> Duration {
        let delay = Duration::from_millis(self.current_ms);
        self.remaining = self.remaining.saturating_sub(1);
        self.current_ms = self
            .current_ms
            .saturating_mul(self.multiplier)
            .min(self.max_delay_ms);
        delay
    }
}
