//! Engine configuration.
//!
//! Everything that shapes validation behavior is explicit configuration:
//! the backoff schedule, the opportunistic attempt cap and the latency
//! threshold bounds. Runtime flags read through
//! [`FlagStore`](crate::traits::FlagStore) can override the latency bounds
//! per deployment; the values here are the engine-side defaults.

use crate::backoff::BackoffBuilder;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Names of the runtime flags the validation driver consults
pub mod flags {
    /// Enables latency gating of opportunistic endpoints and the
    /// opportunistic attempt cap (0 = off)
    pub const AVOID_BAD_PRIVATE_DNS: &str = "avoid_bad_private_dns";
    /// Lower clamp of the probe latency threshold, milliseconds
    pub const MIN_LATENCY_THRESHOLD_MS: &str = "min_private_dns_latency_threshold_ms";
    /// Upper clamp of the probe latency threshold, milliseconds
    pub const MAX_LATENCY_THRESHOLD_MS: &str = "max_private_dns_latency_threshold_ms";
}

pub const DEFAULT_MIN_LATENCY_THRESHOLD_MS: i64 = 200;
pub const DEFAULT_MAX_LATENCY_THRESHOLD_MS: i64 = 2000;
pub const DEFAULT_OPPORTUNISTIC_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_AUDIT_LOG_CAPACITY: usize = 100;

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry schedule for validation drivers
    #[serde(default)]
    pub backoff: BackoffBuilder,

    /// Attempt cap for opportunistic endpoints while latency gating is on
    pub opportunistic_max_attempts: u32,

    /// Default lower clamp of the latency threshold (milliseconds)
    pub min_latency_threshold_ms: i64,

    /// Default upper clamp of the latency threshold (milliseconds)
    pub max_latency_threshold_ms: i64,

    /// Capacity of the bounded validation audit log
    pub audit_log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffBuilder::default(),
            opportunistic_max_attempts: DEFAULT_OPPORTUNISTIC_MAX_ATTEMPTS,
            min_latency_threshold_ms: DEFAULT_MIN_LATENCY_THRESHOLD_MS,
            max_latency_threshold_ms: DEFAULT_MAX_LATENCY_THRESHOLD_MS,
            audit_log_capacity: DEFAULT_AUDIT_LOG_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.backoff.validate()?;

        if self.opportunistic_max_attempts == 0 {
            return Err(crate::Error::config(
                "opportunistic_max_attempts must be >= 1",
            ));
        }
        if self.min_latency_threshold_ms > self.max_latency_threshold_ms {
            return Err(crate::Error::config(
                "min_latency_threshold_ms must be <= max_latency_threshold_ms",
            ));
        }
        if self.audit_log_capacity == 0 {
            return Err(crate::Error::config("audit_log_capacity must be >= 1"));
        }
        Ok(())
    }
}
