//! Do53 latency oracle trait.

use crate::server::NetId;
use async_trait::async_trait;
use std::time::Duration;

/// Plaintext DNS transport protocol selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Udp,
    Tcp,
}

/// Source of the moving-average Do53 response time for a network.
///
/// The validation driver consults this between probes when latency gating is
/// enabled: regular Do53 traffic keeps updating the average, so the value is
/// re-read before every probe rather than once per driver.
#[async_trait]
pub trait Do53LatencyOracle: Send + Sync {
    /// Moving-average response time of the network's Do53 servers, or `None`
    /// when no samples exist
    async fn average_latency(&self, net_id: NetId, protocol: Protocol) -> Option<Duration>;
}
