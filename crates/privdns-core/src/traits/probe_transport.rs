//! Probe transport trait.
//!
//! The engine never performs TLS itself. A probe transport attempts a TLS
//! handshake plus a canary query against one endpoint and reports whether a
//! valid DNS response was received over the encrypted channel.

use crate::server::DotServer;
use async_trait::async_trait;

/// Trait for probe transport implementations
///
/// `probe` may take milliseconds to minutes (up to the transport's SYN retry
/// limit). Implementations must be thread-safe; blocking socket work belongs
/// on a blocking-capable task inside the implementation, not on the caller's
/// executor thread.
///
/// Probe failure is a datum, not an error: there is no error channel, and
/// the engine owns all retry policy.
#[async_trait]
pub trait ProbeTransport: Send + Sync {
    /// Attempt a handshake + canary query against `server`.
    ///
    /// `mark` is the socket mark captured when the endpoint was configured;
    /// it selects the routing/socket policy for the probe sockets.
    ///
    /// Returns `true` iff a valid DNS response was received over TLS.
    async fn probe(&self, server: &DotServer, mark: u32) -> bool;
}
