//! Collaborator interfaces consumed by the engine.
//!
//! - [`ProbeTransport`]: perform the actual TLS handshake + canary query
//! - [`Do53LatencyOracle`]: moving-average Do53 response time per network
//! - [`FlagStore`]: runtime feature flags
//! - [`ValidationObserver`]: single in-process observer of state transitions

pub mod flag_store;
pub mod latency_oracle;
pub mod observer;
pub mod probe_transport;

pub use flag_store::{FlagStore, StaticFlagStore};
pub use latency_oracle::{Do53LatencyOracle, Protocol};
pub use observer::ValidationObserver;
pub use probe_transport::ProbeTransport;
