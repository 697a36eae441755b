//! # privdns-core
//!
//! Private DNS (DNS-over-TLS) configuration and validation engine.
//!
//! This library is the per-network registry behind a platform's "Private
//! DNS" setting: it tracks the desired DoT endpoints of each network,
//! drives asynchronous probe workflows to decide whether each endpoint is
//! usable, classifies endpoints under the `Off`/`Opportunistic`/`Strict`
//! mode policy, and publishes validation state transitions to observers.
//!
//! It deliberately does **not** resolve DNS, perform TLS, or own sockets.
//! Those live behind collaborator traits:
//! - [`ProbeTransport`]: the actual TLS handshake + canary query
//! - [`Do53LatencyOracle`]: moving-average plaintext DNS latency, used to
//!   gate opportunistic endpoints that are much slower than Do53
//! - [`FlagStore`]: runtime feature flags
//! - [`EventSubscribers`] / [`ValidationObserver`]: event sinks
//!
//! The engine requires a Tokio runtime; validation drivers are detached
//! tasks that may sleep for up to an hour between probe attempts.

pub mod audit;
pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod server;
pub mod traits;

// Re-export core types for convenience
pub use audit::{AuditEntry, AuditLog};
pub use backoff::{Backoff, BackoffBuilder};
pub use config::EngineConfig;
pub use engine::PrivateDnsEngine;
pub use error::{Error, Result};
pub use events::{
    EventSubscribers, UnsolicitedEventListener, ValidationEventListener, ValidationEventParcel,
    ValidationResult,
};
pub use server::{
    parse_server, DotServer, NetId, PrivateDnsMode, PrivateDnsStatus, ServerIdentity,
    TransportKind, ValidationState, DOT_PORT,
};
pub use traits::{
    Do53LatencyOracle, FlagStore, ProbeTransport, Protocol, StaticFlagStore, ValidationObserver,
};
