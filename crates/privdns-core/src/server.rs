//! Endpoint identity and per-endpoint record types.
//!
//! A [`ServerIdentity`] names an encrypted-DNS endpoint by socket address and
//! provider hostname; a [`DotServer`] is the mutable record the registry
//! keeps for it. Validation drivers work on value snapshots of a record and
//! never alias the canonical copy; all mutation goes through the registry
//! lock.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Opaque integer identifying a logical network context
pub type NetId = i32;

/// DNS-over-TLS service port
pub const DOT_PORT: u16 = 853;

/// Parse a textual server address as a numeric host with the DoT port.
///
/// No DNS lookup is performed; anything that is not an IP literal is an
/// error.
pub fn parse_server(server: &str) -> Result<SocketAddr> {
    let ip: IpAddr = server
        .trim()
        .parse()
        .map_err(|_| Error::invalid_server(server))?;
    Ok(SocketAddr::new(ip, DOT_PORT))
}

/// Identity of an encrypted-DNS endpoint: socket address plus provider
/// hostname. An empty provider means the endpoint was configured for
/// opportunistic use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerIdentity {
    pub sockaddr: SocketAddr,
    pub provider: String,
}

impl ServerIdentity {
    pub fn new(sockaddr: SocketAddr, provider: impl Into<String>) -> Self {
        Self {
            sockaddr,
            provider: provider.into(),
        }
    }

    /// True if the endpoint was created while the mode was opportunistic
    pub fn is_opportunistic(&self) -> bool {
        self.provider.is_empty()
    }

    /// The bare IP address, as reported to observers and event listeners
    pub fn ip_string(&self) -> String {
        self.sockaddr.ip().to_string()
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sockaddr, self.provider)
    }
}

/// Validation state of an endpoint record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationState {
    /// Newly added, never probed
    Unknown,
    /// A validation driver is running for this record
    InProcess,
    Success,
    /// Was `Success`, but the record left the desired configuration so the
    /// result is no longer reliable
    SuccessButExpired,
    Fail,
}

impl ValidationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationState::Unknown => "unknown",
            ValidationState::InProcess => "in_process",
            ValidationState::Success => "success",
            ValidationState::SuccessButExpired => "success_but_expired",
            ValidationState::Fail => "fail",
        }
    }
}

impl fmt::Display for ValidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-network private DNS mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivateDnsMode {
    #[default]
    Off,
    Opportunistic,
    Strict,
}

impl fmt::Display for PrivateDnsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrivateDnsMode::Off => "off",
            PrivateDnsMode::Opportunistic => "opportunistic",
            PrivateDnsMode::Strict => "strict",
        })
    }
}

/// Transport kind of an endpoint record. Operations that differ per kind
/// dispatch on this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Dot,
}

/// The per-endpoint record owned by the registry.
///
/// `mark` is an opaque network-association token captured at configuration
/// time and immutable thereafter. `active` tracks membership in the most
/// recent desired configuration. The validation state is only ever written
/// under the registry lock.
#[derive(Debug, Clone)]
pub struct DotServer {
    identity: ServerIdentity,
    ca_cert: String,
    mark: u32,
    active: bool,
    state: ValidationState,
    latency_threshold_ms: Option<i64>,
    kind: TransportKind,
}

impl DotServer {
    pub fn new(sockaddr: SocketAddr, provider: &str, ca_cert: &str, mark: u32) -> Self {
        Self {
            identity: ServerIdentity::new(sockaddr, provider),
            ca_cert: ca_cert.to_string(),
            mark,
            active: false,
            state: ValidationState::Unknown,
            latency_threshold_ms: None,
            kind: TransportKind::Dot,
        }
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn sockaddr(&self) -> SocketAddr {
        self.identity.sockaddr
    }

    /// Provider hostname to verify during the TLS handshake; empty for
    /// opportunistic endpoints
    pub fn provider(&self) -> &str {
        &self.identity.provider
    }

    /// CA certificate (PEM) for probe transports; opaque to the engine
    pub fn ca_cert(&self) -> &str {
        &self.ca_cert
    }

    pub fn mark(&self) -> u32 {
        self.mark
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub(crate) fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn validation_state(&self) -> ValidationState {
        self.state
    }

    pub(crate) fn set_validation_state(&mut self, state: ValidationState) {
        self.state = state;
    }

    /// Probe latency threshold in milliseconds, set by the validation driver
    /// for opportunistic endpoints when latency gating is enabled
    pub fn latency_threshold(&self) -> Option<i64> {
        self.latency_threshold_ms
    }

    pub(crate) fn set_latency_threshold(&mut self, threshold_ms: Option<i64>) {
        self.latency_threshold_ms = threshold_ms;
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn is_dot(&self) -> bool {
        matches!(self.kind, TransportKind::Dot)
    }

    pub fn is_opportunistic(&self) -> bool {
        self.identity.is_opportunistic()
    }

    pub fn ip_string(&self) -> String {
        self.identity.ip_string()
    }
}

/// Snapshot returned by `get_status`: the network's mode plus the active
/// DoT endpoints and their validation states.
#[derive(Debug, Clone, Default)]
pub struct PrivateDnsStatus {
    pub mode: PrivateDnsMode,
    pub dot_servers: Vec<(DotServer, ValidationState)>,
}

impl PrivateDnsStatus {
    /// Status of a network with no private DNS configuration
    pub fn off() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_server_fixes_port() {
        let addr = parse_server("1.1.1.1").unwrap();
        assert_eq!(addr, "1.1.1.1:853".parse().unwrap());

        let addr6 = parse_server("2001:4860:4860::8888").unwrap();
        assert_eq!(addr6.port(), DOT_PORT);
        assert!(addr6.is_ipv6());
    }

    #[test]
    fn parse_server_rejects_names_and_garbage() {
        for bad in ["dns.example", "1.1.1.1:853", "", "256.0.0.1", "not-an-address"] {
            assert!(parse_server(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn identity_opportunistic_iff_provider_empty() {
        let addr = "9.9.9.9:853".parse().unwrap();
        assert!(ServerIdentity::new(addr, "").is_opportunistic());
        assert!(!ServerIdentity::new(addr, "dns.quad9.net").is_opportunistic());
    }

    #[test]
    fn identity_equality_covers_both_components() {
        let addr = "9.9.9.9:853".parse().unwrap();
        let a = ServerIdentity::new(addr, "dns.quad9.net");
        let b = ServerIdentity::new(addr, "");
        assert_ne!(a, b);
        assert_eq!(a, ServerIdentity::new(addr, "dns.quad9.net"));
    }

    #[test]
    fn new_record_starts_unknown_and_inactive() {
        let server = DotServer::new("8.8.8.8:853".parse().unwrap(), "", "", 0x1);
        assert_eq!(server.validation_state(), ValidationState::Unknown);
        assert!(!server.active());
        assert!(server.is_dot());
        assert_eq!(server.latency_threshold(), None);
    }
}
