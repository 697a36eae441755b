//! The private DNS configuration engine.
//!
//! [`PrivateDnsEngine`] is the single source of truth for per-network
//! private DNS state: which mode each network runs in, which DoT endpoints
//! are tracked, and how far validation has progressed for each of them.
//!
//! ## Data flow
//!
//! ```text
//! set ──────► registry ──spawn──► validation driver ──► ProbeTransport
//!                ▲                      │
//!                └───────commit────────┘
//!                        │
//!          EventSubscribers + ValidationObserver + AuditLog
//! ```
//!
//! `set` mutates the registry and schedules a detached driver task for every
//! endpoint that needs validation, then returns without waiting for any
//! probe. Drivers write state back through the registry and publish outcomes
//! through the reporter. `get_status` and `dump` are pure reads.
//!
//! ## Locking
//!
//! One mutex protects the mode map, the transport trackers and the observer
//! slot. It is never held across a probe, a sleep, or a listener/observer
//! callback: commits collect their notifications under the lock and dispatch
//! them after the guard drops. The audit log and the subscriber registry
//! carry their own synchronization.
//!
//! ## Cancellation
//!
//! There is no shutdown channel. A driver whose network was torn down or
//! whose endpoint left the configuration observes that at its next commit,
//! records `Fail`, and ends. `clear` and re-`set` rely on this and do not
//! wait for outstanding probes.

mod driver;

use crate::audit::AuditLog;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::events::EventSubscribers;
use crate::server::{
    parse_server, DotServer, NetId, PrivateDnsMode, PrivateDnsStatus, ServerIdentity,
    ValidationState,
};
use crate::traits::{Do53LatencyOracle, FlagStore, ProbeTransport, ValidationObserver};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tracing::debug;

/// Registry state guarded by the engine's single lock
#[derive(Default)]
struct Registry {
    modes: HashMap<NetId, PrivateDnsMode>,
    transports: HashMap<NetId, HashMap<ServerIdentity, DotServer>>,
    observer: Option<Arc<dyn ValidationObserver>>,
}

impl Registry {
    fn server_mut(
        &mut self,
        identity: &ServerIdentity,
        net_id: NetId,
    ) -> Result<&mut DotServer> {
        let tracker = self
            .transports
            .get_mut(&net_id)
            .ok_or_else(|| Error::not_found(format!("netId {net_id} not found")))?;
        tracker
            .get_mut(identity)
            .ok_or_else(|| Error::not_found(format!("server {{{identity}}} not found")))
    }
}

/// An observer notification queued under the lock, delivered after it drops
struct Notice {
    ip_address: String,
    state: ValidationState,
    net_id: NetId,
}

/// Collaborators and state shared between the engine façade and its
/// detached driver tasks
struct Shared {
    registry: Mutex<Registry>,
    probe: Arc<dyn ProbeTransport>,
    oracle: Arc<dyn Do53LatencyOracle>,
    flags: Arc<dyn FlagStore>,
    subscribers: Arc<EventSubscribers>,
    audit: AuditLog,
    config: EngineConfig,
    handle: Handle,
}

/// Private DNS configuration and validation engine.
///
/// Cheap to clone; clones share the same registry. All methods are safe to
/// call concurrently from arbitrary threads; calls on the same network are
/// linearized by the registry lock.
#[derive(Clone)]
pub struct PrivateDnsEngine {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for PrivateDnsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateDnsEngine").finish_non_exhaustive()
    }
}

impl PrivateDnsEngine {
    /// Create an engine from its collaborators.
    ///
    /// Must be called from within a Tokio runtime: the engine captures the
    /// runtime handle so that the synchronous API methods can schedule
    /// detached validation drivers from any thread.
    pub fn new(
        probe: Arc<dyn ProbeTransport>,
        oracle: Arc<dyn Do53LatencyOracle>,
        flags: Arc<dyn FlagStore>,
        subscribers: Arc<EventSubscribers>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let handle = Handle::try_current().map_err(|_| {
            Error::Runtime("PrivateDnsEngine must be created inside a Tokio runtime".to_string())
        })?;

        Ok(Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                probe,
                oracle,
                flags,
                subscribers,
                audit: AuditLog::new(config.audit_log_capacity),
                config,
                handle,
            }),
        })
    }

    /// Install the desired private DNS configuration for a network.
    ///
    /// Each entry of `servers` must be a numeric IP literal; the DoT port is
    /// fixed at 853. Any parse failure rejects the whole call with no state
    /// change. A non-empty `name` selects strict mode, servers without a
    /// name select opportunistic mode, and neither selects off, which drops
    /// the network's entries entirely.
    ///
    /// Returns once every endpoint that needs validation has a driver
    /// scheduled; it never waits for a probe.
    pub fn set(
        &self,
        net_id: NetId,
        mark: u32,
        servers: &[String],
        name: &str,
        ca_cert: &str,
    ) -> Result<()> {
        debug!(
            "set({net_id}, {mark:#x}, {} servers, {name})",
            servers.len()
        );

        // Parse everything before touching shared state.
        let mut desired: HashMap<ServerIdentity, DotServer> = HashMap::new();
        for server in servers {
            let sockaddr = parse_server(server)?;
            let record = DotServer::new(sockaddr, name, ca_cert, mark);
            desired.insert(record.identity().clone(), record);
        }

        let mut notices = Vec::new();
        let mut to_validate = Vec::new();
        let observer;
        {
            let mut registry = self.shared.registry.lock().unwrap();

            if !name.is_empty() {
                registry.modes.insert(net_id, PrivateDnsMode::Strict);
            } else if !desired.is_empty() {
                registry.modes.insert(net_id, PrivateDnsMode::Opportunistic);
            } else {
                registry.modes.remove(&net_id);
                registry.transports.remove(&net_id);
                return Ok(());
            }

            let tracker = registry.transports.entry(net_id).or_default();

            // Add the servers not yet contained in the tracker.
            for (identity, record) in &desired {
                if !tracker.contains_key(identity) {
                    tracker.insert(identity.clone(), record.clone());
                }
            }

            let identities: Vec<ServerIdentity> = tracker.keys().cloned().collect();
            for identity in identities {
                let tracker = registry.transports.get_mut(&net_id).unwrap();
                let record = tracker.get_mut(&identity).unwrap();

                let active = desired.contains_key(&identity);
                record.set_active(active);

                // The validation result of a server that left the desired
                // configuration is no longer reliable.
                if !active && record.validation_state() == ValidationState::Success {
                    update_server_state(
                        &mut registry,
                        &self.shared.audit,
                        &identity,
                        net_id,
                        ValidationState::SuccessButExpired,
                        &mut notices,
                    );
                }

                let tracker = registry.transports.get(&net_id).unwrap();
                if needs_validation(&tracker[&identity]) {
                    update_server_state(
                        &mut registry,
                        &self.shared.audit,
                        &identity,
                        net_id,
                        ValidationState::InProcess,
                        &mut notices,
                    );
                    let snapshot = registry.transports[&net_id][&identity].clone();
                    to_validate.push(snapshot);
                }
            }

            observer = registry.observer.clone();
        }

        dispatch_notices(observer, notices);
        for snapshot in to_validate {
            self.start_validation(snapshot, net_id, false);
        }
        Ok(())
    }

    /// Drop a network's mode and endpoint entries.
    ///
    /// Outstanding drivers for the network self-cancel at their next commit.
    pub fn clear(&self, net_id: NetId) {
        debug!("clear({net_id})");
        let mut registry = self.shared.registry.lock().unwrap();
        registry.modes.remove(&net_id);
        registry.transports.remove(&net_id);
    }

    /// The network's mode plus its active DoT endpoints and their states.
    /// A network with no configuration reports `(Off, [])`.
    pub fn get_status(&self, net_id: NetId) -> PrivateDnsStatus {
        let registry = self.shared.registry.lock().unwrap();

        let Some(mode) = registry.modes.get(&net_id).copied() else {
            return PrivateDnsStatus::off();
        };

        let mut status = PrivateDnsStatus {
            mode,
            dot_servers: Vec::new(),
        };
        if let Some(tracker) = registry.transports.get(&net_id) {
            for record in tracker.values() {
                if record.is_dot() && record.active() {
                    status
                        .dot_servers
                        .push((record.clone(), record.validation_state()));
                }
            }
        }
        status
    }

    /// Re-probe a currently-successful endpoint.
    ///
    /// Revalidation marks the server `InProcess`, which takes it out of use
    /// until the probe passes. That is only tolerable where a fallback
    /// exists, so the request is accepted in opportunistic mode only. The
    /// mark must equal the one captured at configuration time: validation is
    /// bound to a mark obtained with system permission, and must not run on
    /// behalf of a network context that does not own the endpoint.
    pub fn request_validation(
        &self,
        net_id: NetId,
        identity: &ServerIdentity,
        mark: u32,
    ) -> Result<()> {
        let mut notices = Vec::new();
        let snapshot;
        let observer;
        {
            let mut registry = self.shared.registry.lock().unwrap();

            match registry.modes.get(&net_id) {
                None => return Err(Error::UnknownNetwork(net_id)),
                Some(PrivateDnsMode::Opportunistic) => {}
                Some(_) => return Err(Error::NotOpportunistic(net_id)),
            }

            let record = registry
                .transports
                .get(&net_id)
                .and_then(|tracker| tracker.get(identity))
                .ok_or_else(|| Error::ServerNotFound(identity.to_string()))?;

            if !record.active() {
                return Err(Error::ServerInactive(identity.to_string()));
            }
            if record.validation_state() != ValidationState::Success {
                return Err(Error::StateMismatch(identity.to_string()));
            }
            if record.mark() != mark {
                return Err(Error::MarkMismatch(identity.to_string()));
            }

            update_server_state(
                &mut registry,
                &self.shared.audit,
                identity,
                net_id,
                ValidationState::InProcess,
                &mut notices,
            );
            snapshot = registry.transports[&net_id][identity].clone();
            observer = registry.observer.clone();
        }

        dispatch_notices(observer, notices);
        self.start_validation(snapshot, net_id, true);
        Ok(())
    }

    /// Install (or clear) the in-process validation state observer
    pub fn set_observer(&self, observer: Option<Arc<dyn ValidationObserver>>) {
        let mut registry = self.shared.registry.lock().unwrap();
        registry.observer = observer;
    }

    /// Write the validation audit log to `writer`, oldest entry first
    pub fn dump<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "PrivateDnsLog:")?;
        for entry in self.shared.audit.copy() {
            writeln!(writer, "  {entry}")?;
        }
        writeln!(writer)
    }

    fn start_validation(&self, snapshot: DotServer, net_id: NetId, is_revalidation: bool) {
        let shared = Arc::clone(&self.shared);
        self.shared
            .handle
            .spawn(driver::run(shared, snapshot, net_id, is_revalidation));
    }
}

/// Whether a record requires a validation driver.
///
/// `InProcess` already has one; `Success` needs none.
fn needs_validation(record: &DotServer) -> bool {
    // The server is not expected to be used on the network.
    if !record.active() {
        return false;
    }
    match record.validation_state() {
        // The server is newly added.
        ValidationState::Unknown => true,
        // The server has failed at least one validation attempt. Give it
        // another try.
        ValidationState::Fail => true,
        // The previous validation result might be unreliable.
        ValidationState::SuccessButExpired => true,
        ValidationState::InProcess | ValidationState::Success => false,
    }
}

/// Record a state change for `identity`, writing the audit entry and
/// queueing the observer notification. A record that has disappeared
/// under the driver still notifies `Fail` so observers see the terminal
/// transition.
fn update_server_state(
    registry: &mut Registry,
    audit: &AuditLog,
    identity: &ServerIdentity,
    net_id: NetId,
    state: ValidationState,
    notices: &mut Vec<Notice>,
) {
    match registry.server_mut(identity, net_id) {
        Ok(record) => {
            record.set_validation_state(state);
            notices.push(Notice {
                ip_address: identity.ip_string(),
                state,
                net_id,
            });
            audit.push(net_id, identity.clone(), state);
        }
        Err(_) => {
            notices.push(Notice {
                ip_address: identity.ip_string(),
                state: ValidationState::Fail,
                net_id,
            });
        }
    }
}

/// Deliver queued observer notifications; called with the registry lock
/// released
fn dispatch_notices(observer: Option<Arc<dyn ValidationObserver>>, notices: Vec<Notice>) {
    let Some(observer) = observer else {
        return;
    };
    for notice in notices {
        observer.on_validation_state_update(&notice.ip_address, notice.state, notice.net_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(active: bool, state: ValidationState) -> DotServer {
        let mut record = DotServer::new("1.1.1.1:853".parse().unwrap(), "", "", 0);
        record.set_active(active);
        record.set_validation_state(state);
        record
    }

    #[test]
    fn needs_validation_gates_on_state_and_activity() {
        assert!(needs_validation(&record(true, ValidationState::Unknown)));
        assert!(needs_validation(&record(true, ValidationState::Fail)));
        assert!(needs_validation(&record(
            true,
            ValidationState::SuccessButExpired
        )));

        assert!(!needs_validation(&record(true, ValidationState::InProcess)));
        assert!(!needs_validation(&record(true, ValidationState::Success)));
        assert!(!needs_validation(&record(false, ValidationState::Unknown)));
        assert!(!needs_validation(&record(false, ValidationState::Fail)));
    }
}
