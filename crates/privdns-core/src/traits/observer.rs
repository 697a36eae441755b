//! Validation state observer trait.

use crate::server::{NetId, ValidationState};

/// The single in-process observer of validation state transitions.
///
/// Installed via
/// [`PrivateDnsEngine::set_observer`](crate::engine::PrivateDnsEngine::set_observer).
/// The observer is called for every recorded state change, including the
/// `InProcess` and `SuccessButExpired` transitions made by configuration
/// updates, not just probe outcomes. Callbacks run outside the registry lock
/// and must be bounded; ordering relative to event subscribers is
/// unspecified.
pub trait ValidationObserver: Send + Sync {
    fn on_validation_state_update(&self, ip_address: &str, state: ValidationState, net_id: NetId);
}
