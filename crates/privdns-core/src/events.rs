//! Validation event fan-out.
//!
//! Two independent, ordered subscriber lists receive every validation
//! outcome: *classic* listeners get the flat
//! `(net_id, ip, hostname, success)` callback, *unsolicited* listeners get a
//! serializable [`ValidationEventParcel`]. Delivery is synchronous and in
//! registration order; a failing listener is logged and skipped, never
//! aborting delivery to the rest.
//!
//! The subscriber registry is process-wide by nature (resolver event
//! listeners register once, not per engine), so a [`EventSubscribers::global`]
//! default exists; tests and embedders inject their own instance instead.

use crate::server::{NetId, ServerIdentity};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, error, warn};

/// Classic validation event listener
pub trait ValidationEventListener: Send + Sync {
    fn on_private_dns_validation(
        &self,
        net_id: NetId,
        ip_address: &str,
        hostname: &str,
        success: bool,
    ) -> anyhow::Result<()>;
}

/// Unsolicited event listener, receiving the structured parcel
pub trait UnsolicitedEventListener: Send + Sync {
    fn on_private_dns_validation_event(
        &self,
        event: &ValidationEventParcel,
    ) -> anyhow::Result<()>;
}

/// Validation outcome carried by the unsolicited event parcel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    Success,
    Failure,
}

/// Payload delivered to unsolicited event listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationEventParcel {
    pub net_id: NetId,
    pub ip_address: String,
    pub hostname: String,
    pub validation: ValidationResult,
}

lazy_static! {
    static ref GLOBAL_SUBSCRIBERS: Arc<EventSubscribers> = Arc::new(EventSubscribers::new());
}

/// Registry of validation event subscribers
#[derive(Default)]
pub struct EventSubscribers {
    listeners: RwLock<Vec<Arc<dyn ValidationEventListener>>>,
    unsol_listeners: RwLock<Vec<Arc<dyn UnsolicitedEventListener>>>,
}

impl EventSubscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide default registry
    pub fn global() -> Arc<EventSubscribers> {
        GLOBAL_SUBSCRIBERS.clone()
    }

    /// Register a classic listener. Listeners are notified in registration
    /// order and are never removed.
    pub fn add_listener(&self, listener: Arc<dyn ValidationEventListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    /// Register an unsolicited event listener
    pub fn add_unsolicited_listener(&self, listener: Arc<dyn UnsolicitedEventListener>) {
        self.unsol_listeners.write().unwrap().push(listener);
    }

    /// Fan a validation outcome out to both subscriber lists.
    ///
    /// `success` is the event's `succeeded_quickly` payload: a probe that
    /// answered but blew the latency threshold reports `false` here.
    pub fn notify_validation(&self, identity: &ServerIdentity, net_id: NetId, success: bool) {
        debug!(
            "sending validation {} event on netId {} for {} with hostname {{{}}}",
            if success { "success" } else { "failure" },
            net_id,
            identity.ip_string(),
            identity.provider,
        );

        let listeners = self.listeners.read().unwrap().clone();
        if listeners.is_empty() {
            error!("validation event not sent since no event listener is available");
        }
        for listener in &listeners {
            if let Err(e) = listener.on_private_dns_validation(
                net_id,
                &identity.ip_string(),
                &identity.provider,
                success,
            ) {
                warn!("validation event listener failed: {e}");
            }
        }

        let parcel = ValidationEventParcel {
            net_id,
            ip_address: identity.ip_string(),
            hostname: identity.provider.clone(),
            validation: if success {
                ValidationResult::Success
            } else {
                ValidationResult::Failure
            },
        };
        let unsol = self.unsol_listeners.read().unwrap().clone();
        for listener in &unsol {
            if let Err(e) = listener.on_private_dns_validation_event(&parcel) {
                warn!("unsolicited event listener failed: {e}");
            }
        }
    }
}
