//! Bounded audit log of validation state changes.

use crate::server::{NetId, ServerIdentity, ValidationState};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

/// One recorded state change
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub net_id: NetId,
    pub identity: ServerIdentity,
    pub state: ValidationState,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - netId={} PrivateDns={{{}}} state={}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.net_id,
            self.identity,
            self.state,
        )
    }
}

/// Bounded FIFO of validation state changes.
///
/// Has its own internal synchronization so writers never need the registry
/// lock. Overflow drops the oldest entry.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Record a state change, stamped with the current wall clock
    pub fn push(&self, net_id: NetId, identity: ServerIdentity, state: ValidationState) {
        let entry = AuditEntry {
            timestamp: Utc::now(),
            net_id,
            identity,
            state,
        };
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Atomic snapshot of the log, oldest first
    pub fn copy(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }
}
