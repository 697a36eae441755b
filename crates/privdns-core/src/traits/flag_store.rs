//! Runtime flag store trait and the in-tree map-backed implementation.

use std::collections::HashMap;
use std::sync::RwLock;

/// Source of runtime integer flags (experiment values).
///
/// Flag names used by the engine live in [`crate::config::flags`]. Reads are
/// cheap and synchronous; the driver re-reads its flags once per spawned
/// task.
pub trait FlagStore: Send + Sync {
    /// The flag's value, or `default_value` when unset
    fn get_int(&self, name: &str, default_value: i64) -> i64;
}

/// Map-backed flag store.
///
/// An empty store answers every query with the supplied default, which makes
/// it the natural choice both for deployments without an experiment system
/// and for tests that pin individual flags.
#[derive(Debug, Default)]
pub struct StaticFlagStore {
    values: RwLock<HashMap<String, i64>>,
}

impl StaticFlagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a flag value
    pub fn set(&self, name: impl Into<String>, value: i64) {
        self.values.write().unwrap().insert(name.into(), value);
    }

    /// Remove a flag, restoring the caller-supplied default
    pub fn unset(&self, name: &str) {
        self.values.write().unwrap().remove(name);
    }
}

impl FlagStore for StaticFlagStore {
    fn get_int(&self, name: &str, default_value: i64) -> i64 {
        self.values
            .read()
            .unwrap()
            .get(name)
            .copied()
            .unwrap_or(default_value)
    }
}
