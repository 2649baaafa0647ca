// # Seen Hosts
//
// Grow-only set of exposed hosts that have been handed to the DNS updater.
//
// ## Invariant
//
// For any host, `should_process` returns `true` at most once over the
// lifetime of a `SeenHosts` value. There is no removal operation.
//
// ## Ownership
//
// A `SeenHosts` is owned by exactly one `ReconciliationLoop` and mutated
// only from the loop's task, so it carries no locking.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Grow-only record of exposed hosts already synchronized
///
/// # Example
///
/// ```rust
/// use tunnel_dns_core::state::SeenHosts;
///
/// let mut seen = SeenHosts::new();
/// assert!(seen.should_process("a.example.com"));
/// assert!(!seen.should_process("a.example.com"));
/// assert_eq!(seen.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct SeenHosts {
    hosts: HashMap<String, DateTime<Utc>>,
}

impl SeenHosts {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether `host` still needs to be synchronized
    ///
    /// Returns `true` and records the host on its first occurrence,
    /// `false` on every later occurrence.
    pub fn should_process(&mut self, host: &str) -> bool {
        if self.hosts.contains_key(host) {
            return false;
        }
        self.hosts.insert(host.to_string(), Utc::now());
        true
    }

    /// Whether `host` has already been recorded
    pub fn contains(&self, host: &str) -> bool {
        self.hosts.contains_key(host)
    }

    /// When `host` was first recorded
    pub fn first_seen(&self, host: &str) -> Option<DateTime<Utc>> {
        self.hosts.get(host).copied()
    }

    /// Number of hosts recorded
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether no host has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// All recorded hosts, in no particular order
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.hosts.keys().map(String::as_str)
    }
}
