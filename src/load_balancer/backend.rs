//! Backend identity.
//!
//! # Responsibilities
//! - Represent a single configured backend server by its address
//! - Own the set of client hashes currently routed to it

use std::collections::HashSet;
use std::fmt;

use crate::load_balancer::hasher::KeyHash;

/// Stable index of a backend in the registry.
///
/// Registry order never changes, so an id stays valid for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(pub usize);

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single backend server.
#[derive(Debug, Clone)]
pub struct Backend {
    /// The `host:port` address of the backend.
    name: String,
    /// Client hashes currently assigned to this backend.
    assignments: HashSet<KeyHash>,
}

impl Backend {
    /// Create a backend with no assignments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assignments: HashSet::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true if `hash` is currently routed here.
    pub fn holds(&self, hash: KeyHash) -> bool {
        self.assignments.contains(&hash)
    }

    /// Number of client hashes currently routed here.
    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub(crate) fn insert(&mut self, hash: KeyHash) -> bool {
        self.assignments.insert(hash)
    }

    pub(crate) fn remove(&mut self, hash: KeyHash) -> bool {
        self.assignments.remove(&hash)
    }

    /// Drop every assignment, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.assignments.len();
        self.assignments.clear();
        dropped
    }
}
