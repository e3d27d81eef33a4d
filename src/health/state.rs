//! Backend liveness state.
//!
//! # States
//! - Live: backend is a candidate for new assignments
//! - Down: backend is skipped by the probe ring
//!
//! # State Transitions
//! ```text
//! Down → Live: one successful probe
//! Live → Down: one failed or timed-out probe (assignments purged)
//! ```
//!
//! Membership is independent of assignments: a backend leaves the live set
//! before its assignments are purged, and the router performs both under one lock.

use std::collections::BTreeSet;

use crate::load_balancer::BackendId;

/// The subset of registry entries currently considered reachable.
#[derive(Debug, Clone, Default)]
pub struct LiveSet {
    members: BTreeSet<BackendId>,
}

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id`. Returns true if it was not already live.
    pub fn mark_live(&mut self, id: BackendId) -> bool {
        self.members.insert(id)
    }

    /// Remove `id`. Returns true if it was live.
    pub fn mark_down(&mut self, id: BackendId) -> bool {
        self.members.remove(&id)
    }

    pub fn contains(&self, id: BackendId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Outcome of feeding one probe result into the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Backend was down and is now live.
    Up,
    /// Backend was live and is now down; `purged` assignments were dropped.
    Down { purged: usize },
    /// Membership did not change. A down report still purges stale assignments.
    Unchanged { purged: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idempotent_membership() {
        let mut live = LiveSet::new();
        assert!(live.is_empty());

        assert!(live.mark_live(BackendId(1)));
        assert!(!live.mark_live(BackendId(1)));
        assert!(live.mark_live(BackendId(0)));
        assert_eq!(live.len(), 2);
        assert!(!live.is_empty());

        assert!(live.mark_down(BackendId(0)));
        assert!(!live.mark_down(BackendId(0)));
        assert!(!live.contains(BackendId(0)));
        assert!(live.contains(BackendId(1)));
    }
}
