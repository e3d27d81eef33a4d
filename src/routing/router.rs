//! Sticky key-to-backend routing.
//!
//! # Responsibilities
//! - Find the backend a client key is already bound to
//! - Bind unassigned keys to the first live backend in ring order
//! - Apply liveness reports, purging assignments of backends that go down
//!
//! # Design Decisions
//! - One mutex guards the registry and the live set together, so resolve,
//!   assign and purge are serialized and a hash never has two owners
//! - The lock is never held across an await point
//! - Lookup scans the whole ring: an assignment may sit past its natural slot
//!   when the natural owner was down at assignment time

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::BalancerError;
use crate::health::state::{LiveSet, Transition};
use crate::load_balancer::{hash_key, BackendId, KeyHash, Registry};
use crate::observability::metrics;

/// Point-in-time view of one backend, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    pub id: BackendId,
    pub name: String,
    pub live: bool,
    pub assignments: usize,
}

#[derive(Debug)]
struct RouterState {
    registry: Registry,
    live: LiveSet,
    /// Diagnostic only.
    last_used: Option<BackendId>,
}

impl RouterState {
    fn resolve(&self, hash: KeyHash) -> Option<BackendId> {
        self.registry.owner_of(hash)
    }

    fn assign(&mut self, hash: KeyHash) -> Result<BackendId, BalancerError> {
        if self.live.is_empty() {
            return Err(BalancerError::NoLiveBackend);
        }
        let target = self
            .registry
            .ring(hash)
            .find(|id| self.live.contains(*id))
            .ok_or(BalancerError::NoLiveBackend)?;

        self.registry.assign(target, hash);
        self.last_used = Some(target);
        Ok(target)
    }

    fn name_of(&self, id: BackendId) -> String {
        self.registry
            .get(id)
            .map(|b| b.name().to_string())
            .unwrap_or_default()
    }
}

/// Routing core shared by request handlers and health pollers.
#[derive(Debug)]
pub struct StickyRouter {
    state: Mutex<RouterState>,
}

impl StickyRouter {
    /// Create a router over `registry`. No backend is live until reported.
    pub fn new(registry: Registry) -> Self {
        Self {
            state: Mutex::new(RouterState {
                registry,
                live: LiveSet::new(),
                last_used: None,
            }),
        }
    }

    /// Build the registry from backend addresses and wrap it.
    pub fn from_backends<I, S>(names: I) -> Result<Self, BalancerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Registry::new(names).map(Self::new)
    }

    fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find the backend `key` is currently bound to.
    pub fn resolve(&self, key: &str) -> Option<BackendId> {
        self.lock().resolve(hash_key(key))
    }

    /// Bind `key` to the first live backend in ring order from its natural slot.
    pub fn assign(&self, key: &str) -> Result<BackendId, BalancerError> {
        let hash = hash_key(key);
        let mut state = self.lock();
        let id = state.assign(hash)?;
        metrics::record_assignment(&state.name_of(id));
        Ok(id)
    }

    /// Pick the backend for a request: the existing binding, or a new one.
    ///
    /// Resolve and assign happen under one lock acquisition.
    pub fn route_request(&self, key: &str) -> Result<String, BalancerError> {
        let hash = hash_key(key);
        let mut state = self.lock();

        let (id, fresh) = match state.resolve(hash) {
            Some(id) => (id, false),
            None => (state.assign(hash)?, true),
        };
        state.last_used = Some(id);

        let name = state.name_of(id);
        if fresh {
            tracing::debug!(key = %key, hash, backend = %name, "Assigned new client key");
            metrics::record_assignment(&name);
        } else {
            tracing::trace!(key = %key, hash, backend = %name, "Resolved sticky assignment");
        }
        Ok(name)
    }

    /// Record a successful probe for `name`.
    ///
    /// Returns `None` if `name` is not a configured backend.
    pub fn mark_live(&self, name: &str) -> Option<Transition> {
        let mut state = self.lock();
        let Some(id) = state.registry.position(name) else {
            tracing::warn!(backend = %name, "Liveness report for unknown backend");
            return None;
        };

        if state.live.mark_live(id) {
            Some(Transition::Up)
        } else {
            Some(Transition::Unchanged { purged: 0 })
        }
    }

    /// Record a failed probe for `name` and purge its assignments.
    ///
    /// Returns `None` if `name` is not a configured backend.
    pub fn mark_down(&self, name: &str) -> Option<Transition> {
        let mut state = self.lock();
        let Some(id) = state.registry.position(name) else {
            tracing::warn!(backend = %name, "Liveness report for unknown backend");
            return None;
        };

        let was_live = state.live.mark_down(id);
        let purged = state.registry.purge(id);
        if was_live {
            Some(Transition::Down { purged })
        } else {
            Some(Transition::Unchanged { purged })
        }
    }

    /// Feed one probe result into the tracker.
    pub fn report(&self, name: &str, healthy: bool) -> Option<Transition> {
        if healthy {
            self.mark_live(name)
        } else {
            self.mark_down(name)
        }
    }

    pub fn is_live(&self, name: &str) -> bool {
        let state = self.lock();
        state
            .registry
            .position(name)
            .is_some_and(|id| state.live.contains(id))
    }

    /// All configured backend addresses, in registry order.
    pub fn backend_names(&self) -> Vec<String> {
        self.lock()
            .registry
            .iter()
            .map(|(_, b)| b.name().to_string())
            .collect()
    }

    /// The backend that served the most recent routed request.
    pub fn last_used(&self) -> Option<BackendId> {
        self.lock().last_used
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn snapshot(&self) -> Vec<BackendStatus> {
        let state = self.lock();
        state
            .registry
            .iter()
            .map(|(id, b)| BackendStatus {
                id,
                name: b.name().to_string(),
                live: state.live.contains(id),
                assignments: b.assignment_count(),
            })
            .collect()
    }
}
