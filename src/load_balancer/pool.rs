//! Server registry.
//!
//! # Responsibilities
//! - Hold every configured backend in configuration order
//! - Look backends up by index or by name
//! - Apply assignment and purge mutations to a backend's hash set
//!
//! The registry is never resized after construction, so `BackendId`s handed
//! out by it stay valid. It is not synchronized itself; the router owns it
//! behind a single lock.

use crate::error::BalancerError;
use crate::load_balancer::backend::{Backend, BackendId};
use crate::load_balancer::hasher::KeyHash;

/// Ordered, fixed list of all configured backends.
#[derive(Debug, Clone)]
pub struct Registry {
    backends: Vec<Backend>,
}

impl Registry {
    /// Build the registry from an ordered list of backend addresses.
    ///
    /// Fails if the list is empty: routing is meaningless without backends.
    pub fn new<I, S>(names: I) -> Result<Self, BalancerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let backends: Vec<Backend> = names.into_iter().map(Backend::new).collect();
        if backends.is_empty() {
            return Err(BalancerError::Configuration(
                "backend list must not be empty".to_string(),
            ));
        }
        Ok(Self { backends })
    }

    /// Number of backends. Always at least one.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, id: BackendId) -> Option<&Backend> {
        self.backends.get(id.0)
    }

    /// Find a backend by address. The first match wins.
    pub fn position(&self, name: &str) -> Option<BackendId> {
        self.backends
            .iter()
            .position(|b| b.name() == name)
            .map(BackendId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BackendId, &Backend)> {
        self.backends
            .iter()
            .enumerate()
            .map(|(i, b)| (BackendId(i), b))
    }

    /// Slots in probe order for `hash`: its natural slot, then onward with wraparound.
    pub fn ring(&self, hash: KeyHash) -> impl Iterator<Item = BackendId> {
        let n = self.backends.len();
        let start = usize::from(hash) % n;
        (0..n).map(move |i| BackendId((start + i) % n))
    }

    /// The backend currently holding `hash`, if any.
    pub fn owner_of(&self, hash: KeyHash) -> Option<BackendId> {
        self.ring(hash)
            .find(|id| self.backends[id.0].holds(hash))
    }

    /// Route `hash` to `id`, removing it from any other backend first.
    pub fn assign(&mut self, id: BackendId, hash: KeyHash) {
        for (i, backend) in self.backends.iter_mut().enumerate() {
            if i != id.0 {
                backend.remove(hash);
            }
        }
        if let Some(backend) = self.backends.get_mut(id.0) {
            backend.insert(hash);
        }
    }

    /// Drop every assignment held by `id`. Returns how many were dropped.
    pub fn purge(&mut self, id: BackendId) -> usize {
        self.backends
            .get_mut(id.0)
            .map(Backend::clear)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        Registry::new(["server1:8080", "server2:8080", "server3:8080"]).unwrap()
    }

    #[test]
    fn test_preserves_order() {
        let reg = registry();
        assert_eq!(reg.len(), 3);
        let names: Vec<&str> = reg.iter().map(|(_, b)| b.name()).collect();
        assert_eq!(names, ["server1:8080", "server2:8080", "server3:8080"]);
        assert!(reg.iter().all(|(_, b)| b.assignment_count() == 0));
    }

    #[test]
    fn test_empty_is_configuration_error() {
        let err = Registry::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, BalancerError::Configuration(_)));
    }

    #[test]
    fn test_position() {
        let reg = registry();
        assert_eq!(reg.position("server2:8080"), Some(BackendId(1)));
        assert_eq!(reg.position("server9:8080"), None);
    }

    #[test]
    fn test_ring_wraps() {
        let reg = registry();
        let order: Vec<usize> = reg.ring(5).map(|id| id.0).collect();
        assert_eq!(order, [2, 0, 1]);
        let order: Vec<usize> = reg.ring(3).map(|id| id.0).collect();
        assert_eq!(order, [0, 1, 2]);
    }

    #[test]
    fn test_assign_moves_hash() {
        let mut reg = registry();
        reg.assign(BackendId(0), 42);
        assert_eq!(reg.owner_of(42), Some(BackendId(0)));

        reg.assign(BackendId(2), 42);
        assert_eq!(reg.owner_of(42), Some(BackendId(2)));
        assert!(!reg.get(BackendId(0)).unwrap().holds(42));
    }

    #[test]
    fn test_purge() {
        let mut reg = registry();
        reg.assign(BackendId(1), 300);
        reg.assign(BackendId(1), 400);
        reg.assign(BackendId(2), 500);

        assert_eq!(reg.purge(BackendId(1)), 2);
        assert_eq!(reg.get(BackendId(1)).unwrap().assignment_count(), 0);
        assert_eq!(reg.owner_of(300), None);
        assert_eq!(reg.owner_of(500), Some(BackendId(2)));
        assert_eq!(reg.purge(BackendId(7)), 0);
    }
}
