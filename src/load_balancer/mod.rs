//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Client key
//!     → hasher.rs (16-bit bucket)
//!     → pool.rs (registry of backends, probe ring from bucket mod N)
//!     → backend.rs (per-backend assignment set)
//! ```
//!
//! # Design Decisions
//! - Registry order is fixed at startup and defines the probe ring
//! - Backends are referenced by index, never by pointer
//! - The assignment, not the natural slot, is authoritative

pub mod backend;
pub mod hasher;
pub mod pool;

pub use backend::{Backend, BackendId};
pub use hasher::{hash_key, KeyHash};
pub use pool::Registry;
