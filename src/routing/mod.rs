//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers, peer)
//!     → key.rs (derive client key)
//!     → router.rs (resolve existing binding, else assign)
//!     → Return: backend address or NoLiveBackend
//! ```
//!
//! # Design Decisions
//! - Bindings are sticky until the owning backend goes down
//! - Deterministic: the same key and live set always pick the same backend
//! - No per-request failover to another backend

pub mod key;
pub mod router;

pub use key::KeySource;
pub use router::{BackendStatus, StickyRouter};
