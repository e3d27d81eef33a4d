//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     One timer per backend
//!     → Probe the backend's health path
//!     → Report up/down to the router
//!
//! Liveness (state.rs):
//!     Live ←→ Down
//!     Down transition purges the backend's assignments
//! ```
//!
//! # Design Decisions
//! - One probe decides the state; there is no hysteresis
//! - Probe failures are recovered locally, never propagated
//! - Probes carry their own timeout, independent of request timeouts

pub mod active;
pub mod state;

pub use active::{HealthMonitor, HealthProbe, HttpProbe};
pub use state::{LiveSet, Transition};
