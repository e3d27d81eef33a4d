//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → [routing layer picks sticky backend]
//!     → forward.rs (rewrite, send, stream response back)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod server;

pub use forward::{Forwarder, LB_FROM};
pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::HttpServer;
