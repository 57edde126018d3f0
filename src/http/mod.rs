//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, push/delete/status routes)
//!     → request.rs (x-request-id layer)
//!     → pool manager picks the backend (affinity or strategy)
//!     → request forwarded verbatim, status relayed to the client
//! ```
//!
//! This layer is a thin proxy wrapper: it copies the request through to the
//! chosen backend and relays the response. All routing decisions live in
//! the pool subsystem.

pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
