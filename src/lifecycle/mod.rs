//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Load config → Validate → Seed pool via discovery → Start listener
//!
//! Shutdown:
//!     SIGINT received → broadcast shutdown
//!     → HTTP server stops accepting
//!     → membership controller and event listener exit their loops
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
