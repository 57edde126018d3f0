//! pushmux — sticky load-balancing gateway for metrics-push backends.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌────────────────────────────────────────────┐
//!                      │                 PUSHMUX                     │
//!   Client push        │  ┌────────┐     ┌──────────────┐           │
//!   ───────────────────┼─▶│  http  │────▶│  pool manager │          │
//!   PUT/POST/DELETE    │  │ server │     │ affinity scan │          │
//!                      │  └────────┘     │  + strategy   │          │
//!                      │       │         └──────┬────────┘          │
//!   Relayed status     │       │                │ Target            │
//!   ◀──────────────────┼───────┴── forward ─────┘                   │
//!                      │                                            │     Backend
//!                      │  ┌───────────────────────────────────────┐ │ ──▶ push
//!                      │  │ discovery: bulk bootstrap (retries) + │ │     gateways
//!                      │  │ event loop → add/remove resources     │ │
//!                      │  └───────────────────────────────────────┘ │
//!                      │  ┌───────────────────────────────────────┐ │
//!                      │  │ config · lifecycle · observability    │ │
//!                      │  └───────────────────────────────────────┘ │
//!                      └────────────────────────────────────────────┘
//! ```
//!
//! Every push for a given `(origin host, path)` pair routes to the same
//! backend for the life of the job; new jobs are spread by the configured
//! balancing strategy; pool membership follows the discovery source.

pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pool;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pool::PoolManager;
