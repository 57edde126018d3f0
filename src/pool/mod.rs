//! Resource pool and job-affinity routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound push request (remote addr + raw path)
//!     → manager.rs (pool-wide lock, affinity scan)
//!         → hit: same resource as every previous push for that job
//!         → miss: strategy.rs picks a resource, job is recorded
//!     → Target handed back to the HTTP layer for forwarding
//!
//! Membership controller (discovery):
//!     → manager.rs add_resource / remove_resource
//! ```
//!
//! # Design Decisions
//! - One mutex around the whole pool: strategy selection needs a consistent
//!   view of every resource's job count for the tie-break rule
//! - Jobs live only inside the resource they are affine to
//! - Routing returns a cheap `Target` snapshot so the lock is never held
//!   while proxying to the backend

pub mod manager;
pub mod resource;
pub mod strategy;

pub use manager::{PoolManager, Target};
pub use resource::{Job, Resource};
pub use strategy::Strategy;
