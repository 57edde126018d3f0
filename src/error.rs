//! Gateway error types.

use thiserror::Error;

/// Errors produced by the routing core and the membership controller.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The pool holds zero resources; routing is impossible.
    #[error("no backend resources available")]
    PoolEmpty,

    /// No resource owns a job matching the given identity.
    #[error("no job found for host {host} path {path}")]
    JobNotFound { host: String, path: String },

    /// Configuration named a balancing strategy we do not implement.
    #[error("unrecognized balancing strategy {0:?}")]
    UnrecognizedStrategy(String),

    /// Bulk discovery never produced a non-empty resource set.
    #[error("resource discovery unavailable after {attempts} attempts")]
    DiscoveryUnavailable { attempts: u32 },

    /// Transport or decode failure talking to the discovery source.
    #[error("discovery source error: {0}")]
    Discovery(String),
}
