//! Backend discovery subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     ResourceDiscovery::enumerate (bulk, bounded retries)
//!     → controller.rs seeds the pool, or startup fails
//!
//! Runtime:
//!     discovery source → mpsc<DiscoveryEvent>
//!     → controller.rs event loop
//!     → pool add_resource / remove_resource
//! ```
//!
//! # Design Decisions
//! - The pool lock is only held inside each individual add/remove call,
//!   never across the blocking receive
//! - Malformed or unrecognized events are logged and dropped; only a closed
//!   event stream or a shutdown signal ends the loop
//! - Sources implement one trait for bulk enumeration and feed the same
//!   event channel; the controller does not know which runtime is behind it

pub mod controller;
pub mod docker;

use std::collections::HashMap;

use crate::error::GatewayError;

/// Bulk-enumeration contract a discovery source must satisfy.
///
/// Returns a `target uri -> resource id` mapping of the currently live
/// backends. An empty map means "nothing ready yet" and is retried by the
/// controller, same as an error.
pub trait ResourceDiscovery {
    fn enumerate(
        &self,
    ) -> impl std::future::Future<Output = Result<HashMap<String, String>, GatewayError>> + Send;
}

/// One incremental membership change from a discovery source.
///
/// `action` is kept as the source emitted it: the controller recognizes
/// `start` (requires a resolved `uri`) and `die`/`stop`, and discards the
/// rest with a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryEvent {
    pub action: String,
    pub id: String,
    pub uri: Option<String>,
}

/// Discovery over a fixed URI list from configuration. The resource id is
/// the URI itself.
#[derive(Debug, Clone)]
pub struct StaticDiscovery {
    uris: Vec<String>,
}

impl StaticDiscovery {
    pub fn new(uris: Vec<String>) -> Self {
        Self { uris }
    }
}

impl ResourceDiscovery for StaticDiscovery {
    async fn enumerate(&self) -> Result<HashMap<String, String>, GatewayError> {
        Ok(self
            .uris
            .iter()
            .map(|uri| (uri.clone(), uri.clone()))
            .collect())
    }
}
