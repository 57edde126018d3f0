//! Pool manager: affinity lookup and new-job placement.
//!
//! # Responsibilities
//! - Own the resource collection behind one pool-wide lock
//! - Route pushes to the already-affine resource, or delegate brand-new
//!   jobs to the configured strategy
//! - Apply membership changes (add/remove) coming from discovery

use std::sync::{Mutex, MutexGuard, PoisonError};

use axum::body::Body;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use serde::Serialize;
use url::Url;

use crate::error::GatewayError;
use crate::observability::metrics;
use crate::pool::resource::{Job, Resource};
use crate::pool::strategy::Strategy;

/// Routing outcome: enough of a resource to forward one request without
/// holding the pool lock.
#[derive(Clone)]
pub struct Target {
    pub id: String,
    pub base_url: Url,
    pub client: Client<HttpConnector, Body>,
}

/// Read-only view of one resource, for the status endpoint and tests.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub id: String,
    pub uri: String,
    pub jobs: Vec<JobSnapshot>,
    pub request_count: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub origin_host: String,
    pub path: String,
}

/// Owns the pool. Every operation serializes on the pool-wide mutex; the
/// strategy needs a consistent view of all job counts for its tie-break.
pub struct PoolManager {
    resources: Mutex<Vec<Resource>>,
    strategy: Box<dyn Strategy>,
}

impl PoolManager {
    pub fn new(strategy: Box<dyn Strategy>) -> Self {
        Self {
            resources: Mutex::new(Vec::new()),
            strategy,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Resource>> {
        self.resources.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one push: return the resource already affine to
    /// `(origin host, path)`, or place the job via the strategy.
    pub fn find_or_assign(&self, remote_addr: &str, path: &str) -> Result<Target, GatewayError> {
        let host = strip_port(remote_addr);
        let mut resources = self.lock();
        if resources.is_empty() {
            return Err(GatewayError::PoolEmpty);
        }

        for resource in resources.iter_mut() {
            if resource.touch_job(&host, path).is_some() {
                tracing::debug!(
                    host = %host,
                    path = %path,
                    resource = %resource.id,
                    "affinity hit"
                );
                return Ok(target_of(resource));
            }
        }

        let index = self.strategy.select(&resources);
        let resource = &mut resources[index];
        resource.assign(Job {
            origin_host: host.clone(),
            path: path.to_string(),
        });
        tracing::info!(
            host = %host,
            path = %path,
            resource = %resource.id,
            jobs = resource.job_count(),
            "assigned new job"
        );
        record_pool_gauges(&resources);
        Ok(target_of(&resources[index]))
    }

    /// Drop the affinity entry for `(origin host, path)` and return its
    /// owning resource, so the caller can forward the delete itself.
    /// The request counter is untouched; deletion only removes
    /// future-affinity state.
    pub fn delete_job(&self, remote_addr: &str, path: &str) -> Result<Target, GatewayError> {
        let host = strip_port(remote_addr);
        let mut resources = self.lock();
        let hit = resources
            .iter()
            .enumerate()
            .find_map(|(ri, r)| r.job_index(&host, path).map(|ji| (ri, ji)));
        let Some((resource_index, job_index)) = hit else {
            return Err(GatewayError::JobNotFound {
                host,
                path: path.to_string(),
            });
        };

        let resource = &mut resources[resource_index];
        resource.remove_job_at(job_index);
        tracing::info!(
            host = %host,
            path = %path,
            resource = %resource.id,
            "deleted job"
        );
        let target = target_of(&resources[resource_index]);
        record_pool_gauges(&resources);
        Ok(target)
    }

    /// Pure existence check: no counter side effect.
    pub fn job_exists(&self, remote_addr: &str, path: &str) -> bool {
        let host = strip_port(remote_addr);
        self.lock()
            .iter()
            .any(|r| r.job_index(&host, path).is_some())
    }

    /// Append a resource. Ids are NOT de-duplicated: two `start` events for
    /// the same id produce two pool entries, matching upstream behavior.
    pub fn add_resource(&self, id: impl Into<String>, uri: Url) {
        let resource = Resource::new(id, uri);
        tracing::info!(resource = %resource.id, uri = %resource.base_url, "adding resource");
        let mut resources = self.lock();
        resources.push(resource);
        record_pool_gauges(&resources);
    }

    /// Remove the resource with `id`, discarding its affine jobs. Absent ids
    /// are a no-op since discovery stop events can race independent removal.
    pub fn remove_resource(&self, id: &str) -> bool {
        let mut resources = self.lock();
        let before = resources.len();
        resources.retain(|r| r.id != id);
        let removed = resources.len() < before;
        if removed {
            tracing::info!(resource = %id, remaining = resources.len(), "removed resource");
            record_pool_gauges(&resources);
        } else {
            tracing::debug!(resource = %id, "remove for unknown resource, ignoring");
        }
        removed
    }

    pub fn resource_count(&self) -> usize {
        self.lock().len()
    }

    /// Read-only view for observability and tests.
    pub fn snapshot(&self) -> Vec<ResourceSnapshot> {
        self.lock()
            .iter()
            .map(|r| ResourceSnapshot {
                id: r.id.clone(),
                uri: r.base_url.to_string(),
                jobs: r
                    .jobs()
                    .iter()
                    .map(|j| JobSnapshot {
                        origin_host: j.origin_host.clone(),
                        path: j.path.clone(),
                    })
                    .collect(),
                request_count: r.request_count(),
            })
            .collect()
    }
}

fn target_of(resource: &Resource) -> Target {
    Target {
        id: resource.id.clone(),
        base_url: resource.base_url.clone(),
        client: resource.client(),
    }
}

fn record_pool_gauges(resources: &[Resource]) {
    let jobs = resources.iter().map(Resource::job_count).sum();
    metrics::record_pool_size(resources.len(), jobs);
}

/// Strip a trailing `:port` from a client address, if present.
fn strip_port(addr: &str) -> String {
    if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
        return sock.ip().to_string();
    }
    match addr.rsplit_once(':') {
        Some((host, port))
            if !host.is_empty()
                && !host.contains(':')
                && !port.is_empty()
                && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            host.to_string()
        }
        _ => addr.to_string(),
    }
}
