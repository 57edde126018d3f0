//! Resource and job primitives.
//!
//! # Responsibilities
//! - Represent a single push backend and the jobs affine to it
//! - Track the request counter (assignments and affinity hits)
//!
//! No locking here; the pool manager serializes every access.

use axum::body::Body;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

/// Routing identity of one client's push stream for one label path.
///
/// `origin_host` is the client address with any port suffix stripped;
/// `path` is the exact path the client targeted, label segments included.
/// Two jobs are equal iff both fields are byte-equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub origin_host: String,
    pub path: String,
}

/// A single backend endpoint plus its affine jobs and request counter.
pub struct Resource {
    /// Opaque identity assigned by configuration or the discovery source.
    pub id: String,
    /// Base address requests are forwarded to.
    pub base_url: Url,
    /// Outbound client handle, owned by this resource.
    client: Client<HttpConnector, Body>,
    /// Affine jobs in assignment order.
    jobs: Vec<Job>,
    /// Every request ever routed here, affinity hits included.
    request_count: u64,
}

impl Resource {
    pub fn new(id: impl Into<String>, base_url: Url) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            id: id.into(),
            base_url,
            client,
            jobs: Vec::new(),
            request_count: 0,
        }
    }

    /// Position of the job matching `(host, path)`, without side effects.
    pub fn job_index(&self, host: &str, path: &str) -> Option<usize> {
        self.jobs
            .iter()
            .position(|j| j.origin_host == host && j.path == path)
    }

    /// Affinity scan used for routing: on a hit the request counter is
    /// bumped, since the counter tracks requests served, not job entries.
    pub fn touch_job(&mut self, host: &str, path: &str) -> Option<usize> {
        let index = self.job_index(host, path)?;
        self.request_count += 1;
        Some(index)
    }

    /// Record a freshly assigned job and count the request that caused it.
    pub fn assign(&mut self, job: Job) {
        self.request_count += 1;
        self.jobs.push(job);
    }

    /// Remove the job at `index`, preserving the order of the remainder.
    pub fn remove_job_at(&mut self, index: usize) -> Job {
        self.jobs.remove(index)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn request_count(&self) -> u64 {
        self.request_count
    }

    pub fn client(&self) -> Client<HttpConnector, Body> {
        self.client.clone()
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("base_url", &self.base_url.as_str())
            .field("jobs", &self.jobs.len())
            .field("request_count", &self.request_count)
            .finish()
    }
}
