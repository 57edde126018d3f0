//! Balancing strategies for placing new jobs.

use rand::Rng;

use crate::error::GatewayError;
use crate::pool::resource::Resource;

/// Picks which resource receives a brand-new job.
///
/// `select` must be pure: the caller performs the job insertion and counter
/// bump under the pool lock, atomically with the selection. Callers guarantee
/// `resources` is non-empty.
pub trait Strategy: Send + Sync {
    fn select(&self, resources: &[Resource]) -> usize;

    /// Configuration name, for logs and the status endpoint.
    fn name(&self) -> &'static str;
}

/// Build a strategy from its configuration name.
pub fn from_name(name: &str) -> Result<Box<dyn Strategy>, GatewayError> {
    match name {
        "least" => Ok(Box::new(LeastLoaded)),
        "random" => Ok(Box::new(Random)),
        other => Err(GatewayError::UnrecognizedStrategy(other.to_string())),
    }
}

/// Least-loaded selector.
///
/// Scans left to right and replaces the candidate whenever the current
/// resource's job count is less than or equal to the running minimum, so
/// among resources tied at the minimum the highest index wins. Last-wins is
/// contractual: clients and tests observe it, do not "fix" it to first-wins.
#[derive(Debug, Default)]
pub struct LeastLoaded;

impl Strategy for LeastLoaded {
    fn select(&self, resources: &[Resource]) -> usize {
        debug_assert!(!resources.is_empty());
        let mut min_index = 0;
        let mut min_jobs = resources[0].job_count();
        for (index, resource) in resources.iter().enumerate() {
            if resource.job_count() <= min_jobs {
                min_index = index;
                min_jobs = resource.job_count();
            }
        }
        min_index
    }

    fn name(&self) -> &'static str {
        "least"
    }
}

/// Uniform random selector.
#[derive(Debug, Default)]
pub struct Random;

impl Strategy for Random {
    fn select(&self, resources: &[Resource]) -> usize {
        debug_assert!(!resources.is_empty());
        rand::thread_rng().gen_range(0..resources.len())
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
