use tracing::{debug, info};

use crate::metadata::MetadataDefaults;

/// Per-run settings consumed by [`crate::orchestrator::run_once`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Maximum number of successful publishes in one run.
    pub budget: usize,
    /// When set, a failed item is replaced by the next eligible candidate
    /// instead of shrinking the run.
    pub backfill_failures: bool,
    pub metadata: MetadataDefaults,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            budget: 1,
            backfill_failures: false,
            metadata: MetadataDefaults::default(),
        }
    }
}

impl RunConfig {
    pub fn trace_loaded(&self) {
        info!(
            budget = self.budget,
            backfill_failures = self.backfill_failures,
            "Loaded RunConfig"
        );
        debug!(?self, "RunConfig loaded (full debug)");
    }
}
