//! Engine Configuration
//!
//! [`EvalConfig`] is handed to [`Evaluator::new`](crate::eval::Evaluator::new)
//! and decides how the worker pool is built. There is no global state: two
//! evaluators with different configurations can live side by side.
//!
//! Configuration can come from three places:
//!
//! - `EvalConfig::default()`
//! - a JSON document (`EvalConfig::from_json`), missing keys fall back to
//!   their defaults
//! - the environment (`EvalConfig::from_env`):
//!   - `DEPGRAPH_NO_THREADS`: any value other than `0`/`false` forces a
//!     single worker
//!   - `DEPGRAPH_THREADS`: explicit worker count

use serde::{Deserialize, Serialize};

use crate::error::{DepgraphError, Result};

/// Below this many operations the pending pass runs on the calling thread.
pub const DEFAULT_PARALLEL_PENDING_THRESHOLD: usize = 256;

/// Configuration for an [`Evaluator`](crate::eval::Evaluator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Number of worker threads. `None` lets the pool pick (one per core).
    pub num_threads: Option<usize>,

    /// Debug toggle: run every operation on a single worker thread.
    pub no_threads: bool,

    /// Operation count above which pending counts are computed in parallel.
    pub parallel_pending_threshold: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            no_threads: false,
            parallel_pending_threshold: DEFAULT_PARALLEL_PENDING_THRESHOLD,
        }
    }
}

impl EvalConfig {
    /// Configuration with the single-worker debug toggle switched on.
    pub fn single_threaded() -> Self {
        Self {
            no_threads: true,
            ..Self::default()
        }
    }

    /// Parse a configuration from JSON and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build a configuration from `DEPGRAPH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from `DEPGRAPH_*` variables resolved by `lookup`.
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(value) = lookup("DEPGRAPH_NO_THREADS") {
            cfg.no_threads = parse_flag(&value);
        }

        if let Some(value) = lookup("DEPGRAPH_THREADS") {
            let threads = value.trim().parse::<usize>().map_err(|e| {
                DepgraphError::InvalidConfig(format!("DEPGRAPH_THREADS={value}: {e}"))
            })?;
            cfg.num_threads = Some(threads);
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject configurations the pool cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.num_threads == Some(0) {
            return Err(DepgraphError::InvalidConfig(
                "num_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Worker count to request from the pool builder, if any.
    pub fn worker_count(&self) -> Option<usize> {
        if self.no_threads {
            Some(1)
        } else {
            self.num_threads
        }
    }
}

fn parse_flag(s: &str) -> bool {
    !matches!(
        s.trim().to_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}
