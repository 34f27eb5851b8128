//! Worker Pool
//!
//! A thin wrapper around a `rayon` thread pool. The evaluator only needs two
//! things from it:
//!
//! - submit an operation for execution on some worker ([`submit`])
//! - block until everything submitted, and everything *that* submitted, has
//!   finished ([`TaskPool::work_and_wait`])
//!
//! Both map onto a rayon scope: submission is `Scope::spawn`, and the scope
//! does not return before every job spawned into it has completed. How work
//! is balanced between workers is entirely up to rayon.

use rayon::{Scope, ThreadPool, ThreadPoolBuilder};
use tracing::{debug, trace};

use crate::config::EvalConfig;
use crate::error::Result;
use crate::graph::OperationId;
use super::state::EvalState;
use super::worker;

pub(crate) struct TaskPool {
    pool: ThreadPool,
}

impl TaskPool {
    /// Build a pool sized according to `config`.
    pub fn new(config: &EvalConfig) -> Result<Self> {
        let mut builder = ThreadPoolBuilder::new().thread_name(|i| format!("depgraph-worker-{i}"));
        if let Some(threads) = config.worker_count() {
            builder = builder.num_threads(threads);
        }

        let pool = builder.build()?;
        debug!(
            threads = pool.current_num_threads(),
            no_threads = config.no_threads,
            "task pool created"
        );
        Ok(Self { pool })
    }

    pub fn num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` on the pool and return its result.
    pub(crate) fn install<R, F>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }

    /// Run `seed` on the pool, then block until every job it submitted, and
    /// every job those submitted, has finished.
    pub(crate) fn work_and_wait<'s, F>(&self, seed: F)
    where
        F: FnOnce(&Scope<'s>) + Send,
    {
        self.pool.scope(seed);
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("threads", &self.num_threads())
            .finish()
    }
}

/// Hand a claimed operation to the pool.
pub(crate) fn submit<'s>(scope: &Scope<'s>, state: &'s EvalState<'s>, operation: OperationId) {
    debug_assert!(
        !state.graph.operation(operation).is_noop(),
        "pass-through operations are never submitted"
    );
    trace!(operation = %state.graph.operation(operation).name(), "submitting to pool");

    state.counters.submitted();
    scope.spawn(move |scope| worker::run_task(scope, state, operation));
}
