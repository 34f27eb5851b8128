//! Refresh Orchestrator
//!
//! [`Evaluator`] ties one refresh together:
//!
//! 1. Copy the time source's current time into the evaluation context.
//! 2. Reset per-cycle state and compute pending-link counts.
//! 3. Admit every initially ready operation into the pool.
//! 4. Block until the pool has drained.
//! 5. Clear all tags on the graph, whether or not evaluation finished.
//!
//! The evaluator owns its worker pool; build it once and reuse it.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::config::EvalConfig;
use crate::error::Result;
use crate::graph::Depsgraph;
use super::context::EvaluationContext;
use super::observer::{EvalObserver, NoopObserver};
use super::pending::calculate_pending_parents;
use super::pool::TaskPool;
use super::scheduler::schedule_graph;
use super::state::EvalState;

/// What a refresh did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvalReport {
    /// Operations whose callback ran.
    pub executed: usize,
    /// Operations handed to the pool.
    pub submitted: usize,
    /// Operations a worker continued into without going through the pool.
    pub chained: usize,
    /// Pass-through operations forwarded.
    pub passed_through: usize,
    /// Wall time of the refresh.
    pub elapsed: Duration,
}

impl EvalReport {
    /// Whether the refresh did no work at all.
    pub fn is_empty(&self) -> bool {
        self.executed == 0 && self.passed_through == 0
    }
}

/// Evaluates tagged operations of a [`Depsgraph`] on a pool of workers.
pub struct Evaluator {
    config: EvalConfig,
    pool: TaskPool,
    observer: Arc<dyn EvalObserver>,
}

impl Evaluator {
    /// Create an evaluator with its own worker pool.
    pub fn new(config: EvalConfig) -> Result<Self> {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Create an evaluator that reports to `observer`.
    pub fn with_observer(config: EvalConfig, observer: Arc<dyn EvalObserver>) -> Result<Self> {
        config.validate()?;
        let pool = TaskPool::new(&config)?;
        Ok(Self {
            config,
            pool,
            observer,
        })
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.pool.num_threads()
    }

    /// Evaluate everything tagged for update and visible in `layers`.
    ///
    /// Does nothing when the graph has no entry tags. The time source must
    /// already hold the time to evaluate at. Tags are cleared on return; if a
    /// callback panics they are cleared, and the observer sees `eval_end`,
    /// before the panic is resumed.
    pub fn evaluate_on_refresh_ex(
        &self,
        ctx: &mut EvaluationContext,
        graph: &mut Depsgraph,
        layers: u32,
    ) -> EvalReport {
        if !graph.needs_eval() {
            trace!("no entry tags; skipping refresh");
            return EvalReport::default();
        }

        let start = Instant::now();
        ctx.set_ctime(graph.time_source().ctime());
        let ctx: &EvaluationContext = ctx;
        self.observer.eval_begin(ctx);

        let outcome = {
            let graph: &Depsgraph = graph;
            panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle(ctx, graph, layers)))
        };

        // Clear any uncleared tags, even after an interrupted evaluation.
        graph.clear_tags();
        self.observer.eval_end(ctx);

        match outcome {
            Ok(mut report) => {
                report.elapsed = start.elapsed();
                debug!(
                    executed = report.executed,
                    submitted = report.submitted,
                    chained = report.chained,
                    passed_through = report.passed_through,
                    elapsed_us = report.elapsed.as_micros() as u64,
                    "refresh finished"
                );
                report
            }
            Err(payload) => {
                warn!("operation panicked during refresh; tags cleared");
                panic::resume_unwind(payload)
            }
        }
    }

    /// Evaluate at `frame` using the graph's visible layers.
    pub fn evaluate_on_refresh(
        &self,
        ctx: &mut EvaluationContext,
        graph: &mut Depsgraph,
        frame: f32,
    ) -> EvalReport {
        graph.time_source_mut().set_ctime(frame);
        let layers = graph.layers();
        self.evaluate_on_refresh_ex(ctx, graph, layers)
    }

    /// Move to a new frame: tag everything time-dependent, flush, evaluate.
    pub fn evaluate_on_framechange(
        &self,
        ctx: &mut EvaluationContext,
        graph: &mut Depsgraph,
        ctime: f32,
        layers: u32,
    ) -> EvalReport {
        graph.time_source_mut().set_ctime(ctime);
        graph.tag_time_source();
        graph.flush_updates();
        self.evaluate_on_refresh_ex(ctx, graph, layers)
    }

    fn run_cycle(&self, ctx: &EvaluationContext, graph: &Depsgraph, layers: u32) -> EvalReport {
        calculate_pending_parents(&self.pool, graph, layers, self.config.parallel_pending_threshold);

        debug!(
            operations = graph.operation_count(),
            layers = format_args!("{layers:#x}"),
            ctime = ctx.ctime(),
            "refresh started"
        );

        let state = EvalState::new(ctx, graph, layers, &*self.observer);
        let state = &state;
        self.pool.work_and_wait(move |scope| schedule_graph(scope, state));

        state.counters.report()
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
