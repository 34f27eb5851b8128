//! State shared by every worker during one refresh.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::graph::Depsgraph;
use super::context::EvaluationContext;
use super::observer::EvalObserver;
use super::EvalReport;

/// Everything a worker needs, borrowed for the duration of one refresh.
pub(crate) struct EvalState<'a> {
    pub ctx: &'a EvaluationContext,
    pub graph: &'a Depsgraph,
    pub layers: u32,
    pub observer: &'a dyn EvalObserver,
    pub counters: CycleCounters,
}

impl<'a> EvalState<'a> {
    pub fn new(
        ctx: &'a EvaluationContext,
        graph: &'a Depsgraph,
        layers: u32,
        observer: &'a dyn EvalObserver,
    ) -> Self {
        Self {
            ctx,
            graph,
            layers,
            observer,
            counters: CycleCounters::default(),
        }
    }
}

/// Work counters for the report returned by a refresh.
#[derive(Debug, Default)]
pub(crate) struct CycleCounters {
    executed: AtomicUsize,
    submitted: AtomicUsize,
    chained: AtomicUsize,
    passed_through: AtomicUsize,
}

impl CycleCounters {
    pub fn executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn chained(&self) {
        self.chained.fetch_add(1, Ordering::Relaxed);
    }

    pub fn passed_through(&self) {
        self.passed_through.fetch_add(1, Ordering::Relaxed);
    }

    /// Read the counters once the pool has drained.
    pub fn report(&self) -> EvalReport {
        EvalReport {
            executed: self.executed.load(Ordering::Relaxed),
            submitted: self.submitted.load(Ordering::Relaxed),
            chained: self.chained.load(Ordering::Relaxed),
            passed_through: self.passed_through.load(Ordering::Relaxed),
            ..EvalReport::default()
        }
    }
}
