//! Evaluation Instrumentation
//!
//! Observers are told when a refresh begins and ends, and when each operation
//! starts and completes. They are purely observational: nothing they do feeds
//! back into scheduling.
//!
//! Hooks are called from worker threads, concurrently, so implementations
//! must be `Send + Sync` and keep their own synchronization cheap.

use std::thread::{self, ThreadId};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;
use crate::graph::{Depsgraph, OperationId};
use super::context::EvaluationContext;

/// Receives evaluation events. Every hook defaults to doing nothing.
///
/// Every `eval_begin` is paired with an `eval_end`, also when a callback
/// panics during the refresh.
pub trait EvalObserver: Send + Sync {
    fn eval_begin(&self, _ctx: &EvaluationContext) {}

    fn eval_end(&self, _ctx: &EvaluationContext) {}

    fn task_started(&self, _graph: &Depsgraph, _operation: OperationId) {}

    fn task_completed(&self, _graph: &Depsgraph, _operation: OperationId, _elapsed: Duration) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl EvalObserver for NoopObserver {}

// ----------------------------------------------------------------------------
// Timing statistics
// ----------------------------------------------------------------------------

/// Accumulated timing of one operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskTiming {
    pub name: String,
    pub calls: u64,
    pub total_seconds: f64,
}

/// Collects per-operation call counts and durations across refreshes.
#[derive(Debug, Default)]
pub struct TimingStats {
    timings: DashMap<OperationId, TaskTiming>,
}

impl TimingStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timing of one operation, if it ever ran.
    pub fn get(&self, operation: OperationId) -> Option<TaskTiming> {
        self.timings.get(&operation).map(|t| t.value().clone())
    }

    /// Sum of calls over all operations.
    pub fn total_calls(&self) -> u64 {
        self.timings.iter().map(|t| t.calls).sum()
    }

    /// Snapshot ordered by accumulated time, slowest first.
    pub fn snapshot(&self) -> Vec<TaskTiming> {
        let mut timings: Vec<_> = self.timings.iter().map(|t| t.value().clone()).collect();
        timings.sort_by(|a, b| b.total_seconds.total_cmp(&a.total_seconds));
        timings
    }

    /// Snapshot as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    pub fn clear(&self) {
        self.timings.clear();
    }
}

impl EvalObserver for TimingStats {
    fn task_completed(&self, graph: &Depsgraph, operation: OperationId, elapsed: Duration) {
        let mut entry = self.timings.entry(operation).or_insert_with(|| TaskTiming {
            name: graph.operation(operation).name().to_string(),
            calls: 0,
            total_seconds: 0.0,
        });
        entry.calls += 1;
        entry.total_seconds += elapsed.as_secs_f64();
    }
}

// ----------------------------------------------------------------------------
// Execution log
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEventKind {
    Started,
    Completed,
}

/// One start or completion, with the worker it happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEvent {
    pub operation: OperationId,
    pub kind: LogEventKind,
    pub thread: ThreadId,
}

/// Ordered record of every start and completion.
///
/// Events are appended under a lock, so the log order is a valid
/// linearization of what the workers did.
#[derive(Debug, Default)]
pub struct ExecutionLog {
    events: Mutex<Vec<LogEvent>>,
    cycles: Mutex<u32>,
}

impl ExecutionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }

    /// Operations in the order they started.
    pub fn started(&self) -> Vec<OperationId> {
        self.of_kind(LogEventKind::Started)
    }

    /// Operations in the order they completed.
    pub fn completed(&self) -> Vec<OperationId> {
        self.of_kind(LogEventKind::Completed)
    }

    /// Worker thread an operation started on.
    pub fn thread_of(&self, operation: OperationId) -> Option<ThreadId> {
        self.events
            .lock()
            .iter()
            .find(|e| e.operation == operation && e.kind == LogEventKind::Started)
            .map(|e| e.thread)
    }

    /// Index in the log of the given event, if recorded.
    pub fn position(&self, operation: OperationId, kind: LogEventKind) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|e| e.operation == operation && e.kind == kind)
    }

    /// Number of refreshes that ran to `eval_end`.
    pub fn finished_cycles(&self) -> u32 {
        *self.cycles.lock()
    }

    /// Forget all recorded events and finished refreshes.
    pub fn clear(&self) {
        self.events.lock().clear();
        *self.cycles.lock() = 0;
    }

    fn of_kind(&self, kind: LogEventKind) -> Vec<OperationId> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.operation)
            .collect()
    }

    fn push(&self, operation: OperationId, kind: LogEventKind) {
        self.events.lock().push(LogEvent {
            operation,
            kind,
            thread: thread::current().id(),
        });
    }
}

impl EvalObserver for ExecutionLog {
    fn eval_end(&self, _ctx: &EvaluationContext) {
        *self.cycles.lock() += 1;
    }

    fn task_started(&self, _graph: &Depsgraph, operation: OperationId) {
        self.push(operation, LogEventKind::Started);
    }

    fn task_completed(&self, _graph: &Depsgraph, operation: OperationId, _elapsed: Duration) {
        self.push(operation, LogEventKind::Completed);
    }
}
