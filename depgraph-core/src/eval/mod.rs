//! Threaded Evaluation
//!
//! This module runs the operations of a [`Depsgraph`](crate::graph::Depsgraph)
//! that need updating, in dependency order, on a pool of worker threads.
//!
//! # Concepts
//!
//! ## Pending links
//!
//! Before a refresh, each operation counts the incoming relations that will
//! be satisfied during it. An operation becomes ready when that count drops
//! to zero. Nobody waits on anybody: the thread that completes the last
//! dependency of an operation is the one that makes it ready.
//!
//! ## Claims
//!
//! Every operation has a `scheduled` flag that can be set exactly once per
//! refresh. Setting it grants the exclusive right to run (or forward) the
//! operation, which is what guarantees at-most-once execution when several
//! parents finish at the same time.
//!
//! ## Chain continuation
//!
//! A worker that finishes an operation with a single child tries to run the
//! child itself rather than submitting it. Long chains therefore stay on one
//! thread.
//!
//! ## Cycles
//!
//! Relations flagged cyclic are left out of pending counts entirely, so a
//! cycle cannot hold up a refresh. Each operation on a cycle still runs at
//! most once.
//!
//! # Implementation Notes
//!
//! The only state written concurrently is the per-operation claim flag and
//! pending counter. Both are atomics; there are no locks on the hot path.

mod context;
mod evaluator;
mod observer;
mod pending;
mod pool;
mod scheduler;
mod state;
mod worker;

pub use context::{EvalMode, EvaluationContext};
pub use evaluator::{EvalReport, Evaluator};
pub use observer::{EvalObserver, ExecutionLog, LogEvent, LogEventKind, NoopObserver, TaskTiming, TimingStats};
