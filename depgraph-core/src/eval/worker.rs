//! Worker Execution Loop
//!
//! A worker runs the operation it was handed and then tries to keep going on
//! the same thread instead of returning to the pool.
//!
//! When the finished operation has exactly one outgoing relation, and that
//! child becomes ready because of it, the worker claims the child and runs it
//! directly. Chains of single-child operations therefore execute back to back
//! on one thread without a submit/dequeue round trip per link. Anything else
//! (no children, or a fan-out) goes through the admission scheduler and the
//! worker returns to the pool.
//!
//! Pass-through operations can be reached this way too. They have no callback
//! and are simply forwarded.

use std::time::Instant;

use rayon::Scope;
use tracing::trace;

use crate::graph::{OperationId, OperationNode, RelationId};
use super::scheduler;
use super::state::EvalState;

/// Execute a claimed operation and whatever chain follows it.
pub(crate) fn run_task<'s>(scope: &Scope<'s>, state: &'s EvalState<'s>, operation: OperationId) {
    let graph = state.graph;
    let mut operation = operation;

    debug_assert!(
        graph.operation(operation).is_scheduled(),
        "operation {:?} reached a worker without being claimed",
        graph.operation(operation).name()
    );

    loop {
        let node = graph.operation(operation);

        if node.is_noop() {
            state.counters.passed_through();
        } else {
            execute(state, operation, node);
        }

        let &[relation] = node.outlinks() else {
            scheduler::schedule_children(scope, state, operation);
            break;
        };

        match claim_only_child(state, relation) {
            Some(child) => {
                trace!(
                    from = %node.name(),
                    to = %graph.operation(child).name(),
                    "continuing chain in-thread"
                );
                state.counters.chained();
                operation = child;
            }
            None => break,
        }
    }
}

fn execute(state: &EvalState<'_>, operation: OperationId, node: &OperationNode) {
    let start = Instant::now();
    state.observer.task_started(state.graph, operation);

    node.evaluate(state.ctx);

    let elapsed = start.elapsed();
    state.observer.task_completed(state.graph, operation, elapsed);
    state.counters.executed();
}

/// Try to take over the child at the end of `relation` on this thread.
///
/// Returns the child when this thread released its last pending link and won
/// the claim. Otherwise the child is either not ready yet, not part of this
/// refresh, or owned by someone else.
fn claim_only_child(state: &EvalState<'_>, relation: RelationId) -> Option<OperationId> {
    let graph = state.graph;
    let rel = graph.relation(relation);
    let child_id = rel.to();
    let child = graph.operation(child_id);

    // Already claimed: only possible through a cycle.
    if child.is_scheduled() {
        return None;
    }

    if !graph.is_in_scope(child_id, state.layers) {
        return None;
    }

    let pending = if rel.is_cyclic() {
        child.num_links_pending()
    } else {
        child.release_pending_link()
    };

    if pending == 0 && child.try_claim() {
        Some(child_id)
    } else {
        None
    }
}
