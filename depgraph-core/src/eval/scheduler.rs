//! Admission Scheduler
//!
//! Decides which operations enter the worker pool.
//!
//! # Algorithm
//!
//! An operation is admitted when all three hold:
//!
//! 1. it is in scope (tagged for update, owner visible in the refreshed layers)
//! 2. its pending-link counter has reached zero
//! 3. this thread wins the claim on it
//!
//! When a completed parent admits a child it first releases one pending link
//! on the child, unless the connecting relation is cyclic. Whoever performs
//! the release that brings the counter to zero is the one who gets to claim.
//! The claim is a compare-and-swap, so even when several threads observe a
//! zero counter only one of them goes on.
//!
//! Pass-through operations are never submitted. The claiming thread forwards
//! straight to their children instead.

use rayon::Scope;
use tracing::trace;

use crate::graph::OperationId;
use super::pool;
use super::state::EvalState;

/// Admit every operation that is ready at the start of the refresh.
///
/// The ready set is collected before anything is submitted. Once workers
/// run, counters of non-root operations change underneath us, and those
/// operations belong to whichever worker releases their last link.
pub(crate) fn schedule_graph<'s>(scope: &Scope<'s>, state: &'s EvalState<'s>) {
    let graph = state.graph;
    let ready: Vec<OperationId> = graph
        .operation_ids()
        .filter(|&operation| {
            graph.is_in_scope(operation, state.layers) && graph.operation(operation).num_links_pending() == 0
        })
        .collect();

    trace!(ready = ready.len(), "admitting initially ready operations");
    for operation in ready {
        schedule_node(scope, state, operation, false);
    }
}

/// Admit `operation` if it is ready.
///
/// `dec_parents` is true when called because one of its parents completed,
/// in which case that parent's pending link is released first.
pub(crate) fn schedule_node<'s>(
    scope: &Scope<'s>,
    state: &'s EvalState<'s>,
    operation: OperationId,
    dec_parents: bool,
) {
    if admit(scope, state, operation, dec_parents) {
        schedule_children(scope, state, operation);
    }
}

/// Admit the children of an operation that just completed or was passed through.
///
/// Pass-through children claimed along the way are forwarded from a local
/// worklist, so arbitrarily long pass-through chains use constant stack.
pub(crate) fn schedule_children<'s>(scope: &Scope<'s>, state: &'s EvalState<'s>, operation: OperationId) {
    let mut pass_through = Vec::new();
    admit_children(scope, state, operation, &mut pass_through);

    while let Some(noop) = pass_through.pop() {
        admit_children(scope, state, noop, &mut pass_through);
    }
}

fn admit_children<'s>(
    scope: &Scope<'s>,
    state: &'s EvalState<'s>,
    operation: OperationId,
    pass_through: &mut Vec<OperationId>,
) {
    let graph = state.graph;

    for &relation in graph.operation(operation).outlinks() {
        let rel = graph.relation(relation);
        let child = rel.to();

        // Only happens with cyclic dependencies.
        if graph.operation(child).is_scheduled() {
            continue;
        }

        if admit(scope, state, child, !rel.is_cyclic()) {
            pass_through.push(child);
        }
    }
}

/// Release, claim and submit `operation`.
///
/// Returns `true` when this thread claimed a pass-through operation. Its
/// children are then the caller's to admit.
fn admit<'s>(scope: &Scope<'s>, state: &'s EvalState<'s>, operation: OperationId, dec_parents: bool) -> bool {
    let graph = state.graph;
    if !graph.is_in_scope(operation, state.layers) {
        return false;
    }

    let node = graph.operation(operation);
    let pending = if dec_parents {
        node.release_pending_link()
    } else {
        node.num_links_pending()
    };

    if pending != 0 || !node.try_claim() {
        return false;
    }

    if node.is_noop() {
        state.counters.passed_through();
        true
    } else {
        pool::submit(scope, state, operation);
        false
    }
}
