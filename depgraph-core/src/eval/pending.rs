//! Pending-Dependency Calculation
//!
//! Before a refresh starts, every operation gets its per-cycle state reset:
//! it becomes unclaimed, and its pending-link counter is set to the number of
//! incoming relations that will actually be satisfied during this refresh.
//!
//! A relation counts when it is not cyclic and its source operation is in
//! scope itself (needs an update and is visible in the refreshed layers).
//! Operations out of scope get zero; they are never admitted anyway.
//!
//! Each operation only reads its own incoming relations and writes its own
//! counters, so the pass is a plain parallel map over the operation arena.

use rayon::prelude::*;

use crate::graph::{Depsgraph, OperationId};
use super::pool::TaskPool;

/// Reset claim flags and pending counters for a refresh of `layers`.
///
/// Runs on the pool when the graph has more than `threshold` operations.
pub(crate) fn calculate_pending_parents(pool: &TaskPool, graph: &Depsgraph, layers: u32, threshold: usize) {
    let count = graph.operation_count();

    if count > threshold {
        pool.install(|| {
            (0..count).into_par_iter().for_each(|index| {
                reset_operation(graph, OperationId::from_index(index), layers);
            });
        });
    } else {
        for operation in graph.operation_ids() {
            reset_operation(graph, operation, layers);
        }
    }
}

fn reset_operation(graph: &Depsgraph, operation: OperationId, layers: u32) {
    graph
        .operation(operation)
        .reset_cycle_state(pending_links(graph, operation, layers));
}

/// Number of incoming relations of `operation` that gate it in this refresh.
pub(crate) fn pending_links(graph: &Depsgraph, operation: OperationId, layers: u32) -> u32 {
    if !graph.is_in_scope(operation, layers) {
        return 0;
    }

    graph
        .operation(operation)
        .inlinks()
        .iter()
        .map(|&relation| graph.relation(relation))
        .filter(|rel| !rel.is_cyclic() && graph.is_in_scope(rel.from(), layers))
        .count() as u32
}
