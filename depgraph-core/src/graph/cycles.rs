//! Cycle Detection
//!
//! The evaluator never deadlocks on cycles as long as every cycle contains at
//! least one relation flagged cyclic. [`detect_cycles`] establishes that: it
//! runs an iterative depth-first search and flags every back edge it finds.
//!
//! Relations that are already flagged are not followed, so running the
//! detection twice flags nothing new.

use tracing::warn;

use super::depsgraph::Depsgraph;
use super::node::OperationId;
use super::relation::RelationId;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    OnStack,
    Done,
}

/// Flag every relation that closes a cycle. Returns how many were flagged.
pub fn detect_cycles(graph: &mut Depsgraph) -> usize {
    let back_edges = find_back_edges(graph);

    for &relation in &back_edges {
        let rel = graph.relation(relation);
        warn!(
            from = %graph.operation(rel.from()).name(),
            to = %graph.operation(rel.to()).name(),
            description = %rel.description(),
            "dependency cycle detected; relation marked cyclic"
        );
        graph.mark_relation_cyclic(relation);
    }

    back_edges.len()
}

fn find_back_edges(graph: &Depsgraph) -> Vec<RelationId> {
    let mut state = vec![Visit::Unvisited; graph.operation_count()];
    let mut back_edges = Vec::new();
    // (operation, index of the next outlink to look at)
    let mut stack: Vec<(OperationId, usize)> = Vec::new();

    for root in graph.operation_ids() {
        if state[root.index()] != Visit::Unvisited {
            continue;
        }
        state[root.index()] = Visit::OnStack;
        stack.push((root, 0));

        while let Some((operation, next)) = stack.last_mut() {
            let outlinks = graph.operation(*operation).outlinks();

            let Some(&relation) = outlinks.get(*next) else {
                state[operation.index()] = Visit::Done;
                stack.pop();
                continue;
            };
            *next += 1;

            let rel = graph.relation(relation);
            if rel.is_cyclic() {
                continue;
            }

            let child = rel.to();
            match state[child.index()] {
                Visit::Unvisited => {
                    state[child.index()] = Visit::OnStack;
                    stack.push((child, 0));
                }
                Visit::OnStack => back_edges.push(relation),
                Visit::Done => {}
            }
        }
    }

    back_edges
}
