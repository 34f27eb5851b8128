//! Dependency Graph
//!
//! This module implements the graph model the evaluator runs over.
//!
//! # Overview
//!
//! The graph has three levels of nodes:
//!
//! - Id nodes are entities. Each carries a layer mask; a refresh only touches
//!   entities visible in the requested layers.
//! - Components group the operations of one entity.
//! - Operations are the units of work. An operation either has an evaluation
//!   callback or is a pass-through marker that only forwards readiness.
//!
//! Relations connect operations: a relation from A to B means B must run
//! after A. A relation can be flagged cyclic, in which case it is ignored for
//! ordering purposes.
//!
//! # Design Decisions
//!
//! 1. All nodes live in arenas inside [`Depsgraph`] and refer to each other
//!    through copyable ids. There are no owning back-references.
//!
//! 2. Per-operation scheduling state is atomic, so the whole graph can be
//!    shared by reference across worker threads during a refresh.
//!
//! 3. Both incoming and outgoing relations are stored on each operation: the
//!    pending pass reads incoming ones, the workers follow outgoing ones.

mod cycles;
mod depsgraph;
mod node;
mod relation;
mod time_source;

pub use cycles::detect_cycles;
pub use depsgraph::{Depsgraph, ALL_LAYERS};
pub use node::{ComponentId, ComponentNode, EvalFn, IdNode, IdNodeId, OperationId, OperationNode};
pub use relation::{Relation, RelationId};
pub use time_source::TimeSource;
