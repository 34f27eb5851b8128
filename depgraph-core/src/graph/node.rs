//! Graph Nodes
//!
//! This module defines the node types that live in the dependency graph:
//! id nodes (entities carrying a layer mask), components grouping operations
//! of one entity, and the operation nodes the engine actually schedules.
//!
//! Nodes refer to each other through plain arena indices. An operation's
//! owner is a [`ComponentId`], a component's owner is an [`IdNodeId`].

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use smallvec::SmallVec;

use crate::eval::EvaluationContext;
use super::relation::RelationId;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }

            /// Position of this node in its arena.
            pub fn index(&self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_id!(
    /// Index of an id node (entity) in the graph.
    IdNodeId
);
arena_id!(
    /// Index of a component in the graph.
    ComponentId
);
arena_id!(
    /// Index of an operation in the graph.
    OperationId
);

/// Evaluation callback of an operation.
///
/// Callbacks may run on any worker thread and only get shared access to the
/// evaluation context.
pub type EvalFn = Box<dyn Fn(&EvaluationContext) + Send + Sync>;

/// An entity in the graph. Its layer mask scopes every operation it owns.
#[derive(Debug)]
pub struct IdNode {
    name: String,
    layers: u32,
    components: Vec<ComponentId>,
}

impl IdNode {
    pub(crate) fn new(name: impl Into<String>, layers: u32) -> Self {
        Self {
            name: name.into(),
            layers,
            components: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layer membership mask.
    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub(crate) fn set_layers(&mut self, layers: u32) {
        self.layers = layers;
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }

    pub(crate) fn add_component(&mut self, component: ComponentId) {
        self.components.push(component);
    }
}

/// A group of operations belonging to one id node.
#[derive(Debug)]
pub struct ComponentNode {
    name: String,
    owner: IdNodeId,
    operations: Vec<OperationId>,
}

impl ComponentNode {
    pub(crate) fn new(name: impl Into<String>, owner: IdNodeId) -> Self {
        Self {
            name: name.into(),
            owner,
            operations: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> IdNodeId {
        self.owner
    }

    pub fn operations(&self) -> &[OperationId] {
        &self.operations
    }

    pub(crate) fn add_operation(&mut self, operation: OperationId) {
        self.operations.push(operation);
    }
}

/// A schedulable unit of work.
///
/// The persistent part (name, owner, callback, relations, tags) is only
/// mutated through `&mut Depsgraph` between refreshes. The two per-cycle
/// fields are atomics so that workers can update them through a shared
/// reference:
///
/// - `scheduled` goes from `false` to `true` at most once per refresh; the
///   thread that performs that transition owns executing (or forwarding)
///   the operation.
/// - `num_links_pending` is set once by the pending pass and afterwards only
///   decremented. The operation may not start while it is nonzero.
pub struct OperationNode {
    name: String,
    owner: ComponentId,
    evaluate: Option<EvalFn>,

    needs_update: bool,
    directly_modified: bool,

    inlinks: SmallVec<[RelationId; 4]>,
    outlinks: SmallVec<[RelationId; 4]>,

    num_links_pending: AtomicU32,
    scheduled: AtomicBool,
}

impl OperationNode {
    pub(crate) fn new(name: impl Into<String>, owner: ComponentId, evaluate: Option<EvalFn>) -> Self {
        Self {
            name: name.into(),
            owner,
            evaluate,
            needs_update: false,
            directly_modified: false,
            inlinks: SmallVec::new(),
            outlinks: SmallVec::new(),
            num_links_pending: AtomicU32::new(0),
            scheduled: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component this operation belongs to.
    pub fn owner(&self) -> ComponentId {
        self.owner
    }

    /// Pass-through operations have no callback and never occupy a worker.
    pub fn is_noop(&self) -> bool {
        self.evaluate.is_none()
    }

    /// Run the callback, if there is one.
    pub(crate) fn evaluate(&self, ctx: &EvaluationContext) {
        if let Some(evaluate) = &self.evaluate {
            evaluate(ctx);
        }
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Whether this operation was tagged itself rather than through a flush.
    pub fn is_directly_modified(&self) -> bool {
        self.directly_modified
    }

    pub(crate) fn mark_needs_update(&mut self) {
        self.needs_update = true;
    }

    pub(crate) fn mark_directly_modified(&mut self) {
        self.needs_update = true;
        self.directly_modified = true;
    }

    pub(crate) fn clear_tags(&mut self) {
        self.needs_update = false;
        self.directly_modified = false;
    }

    /// Relations pointing at this operation.
    pub fn inlinks(&self) -> &[RelationId] {
        &self.inlinks
    }

    /// Relations leaving this operation.
    pub fn outlinks(&self) -> &[RelationId] {
        &self.outlinks
    }

    pub(crate) fn add_inlink(&mut self, relation: RelationId) {
        self.inlinks.push(relation);
    }

    pub(crate) fn add_outlink(&mut self, relation: RelationId) {
        self.outlinks.push(relation);
    }

    // ------------------------------------------------------------------
    // Per-cycle scheduling state
    // ------------------------------------------------------------------

    /// Number of unsatisfied dependencies in the current refresh.
    pub fn num_links_pending(&self) -> u32 {
        self.num_links_pending.load(Ordering::Acquire)
    }

    /// Whether the operation has been claimed in the current refresh.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Start a new refresh: unclaimed, with `pending` unsatisfied links.
    pub(crate) fn reset_cycle_state(&self, pending: u32) {
        self.num_links_pending.store(pending, Ordering::Relaxed);
        self.scheduled.store(false, Ordering::Relaxed);
    }

    /// Mark one dependency as satisfied and return how many remain.
    pub(crate) fn release_pending_link(&self) -> u32 {
        let previous = self.num_links_pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(
            previous > 0,
            "operation {:?} released a link with no pending links",
            self.name
        );
        previous.wrapping_sub(1)
    }

    /// Claim the operation for this refresh.
    ///
    /// Returns `true` for exactly one caller per refresh.
    pub(crate) fn try_claim(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl fmt::Debug for OperationNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationNode")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("noop", &self.is_noop())
            .field("needs_update", &self.needs_update)
            .field("inlinks", &self.inlinks.len())
            .field("outlinks", &self.outlinks.len())
            .field("num_links_pending", &self.num_links_pending())
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}
