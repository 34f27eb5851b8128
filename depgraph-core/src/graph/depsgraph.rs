//! Dependency Graph Storage
//!
//! [`Depsgraph`] owns every node and relation of the graph in index-addressed
//! arenas, plus the bookkeeping that decides what the next refresh has to do:
//!
//! 1. Callers tag operations with [`Depsgraph::tag_update`]. Tagged operations
//!    are remembered as entry tags.
//! 2. [`Depsgraph::flush_updates`] walks outgoing relations from every entry
//!    tag and marks everything downstream as needing an update.
//! 3. The evaluator runs every operation that needs an update and is visible
//!    in the requested layers, then calls [`Depsgraph::clear_tags`].
//!
//! Nodes and relations persist across refreshes. Only the per-cycle fields on
//! [`OperationNode`] change during evaluation, and those are atomics.

use std::collections::VecDeque;

use indexmap::IndexSet;
use tracing::debug;

use crate::error::{DepgraphError, Result};
use crate::eval::EvaluationContext;
use super::node::{ComponentId, ComponentNode, EvalFn, IdNode, IdNodeId, OperationId, OperationNode};
use super::relation::{Relation, RelationId};
use super::time_source::TimeSource;

/// Layer mask matching every id node.
pub const ALL_LAYERS: u32 = u32::MAX;

/// The operation graph.
#[derive(Debug)]
pub struct Depsgraph {
    id_nodes: Vec<IdNode>,
    components: Vec<ComponentNode>,
    operations: Vec<OperationNode>,
    relations: Vec<Relation>,

    /// Operations tagged since the last refresh, in tagging order.
    entry_tags: IndexSet<OperationId>,

    time_source: TimeSource,

    /// Layers visible by default, used by the plain refresh entry point.
    layers: u32,
}

impl Depsgraph {
    /// Create an empty graph with every layer visible.
    pub fn new() -> Self {
        Self {
            id_nodes: Vec::new(),
            components: Vec::new(),
            operations: Vec::new(),
            relations: Vec::new(),
            entry_tags: IndexSet::new(),
            time_source: TimeSource::default(),
            layers: ALL_LAYERS,
        }
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    /// Add an id node living on `layers`.
    pub fn add_id_node(&mut self, name: impl Into<String>, layers: u32) -> IdNodeId {
        let id = IdNodeId::from_index(self.id_nodes.len());
        self.id_nodes.push(IdNode::new(name, layers));
        id
    }

    /// Add a component to an id node.
    pub fn add_component(&mut self, owner: IdNodeId, name: impl Into<String>) -> Result<ComponentId> {
        let id = ComponentId::from_index(self.components.len());
        self.id_nodes
            .get_mut(owner.index())
            .ok_or(DepgraphError::UnknownIdNode(owner))?
            .add_component(id);
        self.components.push(ComponentNode::new(name, owner));
        Ok(id)
    }

    /// Add an operation that runs `evaluate` when it needs updating.
    pub fn add_operation<F>(
        &mut self,
        owner: ComponentId,
        name: impl Into<String>,
        evaluate: F,
    ) -> Result<OperationId>
    where
        F: Fn(&EvaluationContext) + Send + Sync + 'static,
    {
        self.insert_operation(owner, name.into(), Some(Box::new(evaluate)))
    }

    /// Add a pass-through operation. It only forwards readiness to its children.
    pub fn add_noop_operation(&mut self, owner: ComponentId, name: impl Into<String>) -> Result<OperationId> {
        self.insert_operation(owner, name.into(), None)
    }

    fn insert_operation(
        &mut self,
        owner: ComponentId,
        name: String,
        evaluate: Option<EvalFn>,
    ) -> Result<OperationId> {
        let id = OperationId::from_index(self.operations.len());
        self.components
            .get_mut(owner.index())
            .ok_or(DepgraphError::UnknownComponent(owner))?
            .add_operation(id);
        self.operations.push(OperationNode::new(name, owner, evaluate));
        Ok(id)
    }

    /// Add a relation: `to` depends on `from`.
    pub fn add_relation(
        &mut self,
        from: OperationId,
        to: OperationId,
        description: impl Into<String>,
    ) -> Result<RelationId> {
        self.check_operation(from)?;
        self.check_operation(to)?;

        let id = RelationId::from_index(self.relations.len());
        self.relations.push(Relation::new(from, to, description));
        self.operations[from.index()].add_outlink(id);
        self.operations[to.index()].add_inlink(id);
        Ok(id)
    }

    /// Add a relation that is known to close a cycle.
    pub fn add_cyclic_relation(
        &mut self,
        from: OperationId,
        to: OperationId,
        description: impl Into<String>,
    ) -> Result<RelationId> {
        let id = self.add_relation(from, to, description)?;
        self.relations[id.index()].mark_cyclic();
        Ok(id)
    }

    /// Make `operation` depend on the time source.
    pub fn add_time_relation(&mut self, operation: OperationId) -> Result<()> {
        self.check_operation(operation)?;
        self.time_source.add_dependent(operation);
        Ok(())
    }

    pub(crate) fn mark_relation_cyclic(&mut self, relation: RelationId) {
        self.relations[relation.index()].mark_cyclic();
    }

    fn check_operation(&self, operation: OperationId) -> Result<()> {
        if operation.index() < self.operations.len() {
            Ok(())
        } else {
            Err(DepgraphError::UnknownOperation(operation))
        }
    }

    // ------------------------------------------------------------------
    // Access
    // ------------------------------------------------------------------

    /// Get an operation. Panics on an id from another graph.
    pub fn operation(&self, id: OperationId) -> &OperationNode {
        &self.operations[id.index()]
    }

    pub fn get_operation(&self, id: OperationId) -> Option<&OperationNode> {
        self.operations.get(id.index())
    }

    pub fn operations(&self) -> &[OperationNode] {
        &self.operations
    }

    pub fn operation_ids(&self) -> impl Iterator<Item = OperationId> + '_ {
        (0..self.operations.len()).map(OperationId::from_index)
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }

    pub fn relation(&self, id: RelationId) -> &Relation {
        &self.relations[id.index()]
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn component(&self, id: ComponentId) -> &ComponentNode {
        &self.components[id.index()]
    }

    pub fn id_node(&self, id: IdNodeId) -> &IdNode {
        &self.id_nodes[id.index()]
    }

    /// Id node that ultimately owns an operation.
    pub fn owner_id_node(&self, operation: OperationId) -> IdNodeId {
        let component = self.operations[operation.index()].owner();
        self.components[component.index()].owner()
    }

    /// Layer mask of the id node owning `operation`.
    pub fn owner_layers(&self, operation: OperationId) -> u32 {
        self.id_nodes[self.owner_id_node(operation).index()].layers()
    }

    /// Whether `operation` takes part in a refresh of `layers`.
    ///
    /// It must be tagged as needing an update and its id node must be visible
    /// in at least one of the requested layers.
    pub fn is_in_scope(&self, operation: OperationId, layers: u32) -> bool {
        self.operations[operation.index()].needs_update()
            && (self.owner_layers(operation) & layers) != 0
    }

    /// Change the layer mask of an id node.
    pub fn set_id_node_layers(&mut self, id: IdNodeId, layers: u32) -> Result<()> {
        self.id_nodes
            .get_mut(id.index())
            .ok_or(DepgraphError::UnknownIdNode(id))?
            .set_layers(layers);
        Ok(())
    }

    /// Layers visible by default.
    pub fn layers(&self) -> u32 {
        self.layers
    }

    pub fn set_layers(&mut self, layers: u32) {
        self.layers = layers;
    }

    pub fn time_source(&self) -> &TimeSource {
        &self.time_source
    }

    pub fn time_source_mut(&mut self) -> &mut TimeSource {
        &mut self.time_source
    }

    // ------------------------------------------------------------------
    // Tagging
    // ------------------------------------------------------------------

    /// Tag an operation as modified. It becomes an entry tag of the next refresh.
    pub fn tag_update(&mut self, operation: OperationId) -> Result<()> {
        self.check_operation(operation)?;
        self.operations[operation.index()].mark_directly_modified();
        self.entry_tags.insert(operation);
        Ok(())
    }

    /// Tag every operation driven by the time source.
    pub fn tag_time_source(&mut self) {
        let dependents = self.time_source.dependents().to_vec();
        for operation in dependents {
            self.operations[operation.index()].mark_directly_modified();
            self.entry_tags.insert(operation);
        }
    }

    /// Propagate updates from the entry tags to everything downstream.
    ///
    /// Returns the number of operations visited, entry tags included.
    pub fn flush_updates(&mut self) -> usize {
        let mut visited = vec![false; self.operations.len()];
        let mut queue: VecDeque<OperationId> = self.entry_tags.iter().copied().collect();
        let mut count = 0;

        while let Some(operation) = queue.pop_front() {
            if std::mem::replace(&mut visited[operation.index()], true) {
                continue;
            }
            count += 1;

            let node = &mut self.operations[operation.index()];
            node.mark_needs_update();

            for &relation in node.outlinks() {
                let child = self.relations[relation.index()].to();
                if !visited[child.index()] {
                    queue.push_back(child);
                }
            }
        }

        debug!(
            entry_tags = self.entry_tags.len(),
            flushed = count,
            "flushed updates from entry tags"
        );
        count
    }

    /// Operations tagged since the last refresh.
    pub fn entry_tags(&self) -> impl Iterator<Item = OperationId> + '_ {
        self.entry_tags.iter().copied()
    }

    /// Whether a refresh would have anything to do.
    pub fn needs_eval(&self) -> bool {
        !self.entry_tags.is_empty()
    }

    /// Forget every tag: entry tags and the per-operation update flags.
    pub fn clear_tags(&mut self) {
        for node in &mut self.operations {
            node.clear_tags();
        }
        self.entry_tags.clear();
    }
}

impl Default for Depsgraph {
    fn default() -> Self {
        Self::new()
    }
}
