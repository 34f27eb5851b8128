//! Relations between operations.

use super::node::OperationId;

/// Index of a relation in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(u32);

impl RelationId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A directed dependency: `to` must run after `from`.
///
/// Relations flagged `cyclic` close a dependency cycle. The engine ignores
/// them when counting and releasing pending links, which is what keeps a
/// cycle from blocking the refresh forever.
#[derive(Debug, Clone)]
pub struct Relation {
    from: OperationId,
    to: OperationId,
    description: String,
    cyclic: bool,
}

impl Relation {
    pub(crate) fn new(from: OperationId, to: OperationId, description: impl Into<String>) -> Self {
        Self {
            from,
            to,
            description: description.into(),
            cyclic: false,
        }
    }

    pub fn from(&self) -> OperationId {
        self.from
    }

    pub fn to(&self) -> OperationId {
        self.to
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_cyclic(&self) -> bool {
        self.cyclic
    }

    pub(crate) fn mark_cyclic(&mut self) {
        self.cyclic = true;
    }
}
