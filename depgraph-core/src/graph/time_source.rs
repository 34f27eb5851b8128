//! Time Source
//!
//! The graph has one time source. It stores the current frame and knows which
//! operations are driven by time, so a frame change can tag exactly those.

use super::node::OperationId;

#[derive(Debug, Default)]
pub struct TimeSource {
    ctime: f32,
    dependents: Vec<OperationId>,
}

impl TimeSource {
    /// Current time (frame).
    pub fn ctime(&self) -> f32 {
        self.ctime
    }

    pub fn set_ctime(&mut self, ctime: f32) {
        self.ctime = ctime;
    }

    /// Operations that need updating whenever time changes.
    pub fn dependents(&self) -> &[OperationId] {
        &self.dependents
    }

    pub(crate) fn add_dependent(&mut self, operation: OperationId) {
        if !self.dependents.contains(&operation) {
            self.dependents.push(operation);
        }
    }
}
