//! Evaluation Context
//!
//! The evaluation context carries the state every operation callback may read
//! during a refresh: what kind of evaluation this is and the current time.
//!
//! # Lifetime
//!
//! A context is created before a refresh and may be reused across refreshes.
//! The evaluator writes the current time into it before any operation runs,
//! then hands out shared references only. Callbacks therefore all observe the
//! same, unchanging context for the whole refresh.
//!
//! There is exactly one context per refresh. Components do not get contexts
//! of their own.

/// Purpose of an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvalMode {
    /// Interactive viewport updates.
    #[default]
    Viewport,
    /// Preview renders.
    Preview,
    /// Final render.
    Render,
}

/// Per-refresh state shared read-only with every operation callback.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvaluationContext {
    mode: EvalMode,
    ctime: f32,
}

impl EvaluationContext {
    /// Create a context for the given mode, at time zero.
    pub fn new(mode: EvalMode) -> Self {
        Self { mode, ctime: 0.0 }
    }

    /// Re-initialize an existing context for a different mode.
    ///
    /// Useful for callers that keep one context around and override it.
    pub fn init(&mut self, mode: EvalMode) {
        self.mode = mode;
        self.ctime = 0.0;
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    /// Time the current refresh evaluates at.
    pub fn ctime(&self) -> f32 {
        self.ctime
    }

    pub(crate) fn set_ctime(&mut self, ctime: f32) {
        self.ctime = ctime;
    }
}
