//! Error types for graph construction and engine setup.
//!
//! The evaluation core itself never produces errors: it only works on
//! invariants that are checked with `debug_assert!`. Everything that can go
//! wrong because of caller input (unknown ids, bad configuration, a thread
//! pool that fails to start) is reported through [`DepgraphError`].

use thiserror::Error;

use crate::graph::{ComponentId, IdNodeId, OperationId};

#[derive(Error, Debug)]
pub enum DepgraphError {
    #[error("unknown id node: {0:?}")]
    UnknownIdNode(IdNodeId),

    #[error("unknown component: {0:?}")]
    UnknownComponent(ComponentId),

    #[error("unknown operation: {0:?}")]
    UnknownOperation(OperationId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DepgraphError>;
