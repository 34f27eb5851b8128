//! Depgraph Core
//!
//! This crate provides the evaluation engine for operation dependency graphs.
//! It implements:
//!
//! - An arena-backed graph of entities, components and operations
//! - Update tagging, flushing and cycle detection
//! - Threaded, dependency-ordered evaluation of tagged operations
//! - Instrumentation hooks for timing and tracing evaluations
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: nodes, relations and the tagging that decides what to update
//! - `eval`: the evaluator, its worker pool and scheduling
//! - `config`: evaluator configuration
//! - `error`: error types for graph construction and setup
//!
//! # Example
//!
//! ```rust,no_run
//! use depgraph_core::{Depsgraph, EvalConfig, EvaluationContext, Evaluator, ALL_LAYERS};
//!
//! let mut graph = Depsgraph::new();
//! let cube = graph.add_id_node("OBCube", 1);
//! let transform = graph.add_component(cube, "Transform")?;
//!
//! let local = graph.add_operation(transform, "local", |ctx| {
//!     println!("local transform at frame {}", ctx.ctime());
//! })?;
//! let world = graph.add_operation(transform, "world", |_| {
//!     println!("world transform");
//! })?;
//! graph.add_relation(local, world, "local -> world")?;
//!
//! graph.tag_update(local)?;
//! graph.flush_updates();
//!
//! let evaluator = Evaluator::new(EvalConfig::default())?;
//! let mut ctx = EvaluationContext::default();
//! let report = evaluator.evaluate_on_refresh_ex(&mut ctx, &mut graph, ALL_LAYERS);
//! assert_eq!(report.executed, 2);
//! # Ok::<(), depgraph_core::DepgraphError>(())
//! ```

pub mod config;
pub mod error;
pub mod eval;
pub mod graph;

pub use config::EvalConfig;
pub use error::{DepgraphError, Result};
pub use eval::{EvalMode, EvalObserver, EvalReport, EvaluationContext, Evaluator};
pub use graph::{detect_cycles, Depsgraph, OperationId, ALL_LAYERS};
