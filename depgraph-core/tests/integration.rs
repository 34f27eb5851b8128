//! Integration Tests for Threaded Evaluation
//!
//! These tests build small graphs, tag them, and verify what a refresh runs,
//! in which order, and on which threads.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use depgraph_core::eval::{ExecutionLog, LogEventKind, TimingStats};
use depgraph_core::graph::ComponentId;
use depgraph_core::{
    detect_cycles, Depsgraph, EvalConfig, EvaluationContext, Evaluator, OperationId, ALL_LAYERS,
};

fn evaluator(log: &Arc<ExecutionLog>, threads: usize) -> Evaluator {
    let config = EvalConfig {
        num_threads: Some(threads),
        ..EvalConfig::default()
    };
    Evaluator::with_observer(config, log.clone()).unwrap()
}

fn scene(layers: u32) -> (Depsgraph, ComponentId) {
    let mut graph = Depsgraph::new();
    let id = graph.add_id_node("OBCube", layers);
    let comp = graph.add_component(id, "Transform").unwrap();
    (graph, comp)
}

fn op(graph: &mut Depsgraph, comp: ComponentId, name: &str) -> OperationId {
    graph.add_operation(comp, name, |_| {}).unwrap()
}

fn tag_all(graph: &mut Depsgraph) {
    let ids: Vec<_> = graph.operation_ids().collect();
    for id in ids {
        graph.tag_update(id).unwrap();
    }
}

fn refresh(evaluator: &Evaluator, graph: &mut Depsgraph, layers: u32) -> depgraph_core::EvalReport {
    let mut ctx = EvaluationContext::default();
    evaluator.evaluate_on_refresh_ex(&mut ctx, graph, layers)
}

fn started_before_completed(log: &ExecutionLog, first: OperationId, then: OperationId) -> bool {
    let done = log.position(first, LogEventKind::Completed).unwrap();
    let start = log.position(then, LogEventKind::Started).unwrap();
    done < start
}

/// A chain runs in order, on one thread, with a single submission.
#[test]
fn chain_runs_in_thread() {
    let (mut graph, comp) = scene(1);
    let a = op(&mut graph, comp, "A");
    let b = op(&mut graph, comp, "B");
    let c = op(&mut graph, comp, "C");
    let d = op(&mut graph, comp, "D");
    graph.add_relation(a, b, "").unwrap();
    graph.add_relation(b, c, "").unwrap();
    graph.add_relation(c, d, "").unwrap();
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let report = refresh(&evaluator(&log, 4), &mut graph, ALL_LAYERS);

    assert_eq!(log.started(), vec![a, b, c, d]);
    assert_eq!(report.executed, 4);
    assert_eq!(report.submitted, 1);
    assert_eq!(report.chained, 3);

    let thread = log.thread_of(a).unwrap();
    assert!([b, c, d].iter().all(|&op| log.thread_of(op) == Some(thread)));
}

/// Both children of a fan-out run after the parent, once each.
#[test]
fn fan_out_runs_each_child_once() {
    let (mut graph, comp) = scene(1);
    let a = op(&mut graph, comp, "A");
    let b = op(&mut graph, comp, "B");
    let c = op(&mut graph, comp, "C");
    graph.add_relation(a, b, "").unwrap();
    graph.add_relation(a, c, "").unwrap();
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let report = refresh(&evaluator(&log, 4), &mut graph, ALL_LAYERS);

    let started = log.started();
    assert_eq!(started.len(), 3);
    assert_eq!(started[0], a);
    assert_eq!(started.iter().filter(|&&op| op == b).count(), 1);
    assert_eq!(started.iter().filter(|&&op| op == c).count(), 1);
    assert!(started_before_completed(&log, a, b));
    assert!(started_before_completed(&log, a, c));
    assert_eq!(report.submitted, 3);
    assert_eq!(report.chained, 0);
}

/// A child with two parents waits for both.
#[test]
fn join_waits_for_every_parent() {
    let (mut graph, comp) = scene(1);
    let a = op(&mut graph, comp, "A");
    let x = op(&mut graph, comp, "X");
    let b = op(&mut graph, comp, "B");
    graph.add_relation(a, b, "").unwrap();
    graph.add_relation(x, b, "").unwrap();
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let evaluator = evaluator(&log, 4);
    for _ in 0..20 {
        log.clear();
        tag_all(&mut graph);
        refresh(&evaluator, &mut graph, ALL_LAYERS);

        assert_eq!(log.started().len(), 3);
        assert!(started_before_completed(&log, a, b));
        assert!(started_before_completed(&log, x, b));
    }
}

/// A cyclic back edge does not gate its target.
#[test]
fn cyclic_relation_does_not_block() {
    let (mut graph, comp) = scene(1);
    let x = op(&mut graph, comp, "X");
    let a = op(&mut graph, comp, "A");
    let b = op(&mut graph, comp, "B");
    graph.add_relation(x, a, "").unwrap();
    graph.add_relation(a, b, "").unwrap();
    graph.add_cyclic_relation(b, a, "").unwrap();
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let report = refresh(&evaluator(&log, 4), &mut graph, ALL_LAYERS);

    assert_eq!(log.started(), vec![x, a, b]);
    assert_eq!(report.executed, 3);
}

/// Cycles found by detection are broken and evaluate without deadlock.
#[test]
fn detected_cycle_completes() {
    let (mut graph, comp) = scene(1);
    let ops: Vec<_> = (0..5).map(|i| op(&mut graph, comp, &format!("op{i}"))).collect();
    for pair in ops.windows(2) {
        graph.add_relation(pair[0], pair[1], "").unwrap();
    }
    graph.add_relation(ops[4], ops[1], "").unwrap();
    assert_eq!(detect_cycles(&mut graph), 1);

    tag_all(&mut graph);
    let log = Arc::new(ExecutionLog::new());
    let report = refresh(&evaluator(&log, 2), &mut graph, ALL_LAYERS);

    assert_eq!(report.executed, 5);
    let unique: HashSet<_> = log.started().into_iter().collect();
    assert_eq!(unique.len(), 5);
}

/// Operations on hidden layers are skipped without blocking visible ones.
#[test]
fn hidden_layers_are_skipped() {
    let mut graph = Depsgraph::new();
    let visible = graph.add_id_node("OBVisible", 0b01);
    let hidden = graph.add_id_node("OBHidden", 0b10);
    let vc = graph.add_component(visible, "Transform").unwrap();
    let hc = graph.add_component(hidden, "Transform").unwrap();

    let h1 = op(&mut graph, hc, "hidden1");
    let h2 = op(&mut graph, hc, "hidden2");
    let v = op(&mut graph, vc, "visible");
    graph.add_relation(h1, h2, "").unwrap();
    graph.add_relation(h1, v, "").unwrap();
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let report = refresh(&evaluator(&log, 2), &mut graph, 0b01);

    assert_eq!(log.started(), vec![v]);
    assert_eq!(report.executed, 1);
    assert!(log.thread_of(h1).is_none());
    assert!(log.thread_of(h2).is_none());
}

/// Untagged operations never run, and do not gate tagged children.
#[test]
fn untagged_operations_are_skipped() {
    let (mut graph, comp) = scene(1);
    let a = op(&mut graph, comp, "A");
    let b = op(&mut graph, comp, "B");
    graph.add_relation(a, b, "").unwrap();
    graph.tag_update(b).unwrap();

    let log = Arc::new(ExecutionLog::new());
    refresh(&evaluator(&log, 2), &mut graph, ALL_LAYERS);

    assert_eq!(log.started(), vec![b]);
}

/// Pass-through operations never reach the pool; their children still run.
#[test]
fn pass_through_is_never_submitted() {
    let (mut graph, comp) = scene(1);
    let entry = graph.add_noop_operation(comp, "entry").unwrap();
    let b = op(&mut graph, comp, "B");
    let c = op(&mut graph, comp, "C");
    let exit = graph.add_noop_operation(comp, "exit").unwrap();
    let d = op(&mut graph, comp, "D");
    graph.add_relation(entry, b, "").unwrap();
    graph.add_relation(entry, c, "").unwrap();
    graph.add_relation(b, exit, "").unwrap();
    graph.add_relation(c, exit, "").unwrap();
    graph.add_relation(exit, d, "").unwrap();
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let report = refresh(&evaluator(&log, 4), &mut graph, ALL_LAYERS);

    assert_eq!(report.executed, 3);
    assert_eq!(report.passed_through, 2);
    // B and C are submitted; whichever finishes last falls through `exit` into D.
    assert_eq!(report.submitted, 2);
    assert_eq!(report.chained, 2);
    assert!(log.thread_of(entry).is_none());
    assert!(log.thread_of(exit).is_none());
    assert!(started_before_completed(&log, b, d));
    assert!(started_before_completed(&log, c, d));
}

/// A long pass-through chain starting at a root is forwarded without
/// growing the stack.
#[test]
fn long_pass_through_chain_from_root() {
    const LEN: usize = 100_000;

    let (mut graph, comp) = scene(1);
    let root = graph.add_noop_operation(comp, "noop0").unwrap();
    let mut last = root;
    for i in 1..LEN {
        let next = graph.add_noop_operation(comp, format!("noop{i}")).unwrap();
        graph.add_relation(last, next, "").unwrap();
        last = next;
    }
    let tail = op(&mut graph, comp, "tail");
    graph.add_relation(last, tail, "").unwrap();

    graph.tag_update(root).unwrap();
    graph.flush_updates();

    let log = Arc::new(ExecutionLog::new());
    let report = refresh(&evaluator(&log, 2), &mut graph, ALL_LAYERS);

    assert_eq!(report.passed_through, LEN);
    assert_eq!(report.executed, 1);
    assert_eq!(report.submitted, 1);
    assert_eq!(log.started(), vec![tail]);
}

/// Without entry tags a refresh does nothing and changes nothing.
#[test]
fn refresh_without_tags_is_a_no_op() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();

    let (mut graph, comp) = scene(1);
    let a = graph
        .add_operation(comp, "A", move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    let log = Arc::new(ExecutionLog::new());
    let evaluator = evaluator(&log, 2);
    let mut ctx = EvaluationContext::default();
    let before = ctx.clone();

    let report = evaluator.evaluate_on_refresh_ex(&mut ctx, &mut graph, ALL_LAYERS);

    assert!(report.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(ctx, before);
    assert_eq!(log.finished_cycles(), 0);
    assert!(!graph.operation(a).needs_update());
}

/// Tags are consumed by a refresh, so a second one does nothing.
#[test]
fn tags_are_cleared_after_refresh() {
    let (mut graph, comp) = scene(1);
    let a = op(&mut graph, comp, "A");
    let b = op(&mut graph, comp, "B");
    graph.add_relation(a, b, "").unwrap();
    graph.tag_update(a).unwrap();
    graph.flush_updates();

    let log = Arc::new(ExecutionLog::new());
    let evaluator = evaluator(&log, 2);

    assert_eq!(refresh(&evaluator, &mut graph, ALL_LAYERS).executed, 2);
    assert!(!graph.needs_eval());
    assert!(graph.operations().iter().all(|op| !op.needs_update()));

    assert!(refresh(&evaluator, &mut graph, ALL_LAYERS).is_empty());
    assert_eq!(log.finished_cycles(), 1);
}

/// A panicking callback still leaves the graph untagged.
#[test]
fn tags_are_cleared_when_a_callback_panics() {
    let (mut graph, comp) = scene(1);
    let a = graph
        .add_operation(comp, "explodes", |_| panic!("evaluation failed"))
        .unwrap();
    let b = op(&mut graph, comp, "B");
    graph.add_relation(a, b, "").unwrap();
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let evaluator = evaluator(&log, 2);

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        refresh(&evaluator, &mut graph, ALL_LAYERS)
    }));

    assert!(result.is_err());
    assert!(!graph.needs_eval());
    assert!(log.thread_of(b).is_none());
    // Observers still see the refresh end.
    assert_eq!(log.finished_cycles(), 1);
}

/// A frame change re-evaluates time-dependent operations and their dependents.
#[test]
fn frame_change_reevaluates_time_dependents() {
    let frame = Arc::new(AtomicU32::new(0));
    let frame_clone = frame.clone();

    let (mut graph, comp) = scene(1);
    let static_op = op(&mut graph, comp, "static");
    let anim = graph
        .add_operation(comp, "animation", move |ctx| {
            frame_clone.store(ctx.ctime() as u32, Ordering::SeqCst);
        })
        .unwrap();
    let deform = op(&mut graph, comp, "deform");
    graph.add_relation(anim, deform, "").unwrap();
    graph.add_time_relation(anim).unwrap();

    let log = Arc::new(ExecutionLog::new());
    let evaluator = evaluator(&log, 2);
    let mut ctx = EvaluationContext::default();

    let report = evaluator.evaluate_on_framechange(&mut ctx, &mut graph, 42.0, ALL_LAYERS);

    assert_eq!(report.executed, 2);
    assert_eq!(frame.load(Ordering::SeqCst), 42);
    assert_eq!(log.started(), vec![anim, deform]);
    assert!(log.thread_of(static_op).is_none());
    assert_eq!(graph.time_source().ctime(), 42.0);
}

/// The single-thread debug toggle runs everything on one worker.
#[test]
fn single_threaded_mode_uses_one_worker() {
    let (mut graph, comp) = scene(1);
    let root = op(&mut graph, comp, "root");
    let leaves: Vec<_> = (0..8).map(|i| op(&mut graph, comp, &format!("leaf{i}"))).collect();
    for &leaf in &leaves {
        graph.add_relation(root, leaf, "").unwrap();
    }
    tag_all(&mut graph);

    let log = Arc::new(ExecutionLog::new());
    let evaluator = Evaluator::with_observer(EvalConfig::single_threaded(), log.clone()).unwrap();
    let report = refresh(&evaluator, &mut graph, ALL_LAYERS);

    assert_eq!(report.executed, 9);
    let threads: HashSet<_> = log.events().iter().map(|e| e.thread).collect();
    assert_eq!(threads.len(), 1);
}

/// Wide diamonds evaluated many times never run anything twice.
#[test]
fn wide_diamond_runs_everything_once() {
    let (mut graph, comp) = scene(1);
    let source = op(&mut graph, comp, "source");
    let sink = op(&mut graph, comp, "sink");
    for i in 0..64 {
        let middle = op(&mut graph, comp, &format!("middle{i}"));
        graph.add_relation(source, middle, "").unwrap();
        graph.add_relation(middle, sink, "").unwrap();
    }

    let stats = Arc::new(TimingStats::new());
    let evaluator = Evaluator::with_observer(
        EvalConfig {
            num_threads: Some(8),
            parallel_pending_threshold: 16,
            ..EvalConfig::default()
        },
        stats.clone(),
    )
    .unwrap();

    for _ in 0..25 {
        tag_all(&mut graph);
        let report = refresh(&evaluator, &mut graph, ALL_LAYERS);
        assert_eq!(report.executed, 66);
    }

    assert_eq!(stats.total_calls(), 66 * 25);
    assert_eq!(stats.get(sink).unwrap().calls, 25);
}
