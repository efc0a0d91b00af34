//! End-to-end flows through the execution registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use cptree::prelude::*;
use cptree::{Error, MergeError};

fn feed(conductor: &Conductor, id: ExecutionId, events: &[NodeEvent]) {
    for event in events {
        conductor.handle(id, event.clone()).unwrap();
    }
}

fn binary_run() -> Vec<NodeEvent> {
    vec![
        NodeEvent::root(Status::Branch),
        NodeEvent::child(NodeId::ROOT, 0, Status::Branch),
        NodeEvent::child(NodeId::ROOT, 1, Status::Failure),
        NodeEvent::child(NodeId::new(1), 0, Status::Solution),
        NodeEvent::child(NodeId::new(1), 1, Status::Failure),
        NodeEvent::Done,
    ]
}

#[test]
fn stream_builds_tree_and_layout() {
    let conductor = Conductor::default();
    let id = conductor.start("golomb", 0, false).unwrap();
    feed(&conductor, id, &binary_run());
    let summary = conductor.finish(id).unwrap();
    assert_eq!(summary.nodes, 5);
    assert_eq!(summary.malformed, 0);
    assert!(summary.finished);

    let tree = conductor.tree(id).unwrap();
    let pass = tree.update_layout(1.0);
    assert_eq!(pass.nodes, 5);
    assert_eq!(pass.recomputed, 5);
    assert_eq!(tree.layout().get_depth(NodeId::ROOT).unwrap(), 3);

    // Sibling subtrees never overlap.
    let left = tree.layout().absolute_x(tree.structure(), NodeId::new(1)).unwrap();
    let right = tree.layout().absolute_x(tree.structure(), NodeId::new(2)).unwrap();
    assert!(right - left >= 1.0);
}

#[test]
fn malformed_events_are_counted_not_fatal() {
    let conductor = Conductor::default();
    let id = conductor.start("bad", 0, false).unwrap();
    feed(
        &conductor,
        id,
        &[
            NodeEvent::root(Status::Branch),
            NodeEvent::child(NodeId::new(12), 0, Status::Branch),
            NodeEvent::child(NodeId::ROOT, 0, Status::Failure),
        ],
    );
    let summary = conductor.finish(id).unwrap();
    assert_eq!(summary.nodes, 2);
    assert_eq!(summary.malformed, 1);
}

#[test]
fn readers_query_while_building() {
    let conductor = Arc::new(Conductor::default());
    let id = conductor.start("live", 0, false).unwrap();
    let tree = conductor.tree(id).unwrap();

    let reader = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            for _ in 0..200 {
                tree.update_layout(1.0);
                let view = tree.structure().read();
                for raw in 1..view.node_count() as u32 {
                    let parent = view.parent(NodeId::new(raw)).unwrap();
                    assert!(parent.is_some());
                }
            }
        })
    };

    conductor.handle(id, NodeEvent::root(Status::Branch)).unwrap();
    for i in 1..2000u32 {
        conductor
            .handle(id, NodeEvent::child(NodeId::new((i - 1) / 3), (i - 1) % 3, Status::Branch))
            .unwrap();
    }
    conductor.finish(id).unwrap();
    reader.join().unwrap();

    tree.update_layout(1.0);
    assert_eq!(tree.node_count(), 2000);
    assert!(!tree.layout().is_dirty(NodeId::ROOT));
}

#[test]
fn stalled_execution_does_not_block_others() {
    let mut config = ProfilerConfig::default();
    config.builder.channel_capacity = 1;
    let conductor = Arc::new(Conductor::new(config));
    let a = conductor.start("stalled", 0, false).unwrap();
    let b = conductor.start("live", 0, false).unwrap();
    conductor.handle(a, NodeEvent::root(Status::Branch)).unwrap();

    // Holding A's layout stops its builder at the first child, so A's
    // channel fills and its sender blocks.
    let tree_a = conductor.tree(a).unwrap();
    let guard = tree_a.layout().lock();
    let stalled = {
        let conductor = Arc::clone(&conductor);
        thread::spawn(move || {
            for i in 0..5 {
                conductor
                    .handle(a, NodeEvent::child(NodeId::ROOT, i, Status::Failure))
                    .unwrap();
            }
        })
    };
    thread::sleep(Duration::from_millis(100));

    let (tx, rx) = mpsc::channel();
    let live = {
        let conductor = Arc::clone(&conductor);
        thread::spawn(move || {
            conductor.handle(b, NodeEvent::root(Status::Solution)).unwrap();
            let nodes = conductor.tree(b).map(|t| t.node_count());
            let _ = tx.send(nodes);
        })
    };
    assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());

    drop(guard);
    stalled.join().unwrap();
    live.join().unwrap();
    assert_eq!(conductor.finish(a).unwrap().nodes, 6);
    assert_eq!(conductor.finish(b).unwrap().nodes, 1);
}

#[test]
fn merge_two_executions_with_name_maps() {
    let conductor = Conductor::default();
    let a = conductor.start("run a", 0, false).unwrap();
    let b = conductor.start("run b", 0, false).unwrap();
    let root_and_child = |status| {
        vec![
            NodeEvent::root(Status::Branch),
            NodeEvent::child(NodeId::ROOT, 0, status),
            NodeEvent::Done,
        ]
    };
    feed(&conductor, a, &root_and_child(Status::Solution));
    feed(&conductor, b, &root_and_child(Status::Failure));
    conductor.finish(a).unwrap();
    conductor.finish(b).unwrap();

    let map_a: HashMap<(NodeId, u32), String> =
        HashMap::from([((NodeId::ROOT, 0), "x".to_string())]);
    let map_b: HashMap<(NodeId, u32), String> =
        HashMap::from([((NodeId::ROOT, 0), "y".to_string())]);
    conductor.set_name_map(a, Arc::new(map_a)).unwrap();
    conductor.set_name_map(b, Arc::new(map_b)).unwrap();
    assert!(conductor.get(a).unwrap().has_labels);

    let merged = conductor.merge(a, b).unwrap().wait().unwrap();
    let r = &merged.result;
    assert_eq!(r.classification(NodeId::ROOT), Some(Classification::IdenticalInBoth));
    assert_eq!(r.classification(NodeId::new(1)), Some(Classification::OnlyInA));
    assert_eq!(r.classification(NodeId::new(2)), Some(Classification::OnlyInB));
    assert_eq!(merged.tree.node_count(), 3);
}

#[test]
fn merge_of_identical_runs() {
    let conductor = Conductor::default();
    let a = conductor.start("a", 0, false).unwrap();
    let b = conductor.start("b", 0, false).unwrap();
    feed(&conductor, a, &binary_run());
    feed(&conductor, b, &binary_run());
    conductor.finish(a).unwrap();
    conductor.finish(b).unwrap();

    let merged = conductor.merge(a, b).unwrap().wait().unwrap();
    assert!(merged.result.is_identical());
    assert_eq!(merged.result.identical, 5);
}

#[test]
fn merge_errors_surface_through_the_facade() {
    let conductor = Conductor::default();
    let a = conductor.start("empty a", 0, false).unwrap();
    let b = conductor.start("empty b", 0, false).unwrap();
    conductor.finish(a).unwrap();
    conductor.finish(b).unwrap();

    let err: Error = conductor.merge(a, b).unwrap().wait().unwrap_err().into();
    assert!(matches!(err, Error::Merge(MergeError::EmptyTree)));
    assert!(matches!(conductor.merge(a, 99), Err(Error::UnknownExecution(99))));
}

#[test]
fn config_file_drives_the_registry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        serde_json::json!({
            "layout": { "min_separation": 2.5 },
            "builder": { "channel_capacity": 2 },
            "merge": { "thread_name": "merge-test" }
        })
        .to_string(),
    )
    .unwrap();

    let conductor = Conductor::from_config_path(&path).unwrap();
    assert_eq!(conductor.config().layout.min_separation, 2.5);
    assert_eq!(conductor.config().builder.channel_capacity, 2);

    let id = conductor.start("wide", 0, false).unwrap();
    feed(&conductor, id, &binary_run());
    conductor.finish(id).unwrap();
    conductor.update_layout(id).unwrap();
    let tree = conductor.tree(id).unwrap();
    let left = tree.layout().absolute_x(tree.structure(), NodeId::new(1)).unwrap();
    let right = tree.layout().absolute_x(tree.structure(), NodeId::new(2)).unwrap();
    assert!(right - left >= 3.5);
    assert!(matches!(conductor.update_layout(77), Err(Error::UnknownExecution(77))));

    // A missing file means defaults.
    let missing = Conductor::from_config_path(dir.path().join("absent.json")).unwrap();
    assert_eq!(missing.config().builder.channel_capacity, 4096);

    std::fs::write(&path, r#"{"layout": {"min_separation": -1.0}}"#).unwrap();
    assert!(matches!(
        Conductor::from_config_path(&path),
        Err(Error::Config(_))
    ));
}
