use cosmic_protocol::*;
use cosmic_topology::*;

fn step(agent: &str, task: &str) -> ExecutionStep {
    ExecutionStep {
        agent_id: agent.into(),
        task_id: task.into(),
        task_name: Some(format!("{task} name")),
        timestamp: Timestamp::Millis(1_700_000_000_000),
        heat_level: Some(0.4),
        agent_details: None,
    }
}

fn chain(id: &str, path: Vec<ExecutionStep>) -> TaskChain {
    TaskChain {
        id: id.into(),
        name: Some(format!("chain {id}")),
        description: None,
        status: Some("completed".into()),
        execution_path: path,
    }
}

fn node(id: &str, group: Option<&str>) -> TopologyNode {
    TopologyNode {
        id: id.into(),
        name: None,
        group: group.map(str::to_string),
        heat_level: None,
    }
}

fn live_update(nodes: Vec<TopologyNode>) -> TopologyUpdate {
    TopologyUpdate {
        nodes,
        links: vec![],
    }
}

#[test]
fn test_saved_topology_round_trip_counts() {
    let mut viz = NetworkVisualizer::new();
    let path = vec![step("a1", "t1"), step("a2", "t2"), step("a1", "t3"), step("a3", "t2")];
    viz.update_with_task_chain(&chain("c1", path)).unwrap();

    viz.show_live();
    assert!(viz.graph().is_empty());

    assert!(viz.display_saved_topology("c1"));
    // 3 agents + 3 tasks; 4 execution + 3 sequence links.
    assert_eq!(viz.graph().nodes.len(), 6);
    assert_eq!(viz.graph().links.len(), 7);
    assert_eq!(viz.selection(), Some("c1"));
}

#[test]
fn test_displayed_topology_does_not_alias_snapshot() {
    let mut viz = NetworkVisualizer::new();
    viz.update_with_task_chain(&chain("c1", vec![step("a1", "t1"), step("a2", "t2")]))
        .unwrap();
    assert!(viz.display_saved_topology("c1"));

    assert!(viz.drag_node("a1", 120.0, -40.0));
    assert_eq!(viz.graph().node("a1").unwrap().x, Some(120.0));

    let saved = &viz.get_saved_topologies()["c1"];
    let stored = saved.nodes.iter().find(|n| n.id == "a1").unwrap();
    assert_eq!(stored.x, None);
    assert_eq!(stored.y, None);
}

#[test]
fn test_unknown_saved_topology_is_rejected() {
    let mut viz = NetworkVisualizer::new();
    let renders = viz.render_count();
    assert!(!viz.display_saved_topology("nope"));
    assert_eq!(viz.render_count(), renders);
}

#[test]
fn test_missing_execution_path_leaves_state_untouched() {
    let mut viz = NetworkVisualizer::new();
    let err = viz.update_with_task_chain(&chain("c0", vec![])).unwrap_err();
    assert!(matches!(err, TopologyError::MissingExecutionPath { .. }));
    assert!(viz.get_saved_topologies().is_empty());
    assert_eq!(viz.render_count(), 0);
}

#[test]
fn test_saved_heuristic_follows_graph_shape() {
    let mut viz = NetworkVisualizer::new();
    assert!(!viz.has_saved_topology_displayed());

    assert!(viz.apply_live_update(&live_update(vec![node("a", Some("agent")), node("b", Some("agent"))])));
    assert!(!viz.has_saved_topology_displayed());

    assert!(viz.apply_live_update(&live_update(vec![node("a", Some("agent")), node("t", Some("task"))])));
    assert_eq!(viz.selection(), None);
    assert!(viz.has_saved_topology_displayed());
}

#[test]
fn test_live_updates_dropped_while_snapshot_displayed() {
    let mut viz = NetworkVisualizer::new();
    viz.update_with_task_chain(&chain("c1", vec![step("a1", "t1")])).unwrap();
    let before = viz.graph().clone();

    assert!(!viz.apply_live_update(&live_update(vec![node("x", None)])));
    assert_eq!(viz.graph(), &before);

    viz.show_live();
    assert!(viz.apply_live_update(&live_update(vec![node("x", None)])));
    assert_eq!(viz.graph().nodes.len(), 1);
}

#[test]
fn test_saved_ids_newest_first_and_clear() {
    let mut viz = NetworkVisualizer::new();
    viz.update_with_task_chain(&chain("first", vec![step("a1", "t1")])).unwrap();
    viz.update_with_task_chain(&chain("second", vec![step("a2", "t2")])).unwrap();
    viz.update_with_task_chain(&chain("third", vec![step("a3", "t3")])).unwrap();

    assert_eq!(viz.saved_topology_ids(), vec!["third", "second", "first"]);
    assert_eq!(viz.get_saved_topologies()["second"].task_info.name, "chain second");

    viz.clear_saved_topologies();
    assert!(viz.saved_topology_ids().is_empty());
    assert_eq!(viz.selection(), None);
    assert!(!viz.display_saved_topology("first"));
}

#[test]
fn test_resolve_links_after_restore() {
    let mut viz = NetworkVisualizer::new();
    viz.update_with_task_chain(&chain("c1", vec![step("a1", "t1"), step("a1", "t2")]))
        .unwrap();
    assert!(viz.display_saved_topology("c1"));
    assert_eq!(viz.resolve_links(), 0);
    for link in &viz.graph().links {
        let (s, t) = link.resolved.unwrap();
        assert_eq!(viz.graph().nodes[s].id, link.source_id);
        assert_eq!(viz.graph().nodes[t].id, link.target_id);
    }
}
