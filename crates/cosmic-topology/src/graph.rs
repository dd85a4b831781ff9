use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use cosmic_protocol::{AgentDetails, TaskChain, Timestamp, TopologyUpdate};

use crate::TopologyError;

const SEQUENCE_STRENGTH: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeGroup {
    Agent,
    Task,
    #[default]
    Other,
}

impl NodeGroup {
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some(l) if l.eq_ignore_ascii_case("agent") => Self::Agent,
            Some(l) if l.eq_ignore_ascii_case("task") => Self::Task,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// Agent performed task.
    Execution,
    /// Task followed task in the execution path.
    Sequence,
    #[default]
    Other,
}

impl LinkKind {
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("execution") => Self::Execution,
            Some("sequence") => Self::Sequence,
            _ => Self::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub group: NodeGroup,
    pub heat_level: f64,
    #[serde(default)]
    pub details: Option<AgentDetails>,
    /// Position pinned by dragging; `None` lets the layout place the node.
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl GraphNode {
    pub fn new(id: &str, name: &str, group: NodeGroup) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            group,
            heat_level: 0.0,
            details: None,
            x: None,
            y: None,
        }
    }
}

/// Links refer to nodes by id. `resolved` caches the node indices used by
/// the layout and is only valid after [`Graph::resolve_links`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphLink {
    pub source_id: String,
    pub target_id: String,
    pub kind: LinkKind,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    pub strength: f64,
    #[serde(skip)]
    pub resolved: Option<(usize, usize)>,
}

impl GraphLink {
    pub fn new(source_id: &str, target_id: &str, kind: LinkKind) -> Self {
        Self {
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            kind,
            timestamp: None,
            strength: 1.0,
            resolved: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl Graph {
    /// Build the bipartite agent/task graph of a completed run.
    ///
    /// One node per unique agent, one per unique task, an execution link per
    /// step and a sequence link between each pair of consecutive steps.
    pub fn from_task_chain(chain: &TaskChain) -> Result<Self, TopologyError> {
        let path = &chain.execution_path;
        if path.is_empty() {
            return Err(TopologyError::MissingExecutionPath {
                chain_id: chain.id.clone(),
            });
        }

        let mut graph = Graph::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for step in path {
            let heat = step.heat_level.unwrap_or(0.0);

            let agent_name = step
                .agent_details
                .as_ref()
                .and_then(|d| d.name.as_deref())
                .unwrap_or(&step.agent_id);
            let agent = graph.upsert(&mut index, &step.agent_id, agent_name, NodeGroup::Agent);
            agent.heat_level = agent.heat_level.max(heat);
            if agent.details.is_none() {
                agent.details = step.agent_details.clone();
            }

            let task_name = step.task_name.as_deref().unwrap_or(&step.task_id);
            let task = graph.upsert(&mut index, &step.task_id, task_name, NodeGroup::Task);
            task.heat_level = task.heat_level.max(heat);

            let mut link = GraphLink::new(&step.agent_id, &step.task_id, LinkKind::Execution);
            link.timestamp = Some(step.timestamp.clone());
            link.strength = step.heat_level.unwrap_or(1.0);
            graph.links.push(link);
        }

        for pair in path.windows(2) {
            let mut link = GraphLink::new(&pair[0].task_id, &pair[1].task_id, LinkKind::Sequence);
            link.strength = SEQUENCE_STRENGTH;
            graph.links.push(link);
        }

        graph.resolve_links();
        Ok(graph)
    }

    pub fn from_update(update: &TopologyUpdate) -> Self {
        let nodes = update
            .nodes
            .iter()
            .map(|n| {
                let mut node = GraphNode::new(
                    &n.id,
                    n.name.as_deref().unwrap_or(&n.id),
                    NodeGroup::from_label(n.group.as_deref()),
                );
                node.heat_level = n.heat_level.unwrap_or(0.0);
                node
            })
            .collect();
        let links = update
            .links
            .iter()
            .map(|l| {
                let mut link =
                    GraphLink::new(&l.source, &l.target, LinkKind::from_label(l.kind.as_deref()));
                link.strength = l.strength.unwrap_or(1.0);
                link
            })
            .collect();

        let mut graph = Graph { nodes, links };
        graph.resolve_links();
        graph
    }

    fn upsert(
        &mut self,
        index: &mut HashMap<String, usize>,
        id: &str,
        name: &str,
        group: NodeGroup,
    ) -> &mut GraphNode {
        let i = *index.entry(id.to_string()).or_insert_with(|| {
            self.nodes.push(GraphNode::new(id, name, group));
            self.nodes.len() - 1
        });
        &mut self.nodes[i]
    }

    /// Recompute node indices for every link. Returns the number of links
    /// whose endpoints are missing; those stay unresolved and are skipped by
    /// the layout.
    pub fn resolve_links(&mut self) -> usize {
        let index: HashMap<&str, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();

        let mut dangling = 0;
        for link in &mut self.links {
            link.resolved = match (
                index.get(link.source_id.as_str()),
                index.get(link.target_id.as_str()),
            ) {
                (Some(&s), Some(&t)) => Some((s, t)),
                _ => {
                    dangling += 1;
                    None
                }
            };
        }
        if dangling > 0 {
            tracing::debug!(dangling, "links reference unknown nodes");
        }
        dangling
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn count_group(&self, group: NodeGroup) -> usize {
        self.nodes.iter().filter(|n| n.group == group).count()
    }

    pub fn count_kind(&self, kind: LinkKind) -> usize {
        self.links.iter().filter(|l| l.kind == kind).count()
    }

    /// True when the graph holds at least one agent and one task node, the
    /// shape only task-chain topologies have.
    pub fn has_agents_and_tasks(&self) -> bool {
        self.nodes.iter().any(|n| n.group == NodeGroup::Agent)
            && self.nodes.iter().any(|n| n.group == NodeGroup::Task)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_protocol::{ExecutionStep, TopologyLink, TopologyNode};

    fn step(agent: &str, task: &str) -> ExecutionStep {
        ExecutionStep {
            agent_id: agent.into(),
            task_id: task.into(),
            task_name: None,
            timestamp: Timestamp::Millis(1),
            heat_level: Some(0.7),
            agent_details: None,
        }
    }

    #[test]
    fn chain_graph_counts() {
        let chain = TaskChain {
            id: "c1".into(),
            name: None,
            description: None,
            status: None,
            execution_path: vec![step("a1", "t1"), step("a2", "t2"), step("a1", "t3")],
        };
        let g = Graph::from_task_chain(&chain).unwrap();
        assert_eq!(g.count_group(NodeGroup::Agent), 2);
        assert_eq!(g.count_group(NodeGroup::Task), 3);
        assert_eq!(g.count_kind(LinkKind::Execution), 3);
        assert_eq!(g.count_kind(LinkKind::Sequence), 2);
        assert!(g.links.iter().all(|l| l.resolved.is_some()));
        assert_eq!(g.links[3].source_id, "t1");
        assert_eq!(g.links[3].target_id, "t2");
    }

    #[test]
    fn repeated_task_still_gets_a_sequence_link() {
        let chain = TaskChain {
            id: "c2".into(),
            name: None,
            description: None,
            status: None,
            execution_path: vec![step("a1", "t1"), step("a2", "t1")],
        };
        let g = Graph::from_task_chain(&chain).unwrap();
        assert_eq!(g.nodes.len(), 3);
        assert_eq!(g.links.len(), 3);
    }

    #[test]
    fn empty_path_is_rejected() {
        let chain = TaskChain {
            id: "empty".into(),
            name: None,
            description: None,
            status: None,
            execution_path: vec![],
        };
        assert_eq!(
            Graph::from_task_chain(&chain),
            Err(TopologyError::MissingExecutionPath {
                chain_id: "empty".into()
            })
        );
    }

    #[test]
    fn dangling_links_stay_unresolved() {
        let update = TopologyUpdate {
            nodes: vec![TopologyNode {
                id: "n1".into(),
                name: None,
                group: Some("agent".into()),
                heat_level: None,
            }],
            links: vec![TopologyLink {
                source: "n1".into(),
                target: "ghost".into(),
                kind: None,
                strength: None,
            }],
        };
        let mut g = Graph::from_update(&update);
        assert_eq!(g.resolve_links(), 1);
        assert_eq!(g.links[0].resolved, None);
        assert_eq!(g.nodes[0].name, "n1");
    }
}
