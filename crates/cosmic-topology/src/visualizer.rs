//! Live network graph plus the saved task-chain topology cache.
//!
//! Snapshots are cloned on save and again on display, so dragging nodes
//! around on screen never reaches back into the cache. While a snapshot is
//! on screen, live topology updates are dropped rather than queued.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use cosmic_protocol::{TaskChain, TopologyUpdate};

use crate::graph::{Graph, GraphLink, GraphNode};
use crate::TopologyError;

/// What the dropdown shows for a saved run.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSummary {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub step_count: usize,
}

impl ChainSummary {
    fn of(chain: &TaskChain) -> Self {
        Self {
            id: chain.id.clone(),
            name: chain.name.clone().unwrap_or_else(|| chain.id.clone()),
            description: chain.description.clone(),
            status: chain.status.clone(),
            step_count: chain.execution_path.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SavedTopology {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    pub timestamp: DateTime<Utc>,
    pub task_info: ChainSummary,
    sequence: u64,
}

#[derive(Debug, Default)]
pub struct NetworkVisualizer {
    graph: Graph,
    saved: HashMap<String, SavedTopology>,
    selection: Option<String>,
    saves: u64,
    render_count: u64,
}

impl NetworkVisualizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph currently on screen.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Saved topology id selected in the dropdown, if any.
    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    /// Build the topology of a completed task chain, show it and save a copy
    /// under the chain id. An existing snapshot with the same id is replaced.
    pub fn update_with_task_chain(&mut self, chain: &TaskChain) -> Result<(), TopologyError> {
        let graph = Graph::from_task_chain(chain)?;

        self.saves += 1;
        self.saved.insert(
            chain.id.clone(),
            SavedTopology {
                nodes: graph.nodes.clone(),
                links: graph.links.clone(),
                timestamp: Utc::now(),
                task_info: ChainSummary::of(chain),
                sequence: self.saves,
            },
        );
        tracing::info!(
            chain_id = %chain.id,
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            "saved task chain topology"
        );

        self.graph = graph;
        self.selection = Some(chain.id.clone());
        self.render();
        Ok(())
    }

    /// Put a saved topology back on screen. Returns false for an unknown id.
    pub fn display_saved_topology(&mut self, id: &str) -> bool {
        let Some(saved) = self.saved.get(id) else {
            tracing::debug!(id, "no saved topology");
            return false;
        };
        let mut graph = Graph {
            nodes: saved.nodes.clone(),
            links: saved.links.clone(),
        };
        graph.resolve_links();
        self.graph = graph;
        self.selection = Some(id.to_string());
        self.render();
        true
    }

    /// Whether a historical snapshot is on screen: either the dropdown
    /// selection names a saved id, or the live graph has the agent+task
    /// shape that only task-chain topologies have.
    pub fn has_saved_topology_displayed(&self) -> bool {
        if let Some(id) = &self.selection {
            if self.saved.contains_key(id) {
                return true;
            }
        }
        self.graph.has_agents_and_tasks()
    }

    pub fn get_saved_topologies(&self) -> &HashMap<String, SavedTopology> {
        &self.saved
    }

    /// Saved ids in dropdown order, newest first.
    pub fn saved_topology_ids(&self) -> Vec<String> {
        let mut entries: Vec<&SavedTopology> = self.saved.values().collect();
        entries.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.sequence.cmp(&a.sequence))
        });
        entries.into_iter().map(|s| s.task_info.id.clone()).collect()
    }

    pub fn clear_saved_topologies(&mut self) {
        let count = self.saved.len();
        self.saved.clear();
        self.selection = None;
        tracing::info!(count, "cleared saved topologies");
    }

    /// Leave any snapshot and wait for the next live update.
    pub fn show_live(&mut self) {
        self.selection = None;
        self.graph = Graph::default();
        self.render();
    }

    /// Replace the live graph with a topology update from the backend.
    /// Dropped (returns false) while a saved topology is displayed.
    pub fn apply_live_update(&mut self, update: &TopologyUpdate) -> bool {
        if self.has_saved_topology_displayed() {
            tracing::debug!(
                nodes = update.nodes.len(),
                "saved topology on screen; dropping live update"
            );
            return false;
        }
        self.graph = Graph::from_update(update);
        self.render();
        true
    }

    /// Pin a node of the live graph at `(x, y)`.
    pub fn drag_node(&mut self, id: &str, x: f64, y: f64) -> bool {
        match self.graph.node_mut(id) {
            Some(node) => {
                node.x = Some(x);
                node.y = Some(y);
                true
            }
            None => false,
        }
    }

    /// Re-resolve the live graph's link endpoints. Returns the number of
    /// dangling links.
    pub fn resolve_links(&mut self) -> usize {
        self.graph.resolve_links()
    }

    fn render(&mut self) {
        self.render_count += 1;
        tracing::trace!(
            nodes = self.graph.nodes.len(),
            links = self.graph.links.len(),
            render = self.render_count,
            "network view updated"
        );
    }
}
