//! Monitoring panels as plain view models.
//!
//! Each monitor is rebuilt from [`SystemState`] on every refresh and holds
//! only what its panel shows.

use cosmic_protocol::{AgentStatus, TaskStatus};

use crate::state::{ConnectionView, SystemState};

const RECENT_ALLOCATIONS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct CollaborationRow {
    pub id: String,
    pub participants: Vec<String>,
    pub task_id: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRow {
    pub task_id: String,
    pub agents: Vec<String>,
    pub source: &'static str,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollaborationMonitor {
    pub active: Vec<CollaborationRow>,
    pub active_count: u64,
    pub total_count: u64,
    pub completed_count: u64,
    pub recent_allocations: Vec<AllocationRow>,
}

impl CollaborationMonitor {
    pub fn from_state(state: &SystemState) -> Self {
        let active = state
            .collaborations
            .values()
            .filter(|c| c.status != "completed")
            .map(|c| CollaborationRow {
                id: c.id.clone(),
                participants: c
                    .participants
                    .iter()
                    .map(|p| agent_label(state, p))
                    .collect(),
                task_id: c.task_id.clone(),
                status: c.status.clone(),
            })
            .collect();

        let recent_allocations = state
            .allocations
            .iter()
            .rev()
            .take(RECENT_ALLOCATIONS)
            .map(|r| AllocationRow {
                task_id: r.allocation.task_id.clone(),
                agents: r.allocation.allocated_agents.clone(),
                source: r.source,
                confidence: r.allocation.confidence,
            })
            .collect();

        Self {
            active,
            active_count: state.active_collaborations,
            total_count: state.total_collaborations,
            completed_count: state.completed_collaborations,
            recent_allocations,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub assigned: String,
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskManager {
    pub rows: Vec<TaskRow>,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskManager {
    pub fn from_state(state: &SystemState) -> Self {
        let mut manager = TaskManager::default();
        for task in state.tasks.values() {
            match task.status {
                TaskStatus::Pending => manager.pending += 1,
                TaskStatus::InProgress => manager.in_progress += 1,
                TaskStatus::Completed => manager.completed += 1,
                TaskStatus::Failed => manager.failed += 1,
                TaskStatus::Unknown => {}
            }
            manager.rows.push(TaskRow {
                id: task.id.clone(),
                title: if task.title.is_empty() {
                    task.description.clone()
                } else {
                    task.title.clone()
                },
                status: task.status,
                assigned: if task.assigned_agents.is_empty() {
                    "-".to_string()
                } else {
                    task.assigned_agents
                        .iter()
                        .map(|a| agent_label(state, a))
                        .collect::<Vec<_>>()
                        .join(", ")
                },
                progress: task.progress,
            });
        }
        // Running work first, finished work last.
        manager.rows.sort_by_key(|r| status_rank(r.status));
        manager
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemMonitor {
    pub connection: ConnectionView,
    pub agents_total: usize,
    pub agents_active: usize,
    pub agents_offline: usize,
    pub cpu_usage: Option<f64>,
    pub memory_usage: Option<f64>,
    pub messages_per_second: Option<f64>,
    pub tasks_completed: Option<u64>,
    pub uptime_secs: i64,
    pub tcf_energy: Option<f64>,
    pub tcf_coherence: Option<f64>,
    pub completed_chains: u64,
}

impl SystemMonitor {
    pub fn from_state(state: &SystemState) -> Self {
        let metrics = state.metrics.as_ref();
        Self {
            connection: state.connection,
            agents_total: state.agents.len(),
            agents_active: state.active_agent_count(),
            agents_offline: state
                .agents
                .values()
                .filter(|a| a.status == AgentStatus::Offline)
                .count(),
            cpu_usage: metrics.map(|m| m.cpu_usage),
            memory_usage: metrics.map(|m| m.memory_usage),
            messages_per_second: metrics.map(|m| m.messages_per_second),
            tasks_completed: metrics.map(|m| m.tasks_completed),
            uptime_secs: state.uptime().num_seconds().max(0),
            tcf_energy: state.tcf.as_ref().map(|t| t.energy),
            tcf_coherence: state.tcf.as_ref().map(|t| t.coherence),
            completed_chains: state.completed_chains,
        }
    }

    /// One-line summary for headless logging.
    pub fn summary(&self) -> String {
        format!(
            "{} | agents {}/{} active | chains {}",
            self.connection.label(),
            self.agents_active,
            self.agents_total,
            self.completed_chains
        )
    }
}

fn agent_label(state: &SystemState, id: &str) -> String {
    state
        .agents
        .get(id)
        .map(|a| a.display_name().to_string())
        .unwrap_or_else(|| id.to_string())
}

fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::InProgress => 0,
        TaskStatus::Pending => 1,
        TaskStatus::Failed => 2,
        TaskStatus::Unknown => 3,
        TaskStatus::Completed => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmic_protocol::{AgentInfo, Allocation, Collaboration, TaskInfo};

    fn agent(id: &str, name: &str, status: AgentStatus) -> AgentInfo {
        AgentInfo {
            id: id.into(),
            name: name.into(),
            role: None,
            status,
            capabilities: vec![],
            load: None,
        }
    }

    fn task(id: &str, status: TaskStatus, agents: &[&str]) -> TaskInfo {
        TaskInfo {
            id: id.into(),
            title: format!("task {id}"),
            description: String::new(),
            status,
            assigned_agents: agents.iter().map(|a| a.to_string()).collect(),
            progress: None,
            priority: None,
        }
    }

    #[test]
    fn task_manager_counts_and_orders() {
        let mut state = SystemState::default();
        state.upsert_agent(agent("a1", "Nova", AgentStatus::Active));
        state.upsert_task(task("t1", TaskStatus::Completed, &[]));
        state.upsert_task(task("t2", TaskStatus::InProgress, &["a1"]));
        state.upsert_task(task("t3", TaskStatus::Pending, &["ghost"]));

        let tm = TaskManager::from_state(&state);
        assert_eq!((tm.pending, tm.in_progress, tm.completed, tm.failed), (1, 1, 1, 0));
        assert_eq!(tm.rows[0].id, "t2");
        assert_eq!(tm.rows[0].assigned, "Nova");
        assert_eq!(tm.rows[1].assigned, "ghost");
        assert_eq!(tm.rows[2].id, "t1");
    }

    #[test]
    fn collaboration_monitor_hides_completed() {
        let mut state = SystemState::default();
        for (id, status) in [("c1", "active"), ("c2", "completed")] {
            state.upsert_collaboration(Collaboration {
                id: id.into(),
                participants: vec!["a1".into()],
                task_id: None,
                status: status.into(),
                started_at: None,
            });
        }
        state.record_allocation(
            Allocation {
                task_id: "t1".into(),
                allocated_agents: vec!["a1".into()],
                strategy: None,
                confidence: Some(0.9),
            },
            "prof-smoot",
        );

        let cm = CollaborationMonitor::from_state(&state);
        assert_eq!(cm.active.len(), 1);
        assert_eq!(cm.active[0].id, "c1");
        assert_eq!(cm.recent_allocations[0].source, "prof-smoot");
    }

    #[test]
    fn system_monitor_counts_agents() {
        let mut state = SystemState::default();
        state.connection = ConnectionView::Connected;
        state.upsert_agent(agent("a1", "A", AgentStatus::Active));
        state.upsert_agent(agent("a2", "B", AgentStatus::Busy));
        state.upsert_agent(agent("a3", "C", AgentStatus::Offline));

        let sm = SystemMonitor::from_state(&state);
        assert_eq!(sm.agents_total, 3);
        assert_eq!(sm.agents_active, 2);
        assert_eq!(sm.agents_offline, 1);
        assert_eq!(sm.cpu_usage, None);
        assert!(sm.summary().starts_with("Connected"));
    }
}
