//! In-memory system state folded from inbound events.

use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::{DateTime, Utc};

use cosmic_protocol::{
    AgentInfo, AgentStatus, AiSystemStatus, Allocation, Collaboration, CollaborationCompleted,
    ExecutionStep, SystemMetrics, TaskInfo, TcfUpdate,
};

pub const DEFAULT_LOG_CAPACITY: usize = 500;
pub const DEFAULT_MAX_NOTIFICATIONS: usize = 20;
const MAX_ALLOCATIONS: usize = 50;
/// Chains with steps but no completion event yet.
const MAX_PENDING_CHAINS: usize = 32;
const MAX_STEPS_PER_CHAIN: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionView {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Demo,
    /// Reconnect budget exhausted.
    Failed,
}

impl ConnectionView {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
            Self::Demo => "Demo mode",
            Self::Failed => "Offline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogCategory {
    Connection,
    Agent,
    Task,
    Collaboration,
    Topology,
    System,
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub category: LogCategory,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// Expires on its own.
    Toast,
    /// Stays until dismissed.
    Banner,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub level: NotificationLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationRecord {
    pub allocation: Allocation,
    /// `prof-smoot` or `fallback`.
    pub source: &'static str,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct SystemState {
    pub connection: ConnectionView,
    pub agents: BTreeMap<String, AgentInfo>,
    pub tasks: BTreeMap<String, TaskInfo>,
    pub collaborations: BTreeMap<String, Collaboration>,
    pub active_collaborations: u64,
    pub total_collaborations: u64,
    pub completed_collaborations: u64,
    pub metrics: Option<SystemMetrics>,
    pub tcf: Option<TcfUpdate>,
    pub allocations: Vec<AllocationRecord>,
    /// Steps seen so far for task chains still running, by chain id.
    pub chain_steps: HashMap<String, Vec<ExecutionStep>>,
    pub completed_chains: u64,
    pub last_status_at: Option<DateTime<Utc>>,
    pub last_pong_at: Option<DateTime<Utc>>,
    pub notifications: Vec<Notification>,
    pub event_log: Vec<LogEntry>,
    pub start_time: DateTime<Utc>,
    log_capacity: usize,
    max_notifications: usize,
    next_notification_id: u64,
    /// Pending chain ids, oldest first.
    chain_order: VecDeque<String>,
}

impl Default for SystemState {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY, DEFAULT_MAX_NOTIFICATIONS)
    }
}

impl SystemState {
    pub fn new(log_capacity: usize, max_notifications: usize) -> Self {
        Self {
            connection: ConnectionView::default(),
            agents: BTreeMap::new(),
            tasks: BTreeMap::new(),
            collaborations: BTreeMap::new(),
            active_collaborations: 0,
            total_collaborations: 0,
            completed_collaborations: 0,
            metrics: None,
            tcf: None,
            allocations: Vec::new(),
            chain_steps: HashMap::new(),
            completed_chains: 0,
            last_status_at: None,
            last_pong_at: None,
            notifications: Vec::new(),
            event_log: Vec::new(),
            start_time: Utc::now(),
            log_capacity: log_capacity.max(1),
            max_notifications: max_notifications.max(1),
            next_notification_id: 0,
            chain_order: VecDeque::new(),
        }
    }

    pub fn push_log(&mut self, category: LogCategory, message: String) {
        if self.event_log.len() >= self.log_capacity {
            self.event_log.remove(0);
        }
        self.event_log.push(LogEntry {
            timestamp: Utc::now(),
            category,
            message,
        });
    }

    // ── Notifications ───────────────────────────────────────────────────

    pub fn toast(&mut self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        self.notify(NotificationKind::Toast, level, message.into())
    }

    /// Raise a banner. An identical banner already showing is reused.
    pub fn banner(&mut self, level: NotificationLevel, message: impl Into<String>) -> u64 {
        let message = message.into();
        if let Some(existing) = self
            .notifications
            .iter()
            .find(|n| n.kind == NotificationKind::Banner && n.message == message)
        {
            return existing.id;
        }
        self.notify(NotificationKind::Banner, level, message)
    }

    fn notify(&mut self, kind: NotificationKind, level: NotificationLevel, message: String) -> u64 {
        self.next_notification_id += 1;
        let id = self.next_notification_id;
        self.notifications.push(Notification {
            id,
            kind,
            level,
            message,
            created_at: Utc::now(),
        });
        while self.notifications.len() > self.max_notifications {
            // Evict the oldest toast first; banners only when nothing else is left.
            let victim = self
                .notifications
                .iter()
                .position(|n| n.kind == NotificationKind::Toast)
                .unwrap_or(0);
            self.notifications.remove(victim);
        }
        id
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.id != id);
        self.notifications.len() != before
    }

    pub fn dismiss_banners(&mut self) -> usize {
        let before = self.notifications.len();
        self.notifications.retain(|n| n.kind != NotificationKind::Banner);
        before - self.notifications.len()
    }

    /// Drop toasts older than `ttl` as of `now`.
    pub fn expire_toasts(&mut self, now: DateTime<Utc>, ttl: std::time::Duration) -> usize {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let before = self.notifications.len();
        self.notifications
            .retain(|n| n.kind == NotificationKind::Banner || now - n.created_at < ttl);
        before - self.notifications.len()
    }

    pub fn banners(&self) -> impl Iterator<Item = &Notification> {
        self.notifications
            .iter()
            .filter(|n| n.kind == NotificationKind::Banner)
    }

    // ── Event folding ───────────────────────────────────────────────────

    pub fn apply_status(&mut self, status: AiSystemStatus) {
        for agent in status.ai_agents {
            self.agents.insert(agent.id.clone(), agent);
        }
        self.active_collaborations = status.active_collaborations;
        self.total_collaborations = status.total_collaborations;
        if status.metrics.is_some() {
            self.metrics = status.metrics;
        }
        self.last_status_at = Some(Utc::now());
    }

    pub fn upsert_agent(&mut self, agent: AgentInfo) -> bool {
        let is_new = !self.agents.contains_key(&agent.id);
        self.agents.insert(agent.id.clone(), agent);
        is_new
    }

    pub fn upsert_task(&mut self, task: TaskInfo) -> bool {
        let is_new = !self.tasks.contains_key(&task.id);
        self.tasks.insert(task.id.clone(), task);
        is_new
    }

    pub fn upsert_collaboration(&mut self, collaboration: Collaboration) {
        self.collaborations
            .insert(collaboration.id.clone(), collaboration);
        self.active_collaborations = self.active_collaborations.max(
            self.collaborations
                .values()
                .filter(|c| c.status != "completed")
                .count() as u64,
        );
    }

    pub fn complete_collaboration(&mut self, done: &CollaborationCompleted) {
        if let Some(c) = self.collaborations.get_mut(&done.collaboration_id) {
            c.status = "completed".to_string();
        }
        self.completed_collaborations += 1;
        self.active_collaborations = self.active_collaborations.saturating_sub(1);
    }

    pub fn record_allocation(&mut self, allocation: Allocation, source: &'static str) {
        if let Some(task) = self.tasks.get_mut(&allocation.task_id) {
            task.assigned_agents = allocation.allocated_agents.clone();
        }
        if self.allocations.len() >= MAX_ALLOCATIONS {
            self.allocations.remove(0);
        }
        self.allocations.push(AllocationRecord {
            allocation,
            source,
            received_at: Utc::now(),
        });
    }

    /// Accumulate a step for a running chain. The oldest pending chain is
    /// evicted once too many are open; steps past the per-chain cap are
    /// ignored. Returns the chain's step count.
    pub fn record_step(&mut self, chain_id: &str, step: ExecutionStep) -> usize {
        if !self.chain_steps.contains_key(chain_id) {
            while self.chain_order.len() >= MAX_PENDING_CHAINS {
                if let Some(oldest) = self.chain_order.pop_front() {
                    self.chain_steps.remove(&oldest);
                    tracing::debug!(chain_id = %oldest, "evicting incomplete task chain");
                }
            }
            self.chain_order.push_back(chain_id.to_string());
        }
        let steps = self.chain_steps.entry(chain_id.to_string()).or_default();
        if steps.len() < MAX_STEPS_PER_CHAIN {
            steps.push(step);
        }
        steps.len()
    }

    /// Remove and return the steps accumulated for `chain_id`.
    pub fn take_chain_steps(&mut self, chain_id: &str) -> Vec<ExecutionStep> {
        self.chain_order.retain(|id| id != chain_id);
        self.chain_steps.remove(chain_id).unwrap_or_default()
    }

    pub fn active_agent_count(&self) -> usize {
        self.agents
            .values()
            .filter(|a| matches!(a.status, AgentStatus::Active | AgentStatus::Busy))
            .count()
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn notifications_are_capped_toasts_first() {
        let mut state = SystemState::new(10, 3);
        let banner = state.banner(NotificationLevel::Error, "offline");
        state.toast(NotificationLevel::Info, "one");
        state.toast(NotificationLevel::Info, "two");
        state.toast(NotificationLevel::Info, "three");
        assert_eq!(state.notifications.len(), 3);
        assert!(state.notifications.iter().any(|n| n.id == banner));
        assert!(!state.notifications.iter().any(|n| n.message == "one"));
    }

    #[test]
    fn duplicate_banner_is_reused_and_dismissible() {
        let mut state = SystemState::default();
        let a = state.banner(NotificationLevel::Error, "offline");
        let b = state.banner(NotificationLevel::Error, "offline");
        assert_eq!(a, b);
        assert_eq!(state.banners().count(), 1);
        assert!(state.dismiss(a));
        assert!(!state.dismiss(a));
    }

    #[test]
    fn toasts_expire_banners_stay() {
        let mut state = SystemState::default();
        state.toast(NotificationLevel::Success, "saved");
        state.banner(NotificationLevel::Warning, "demo");
        let later = Utc::now() + chrono::Duration::seconds(10);
        assert_eq!(state.expire_toasts(later, Duration::from_secs(5)), 1);
        assert_eq!(state.notifications.len(), 1);
    }

    #[test]
    fn pending_chains_are_bounded() {
        let step = || ExecutionStep {
            agent_id: "a1".into(),
            task_id: "t1".into(),
            task_name: None,
            timestamp: cosmic_protocol::Timestamp::Millis(0),
            heat_level: None,
            agent_details: None,
        };
        let mut state = SystemState::default();
        for i in 0..MAX_PENDING_CHAINS + 3 {
            state.record_step(&format!("chain-{i}"), step());
        }
        assert_eq!(state.chain_steps.len(), MAX_PENDING_CHAINS);
        assert!(!state.chain_steps.contains_key("chain-0"));
        assert!(!state.chain_steps.contains_key("chain-2"));
        assert!(state.chain_steps.contains_key("chain-3"));

        assert_eq!(state.take_chain_steps("chain-3").len(), 1);
        state.record_step("fresh", step());
        assert_eq!(state.chain_steps.len(), MAX_PENDING_CHAINS);
        assert!(state.chain_steps.contains_key("chain-4"));

        for _ in 0..MAX_STEPS_PER_CHAIN + 5 {
            state.record_step("fresh", step());
        }
        assert_eq!(state.chain_steps["fresh"].len(), MAX_STEPS_PER_CHAIN);
    }

    #[test]
    fn log_is_bounded() {
        let mut state = SystemState::new(2, 5);
        for i in 0..5 {
            state.push_log(LogCategory::System, format!("entry {i}"));
        }
        assert_eq!(state.event_log.len(), 2);
        assert_eq!(state.event_log[0].message, "entry 3");
    }
}
