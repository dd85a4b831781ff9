//! Dashboard orchestrator.
//!
//! [`CosmicAgentApp`] wires the socket client to [`SystemState`] and the
//! [`NetworkVisualizer`]: every relayed socket event is validated into an
//! [`InboundEvent`] and folded in here. There is no global instance; the
//! console and the binary hold a cloned handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use cosmic_client::{HandlerId, StatusFallback, Transport, WebSocketClient};
use cosmic_protocol::{
    names, CreateAiAgentParams, CreateTaskParams, InboundEvent, OutboundEvent, SubmitAiTaskParams,
    TaskChain, TaskInfo, TaskStatus, DEMO_MODE_REASON,
};
use cosmic_topology::NetworkVisualizer;

use crate::config::DashboardConfig;
use crate::state::{ConnectionView, LogCategory, NotificationLevel, SystemState};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Which socket events already have a dashboard handler attached, so
/// repeated initialisation never stacks duplicate handlers.
#[derive(Debug, Default)]
pub struct ListenerRegistration {
    attached: HashMap<&'static str, HandlerId>,
}

impl ListenerRegistration {
    pub fn is_attached(&self, event: &str) -> bool {
        self.attached.contains_key(event)
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Run `attach` unless `event` already has a handler. Returns true if a
    /// handler was attached.
    pub fn attach_once(&mut self, event: &'static str, attach: impl FnOnce() -> HandlerId) -> bool {
        if self.attached.contains_key(event) {
            return false;
        }
        self.attached.insert(event, attach());
        true
    }

    pub fn detach_all(&mut self, client: &WebSocketClient) -> usize {
        let mut removed = 0;
        for (event, id) in self.attached.drain() {
            if client.off(event, id) {
                removed += 1;
            }
        }
        removed
    }
}

/// At most one AI task submission in flight.
#[derive(Debug, Default)]
pub struct SubmissionGuard {
    in_flight: Mutex<Option<String>>,
}

impl SubmissionGuard {
    pub fn try_begin(&self, task_id: &str) -> bool {
        let mut slot = lock(&self.in_flight);
        if slot.is_some() {
            return false;
        }
        *slot = Some(task_id.to_string());
        true
    }

    pub fn finish(&self) -> Option<String> {
        lock(&self.in_flight).take()
    }

    pub fn is_submitting(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    pub fn current(&self) -> Option<String> {
        lock(&self.in_flight).clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Sent { task_id: String },
    /// Another submission is still in flight.
    Busy,
    Empty,
    /// The socket was not connected; nothing was sent.
    NotDelivered { task_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Connected: this many refresh requests went out on the socket.
    Requested(usize),
    /// Disconnected: status refreshed over HTTP.
    Fallback,
    Failed,
    Skipped,
}

struct AppInner {
    config: DashboardConfig,
    client: WebSocketClient,
    state: Arc<Mutex<SystemState>>,
    visualizer: Mutex<NetworkVisualizer>,
    listeners: Mutex<ListenerRegistration>,
    submission: SubmissionGuard,
    fallback: Option<StatusFallback>,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for AppInner {
    fn drop(&mut self) {
        let poller = self.poller.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(task) = poller.take() {
            task.abort();
        }
    }
}

#[derive(Clone)]
pub struct CosmicAgentApp {
    inner: Arc<AppInner>,
}

impl CosmicAgentApp {
    pub fn new(config: DashboardConfig, transport: impl Transport) -> anyhow::Result<Self> {
        let client = WebSocketClient::with_options(
            config.backend.clone(),
            config.client.options(),
            transport,
        );
        let fallback = if config.dashboard.http_fallback {
            Some(StatusFallback::new(
                &config.backend.backend_url(),
                config.client.http_timeout(),
            )?)
        } else {
            None
        };
        let state = SystemState::new(
            config.dashboard.log_capacity,
            config.dashboard.max_notifications,
        );

        Ok(Self {
            inner: Arc::new(AppInner {
                config,
                client,
                state: Arc::new(Mutex::new(state)),
                visualizer: Mutex::new(NetworkVisualizer::new()),
                listeners: Mutex::new(ListenerRegistration::default()),
                submission: SubmissionGuard::default(),
                fallback,
                poller: Mutex::new(None),
            }),
        })
    }

    fn upgrade(weak: &Weak<AppInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &WebSocketClient {
        &self.inner.client
    }

    /// Lock the system state. Do not hold the guard across `.await`.
    pub fn state(&self) -> MutexGuard<'_, SystemState> {
        lock(&self.inner.state)
    }

    pub fn shared_state(&self) -> Arc<Mutex<SystemState>> {
        Arc::clone(&self.inner.state)
    }

    pub fn visualizer(&self) -> MutexGuard<'_, NetworkVisualizer> {
        lock(&self.inner.visualizer)
    }

    pub fn is_submitting(&self) -> bool {
        self.inner.submission.is_submitting()
    }

    pub fn listeners_attached(&self) -> usize {
        lock(&self.inner.listeners).attached_count()
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Attach socket handlers (once), connect and start polling. Connection
    /// failures are logged; the client keeps retrying on its own.
    pub async fn initialize(&self) {
        let added = self.register_listeners();
        tracing::debug!(added, "socket listeners registered");

        if let Err(e) = self.inner.client.connect().await {
            tracing::warn!(error = %e, "initial connection failed; retrying in background");
            self.state().push_log(
                LogCategory::Connection,
                format!("Initial connection failed: {e}"),
            );
        }
        self.start_polling();
    }

    fn register_listeners(&self) -> usize {
        let mut listeners = lock(&self.inner.listeners);
        let mut added = 0;
        for &event in names::INBOUND {
            let attached = listeners.attach_once(event, || {
                let weak = Arc::downgrade(&self.inner);
                self.inner.client.on(event, move |payload: &Value| {
                    if let Some(app) = CosmicAgentApp::upgrade(&weak) {
                        app.handle_raw(event, payload);
                    }
                    Ok(())
                })
            });
            if attached {
                added += 1;
            }
        }
        added
    }

    /// Start the periodic refresh. No-op if already running.
    pub fn start_polling(&self) {
        let mut poller = lock(&self.inner.poller);
        if poller.is_some() {
            return;
        }
        let period = self.inner.config.poll_interval();
        let toast_ttl = self.inner.config.toast_ttl();
        let weak = Arc::downgrade(&self.inner);

        *poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(app) = CosmicAgentApp::upgrade(&weak) else {
                    break;
                };
                let outcome = app.poll_once().await;
                tracing::trace!(?outcome, "poll");
                app.state().expire_toasts(Utc::now(), toast_ttl);
            }
        }));
        tracing::debug!(period_ms = period.as_millis() as u64, "polling started");
    }

    /// Stop polling, detach handlers and close the connection.
    pub fn shutdown(&self) {
        if let Some(task) = lock(&self.inner.poller).take() {
            task.abort();
        }
        let detached = lock(&self.inner.listeners).detach_all(&self.inner.client);
        self.inner.client.disconnect();
        tracing::info!(detached, "dashboard shut down");
    }

    // ── Polling ─────────────────────────────────────────────────────────

    /// One refresh: ask over the socket when connected, otherwise fetch the
    /// status over HTTP (never in demo mode).
    pub async fn poll_once(&self) -> PollOutcome {
        let client = &self.inner.client;
        if client.connected() {
            return PollOutcome::Requested(self.request_updates());
        }
        if client.is_demo_mode() {
            return PollOutcome::Skipped;
        }
        let Some(fallback) = self.inner.fallback.as_ref() else {
            return PollOutcome::Skipped;
        };

        match fallback.fetch_status().await {
            Ok(status) => {
                let mut state = self.state();
                state.apply_status(status);
                state.push_log(LogCategory::System, "Status refreshed over HTTP".to_string());
                PollOutcome::Fallback
            }
            Err(e) => {
                tracing::debug!(error = %e, url = %fallback.status_url(), "HTTP status fallback failed");
                PollOutcome::Failed
            }
        }
    }

    fn request_updates(&self) -> usize {
        [
            OutboundEvent::GetAiStatus,
            OutboundEvent::GetSystemStatus,
            OutboundEvent::GetTopologyData,
        ]
        .into_iter()
        .filter(|event| self.inner.client.send_event(event.clone()))
        .count()
    }

    // ── User actions ────────────────────────────────────────────────────

    pub fn submit_task(&self, description: &str) -> SubmitOutcome {
        let description = description.trim();
        if description.is_empty() {
            return SubmitOutcome::Empty;
        }

        let task_id = format!("task-{}", uuid::Uuid::new_v4());
        if !self.inner.submission.try_begin(&task_id) {
            self.state().toast(
                NotificationLevel::Warning,
                "A task is already being submitted",
            );
            return SubmitOutcome::Busy;
        }

        let sent = self
            .inner
            .client
            .send_event(OutboundEvent::SubmitAiTask(SubmitAiTaskParams {
                task_id: task_id.clone(),
                description: description.to_string(),
                required_capabilities: Vec::new(),
            }));

        let mut state = self.state();
        if sent {
            tracing::info!(task_id = %task_id, "AI task submitted");
            state.upsert_task(TaskInfo {
                id: task_id.clone(),
                title: description.to_string(),
                description: description.to_string(),
                status: TaskStatus::Pending,
                assigned_agents: Vec::new(),
                progress: None,
                priority: None,
            });
            state.push_log(LogCategory::Task, format!("Submitted task {task_id}"));
            SubmitOutcome::Sent { task_id }
        } else {
            self.inner.submission.finish();
            state.toast(
                NotificationLevel::Error,
                "Not connected to the backend; task was not sent",
            );
            SubmitOutcome::NotDelivered { task_id }
        }
    }

    pub fn create_agent(&self, name: &str, capabilities: Vec<String>) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let sent = self
            .inner
            .client
            .send_event(OutboundEvent::CreateAiAgent(CreateAiAgentParams {
                name: name.to_string(),
                role: None,
                capabilities,
            }));
        let mut state = self.state();
        if sent {
            state.push_log(LogCategory::Agent, format!("Requested new agent {name}"));
        } else {
            state.toast(NotificationLevel::Error, "Not connected; agent was not created");
        }
        sent
    }

    /// Returns the new task id if the request went out.
    pub fn create_task(
        &self,
        title: &str,
        description: &str,
        priority: Option<String>,
    ) -> Option<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let sent = self
            .inner
            .client
            .send_event(OutboundEvent::CreateTask(CreateTaskParams {
                id: id.clone(),
                title: title.to_string(),
                description: description.to_string(),
                priority,
            }));
        if !sent {
            self.state()
                .toast(NotificationLevel::Error, "Not connected; task was not created");
            return None;
        }
        self.state()
            .push_log(LogCategory::Task, format!("Created task {id}: {title}"));
        Some(id)
    }

    pub fn dismiss_notification(&self, id: u64) -> bool {
        self.state().dismiss(id)
    }

    pub fn show_saved_topology(&self, id: &str) -> bool {
        self.visualizer().display_saved_topology(id)
    }

    pub fn show_live_topology(&self) {
        self.visualizer().show_live();
    }

    // ── Inbound events ──────────────────────────────────────────────────

    /// Validate a relayed socket event; invalid payloads are dropped.
    pub fn handle_raw(&self, name: &str, payload: &Value) {
        match InboundEvent::parse(name, payload) {
            Ok(event) => self.handle_event(event),
            Err(e) => tracing::warn!(event = name, error = %e, "dropping invalid payload"),
        }
    }

    pub fn handle_event(&self, event: InboundEvent) {
        tracing::trace!(event = event.name(), "handling event");
        match event {
            InboundEvent::Connected => {
                {
                    let mut state = self.state();
                    state.connection = ConnectionView::Connected;
                    state.dismiss_banners();
                    state.toast(NotificationLevel::Success, "Connected to backend");
                    state.push_log(LogCategory::Connection, "Connected to backend".to_string());
                }
                self.request_updates();
            }
            InboundEvent::Disconnected { reason } if reason == DEMO_MODE_REASON => {
                let mut state = self.state();
                state.connection = ConnectionView::Demo;
                state.banner(
                    NotificationLevel::Info,
                    "Demo mode: no backend is available for this deployment",
                );
                state.push_log(LogCategory::Connection, "Running in demo mode".to_string());
            }
            InboundEvent::Disconnected { reason } => {
                let mut state = self.state();
                state.connection = ConnectionView::Disconnected;
                state.toast(NotificationLevel::Warning, format!("Disconnected: {reason}"));
                state.push_log(LogCategory::Connection, format!("Disconnected: {reason}"));
            }
            InboundEvent::Error { message } => {
                let mut state = self.state();
                state.toast(NotificationLevel::Error, message.clone());
                state.push_log(LogCategory::Connection, format!("Connection error: {message}"));
            }
            InboundEvent::ReconnectFailed => {
                let mut state = self.state();
                state.connection = ConnectionView::Failed;
                state.banner(
                    NotificationLevel::Error,
                    "Unable to reach the backend. Automatic reconnection has stopped.",
                );
                state.push_log(LogCategory::Connection, "Reconnection attempts exhausted".to_string());
            }
            InboundEvent::AiSystemStatus(status) => self.state().apply_status(status),
            InboundEvent::AgentUpdate(agent) => {
                let mut state = self.state();
                let label = agent.display_name().to_string();
                if state.upsert_agent(agent) {
                    state.push_log(LogCategory::Agent, format!("Agent {label} joined"));
                }
            }
            InboundEvent::TaskUpdate(task) => {
                let mut state = self.state();
                let line = format!("Task {} is {:?}", task.id, task.status);
                state.upsert_task(task);
                state.push_log(LogCategory::Task, line);
            }
            InboundEvent::CollaborationUpdate(collaboration) => {
                let mut state = self.state();
                let line = format!(
                    "Collaboration {} ({} agents) {}",
                    collaboration.id,
                    collaboration.participants.len(),
                    collaboration.status
                );
                state.upsert_collaboration(collaboration);
                state.push_log(LogCategory::Collaboration, line);
            }
            InboundEvent::TopologyUpdate(update) | InboundEvent::NetworkTopologyUpdate(update) => {
                self.visualizer().apply_live_update(&update);
            }
            InboundEvent::TcfUpdate(tcf) => self.state().tcf = Some(tcf),
            InboundEvent::TaskChainExecutionStep(event) => {
                let steps = self.state().record_step(&event.chain_id, event.step);
                tracing::debug!(chain_id = %event.chain_id, steps, "task chain step");
            }
            InboundEvent::TaskChainCompleted(chain) => self.complete_chain(chain),
            InboundEvent::AiAgentCreated(agent) => {
                let mut state = self.state();
                let label = agent.display_name().to_string();
                state.upsert_agent(agent);
                state.toast(NotificationLevel::Success, format!("Agent {label} created"));
                state.push_log(LogCategory::Agent, format!("Agent {label} created"));
            }
            InboundEvent::AiTaskCompleted(done) => {
                self.inner.submission.finish();
                let mut state = self.state();
                if let Some(task) = state.tasks.get_mut(&done.task_id) {
                    task.status = TaskStatus::Completed;
                    task.progress = Some(1.0);
                }
                state.toast(NotificationLevel::Success, format!("Task {} completed", done.task_id));
                state.push_log(LogCategory::Task, format!("Task {} completed", done.task_id));
            }
            InboundEvent::AiTaskAcknowledged(ack) => {
                self.inner.submission.finish();
                let mut state = self.state();
                let message = ack
                    .message
                    .unwrap_or_else(|| format!("Task {} accepted", ack.task_id));
                state.toast(NotificationLevel::Info, message);
            }
            InboundEvent::AiTaskError(err) => {
                self.inner.submission.finish();
                let mut state = self.state();
                if let Some(task) = err.task_id.as_ref().and_then(|id| state.tasks.get_mut(id)) {
                    task.status = TaskStatus::Failed;
                }
                state.toast(NotificationLevel::Error, format!("Task failed: {}", err.error));
                state.push_log(LogCategory::Task, format!("Task error: {}", err.error));
            }
            InboundEvent::ProfSmootAllocation(allocation) => {
                self.state().record_allocation(allocation, "prof-smoot");
            }
            InboundEvent::FallbackAllocation(allocation) => {
                self.state().record_allocation(allocation, "fallback");
            }
            InboundEvent::CollaborationCompleted(done) => {
                let mut state = self.state();
                state.complete_collaboration(&done);
                state.push_log(
                    LogCategory::Collaboration,
                    format!("Collaboration {} completed", done.collaboration_id),
                );
            }
            InboundEvent::Pong(_) => self.state().last_pong_at = Some(Utc::now()),
        }
    }

    fn complete_chain(&self, mut chain: TaskChain) {
        let accumulated = self.state().take_chain_steps(&chain.id);
        if chain.execution_path.is_empty() {
            chain.execution_path = accumulated;
        }

        let result = self.visualizer().update_with_task_chain(&chain);
        match result {
            Ok(()) => {
                let mut state = self.state();
                state.completed_chains += 1;
                let label = chain.name.clone().unwrap_or_else(|| chain.id.clone());
                state.toast(
                    NotificationLevel::Success,
                    format!("Task chain {label} completed ({} steps)", chain.execution_path.len()),
                );
                state.push_log(LogCategory::Topology, format!("Saved topology for {label}"));
            }
            Err(e) => {
                tracing::warn!(chain_id = %chain.id, error = %e, "cannot build task chain topology");
            }
        }
    }
}
