//! Terminal dashboard for the Cosmic Agent Network.
//!
//! Shows connection status and banners, the system, task and collaboration
//! monitors, the network topology with its saved task-chain snapshots, and
//! a console output pane. Plain text typed at the prompt is submitted as an
//! AI task; `/commands` drive everything else.
//!
//! Launch with `cosmic-dashboard` (no `--headless`).

use std::io::{self, Stdout};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};

use cosmic_protocol::TaskStatus;
use cosmic_topology::NodeGroup;

use crate::app::{CosmicAgentApp, SubmitOutcome};
use crate::monitors::{CollaborationMonitor, SystemMonitor, TaskManager};
use crate::state::{ConnectionView, LogEntry, Notification, NotificationKind, NotificationLevel};

const MAX_CONSOLE_MESSAGES: usize = 500;
const RECENT_LOG_ENTRIES: usize = 200;

#[derive(Debug, Clone, Default)]
struct TopologyView {
    nodes: usize,
    links: usize,
    agents: usize,
    tasks: usize,
    dangling: usize,
    saved_ids: Vec<String>,
    selection: Option<String>,
    showing_saved: bool,
}

/// Everything one frame needs, copied out so no lock is held while drawing.
struct ConsoleSnapshot {
    backend_url: String,
    system: SystemMonitor,
    tasks: TaskManager,
    collaborations: CollaborationMonitor,
    topology: TopologyView,
    banners: Vec<Notification>,
    toasts: Vec<Notification>,
    event_log: Vec<LogEntry>,
    submitting: bool,
    reconnect_attempts: u32,
}

struct DashboardConsole {
    app: CosmicAgentApp,
    input: String,
    /// Cursor position within the input, in chars.
    cursor_pos: usize,
    history: Vec<String>,
    history_pos: Option<usize>,
    task_scroll: u16,
    console_messages: Vec<(DateTime<Utc>, String, Color)>,
}

impl DashboardConsole {
    fn new(app: CosmicAgentApp) -> Self {
        let mut console = Self {
            app,
            input: String::new(),
            cursor_pos: 0,
            history: Vec::new(),
            history_pos: None,
            task_scroll: 0,
            console_messages: Vec::new(),
        };
        console.add_message(
            "Cosmic Agent Network dashboard ready. Type a task description and press Enter to submit it.",
            Color::Cyan,
        );
        console.add_message(
            "Commands: /help, /status, /topologies, /show <id>, /live, /quit",
            Color::DarkGray,
        );
        console
    }

    fn snapshot(&self) -> ConsoleSnapshot {
        let topology = {
            let viz = self.app.visualizer();
            let graph = viz.graph();
            TopologyView {
                nodes: graph.nodes.len(),
                links: graph.links.len(),
                agents: graph.count_group(NodeGroup::Agent),
                tasks: graph.count_group(NodeGroup::Task),
                dangling: graph.links.iter().filter(|l| l.resolved.is_none()).count(),
                saved_ids: viz.saved_topology_ids(),
                selection: viz.selection().map(str::to_string),
                showing_saved: viz.has_saved_topology_displayed(),
            }
        };

        let state = self.app.state();
        let (banners, toasts): (Vec<Notification>, Vec<Notification>) = state
            .notifications
            .iter()
            .cloned()
            .partition(|n| n.kind == NotificationKind::Banner);
        let log_start = state.event_log.len().saturating_sub(RECENT_LOG_ENTRIES);

        ConsoleSnapshot {
            backend_url: self.app.config().backend.backend_url(),
            system: SystemMonitor::from_state(&state),
            tasks: TaskManager::from_state(&state),
            collaborations: CollaborationMonitor::from_state(&state),
            topology,
            banners,
            toasts,
            event_log: state.event_log[log_start..].to_vec(),
            submitting: self.app.is_submitting(),
            reconnect_attempts: self.app.client().reconnect_attempts(),
        }
    }

    /// Process a command or task description from the prompt.
    fn process_input(&mut self) {
        let input = self.input.trim().to_string();
        if input.is_empty() {
            return;
        }

        self.history.push(input.clone());
        self.history_pos = None;

        if input.starts_with('/') {
            self.process_command(&input);
        } else {
            self.submit_task(&input);
        }

        self.input.clear();
        self.cursor_pos = 0;
    }

    fn process_command(&mut self, cmd: &str) {
        let (command, args) = match cmd.split_once(' ') {
            Some((c, a)) => (c, a.trim()),
            None => (cmd, ""),
        };

        match command {
            "/help" => {
                self.add_message("Available commands:", Color::Cyan);
                for line in [
                    "  <text>             - Submit an AI task with the given description",
                    "  /status            - Show connection and system status",
                    "  /agents            - List known agents",
                    "  /tasks             - List tasks",
                    "  /collabs           - List active collaborations",
                    "  /agent <name> [capability,...] - Create an AI agent",
                    "  /task <title> [| description] - Create a task",
                    "  /topologies        - List saved task-chain topologies",
                    "  /show <chain id>   - Display a saved topology",
                    "  /live              - Return to the live topology",
                    "  /clear-topologies  - Forget all saved topologies",
                    "  /dismiss <id|all>  - Dismiss notifications",
                    "  /reconnect         - Connect again after giving up",
                    "  /quit              - Exit the dashboard",
                ] {
                    self.add_message(line, Color::White);
                }
            }
            "/status" => {
                let status = self.app.client().connection_status();
                let system = SystemMonitor::from_state(&self.app.state());
                self.add_message(
                    &format!(
                        "Backend: {} | {}",
                        self.app.config().backend.backend_url(),
                        system.connection.label()
                    ),
                    Color::Green,
                );
                self.add_message(
                    &format!(
                        "Connected: {} | Connecting: {} | Demo: {} | Reconnect attempts: {}",
                        status.is_connected,
                        status.is_connecting,
                        status.demo_mode,
                        status.reconnect_attempts
                    ),
                    Color::Green,
                );
                self.add_message(&format!("System: {}", system.summary()), Color::Green);
            }
            "/agents" => {
                let agents: Vec<String> = self
                    .app
                    .state()
                    .agents
                    .values()
                    .map(|a| {
                        format!(
                            "  {} [{:?}] {} {}",
                            a.display_name(),
                            a.status,
                            a.role.as_deref().unwrap_or("-"),
                            a.capabilities.join(",")
                        )
                    })
                    .collect();
                if agents.is_empty() {
                    self.add_message("No agents known yet.", Color::Yellow);
                } else {
                    self.add_message(&format!("Agents ({}):", agents.len()), Color::Cyan);
                    for line in agents {
                        self.add_message(&line, Color::White);
                    }
                }
            }
            "/tasks" => {
                let tasks = TaskManager::from_state(&self.app.state());
                if tasks.rows.is_empty() {
                    self.add_message("No tasks.", Color::Yellow);
                } else {
                    self.add_message(&format!("Tasks ({}):", tasks.rows.len()), Color::Cyan);
                    for row in &tasks.rows {
                        self.add_message(
                            &format!(
                                "  {} [{}] assigned={} {}",
                                row.id,
                                format_task_status(row.status),
                                row.assigned,
                                row.title
                            ),
                            Color::White,
                        );
                    }
                }
            }
            "/collabs" => {
                let collabs = CollaborationMonitor::from_state(&self.app.state());
                if collabs.active.is_empty() {
                    self.add_message("No active collaborations.", Color::Yellow);
                } else {
                    for row in &collabs.active {
                        self.add_message(
                            &format!("  {} [{}] {}", row.id, row.status, row.participants.join(", ")),
                            Color::White,
                        );
                    }
                }
            }
            "/agent" => {
                let (name, capabilities) = parse_agent_args(args);
                if name.is_empty() {
                    self.add_message("Usage: /agent <name> [capability,...]", Color::Yellow);
                } else if self.app.create_agent(&name, capabilities) {
                    self.add_message(&format!("Agent creation requested: {name}"), Color::Green);
                } else {
                    self.add_message("Not connected; agent was not created.", Color::Red);
                }
            }
            "/task" => {
                let (title, description) = parse_task_args(args);
                if title.is_empty() {
                    self.add_message("Usage: /task <title> [| description]", Color::Yellow);
                } else {
                    match self.app.create_task(&title, &description, None) {
                        Some(id) => self.add_message(&format!("Task created: {id}"), Color::Green),
                        None => self.add_message("Not connected; task was not created.", Color::Red),
                    }
                }
            }
            "/topologies" => {
                let (ids, summaries) = {
                    let viz = self.app.visualizer();
                    let saved = viz.get_saved_topologies();
                    let ids = viz.saved_topology_ids();
                    let summaries: Vec<String> = ids
                        .iter()
                        .filter_map(|id| saved.get(id))
                        .map(|s| {
                            format!(
                                "  {} {} ({} steps, {} nodes) saved {}",
                                s.task_info.id,
                                s.task_info.name,
                                s.task_info.step_count,
                                s.nodes.len(),
                                s.timestamp.format("%H:%M:%S")
                            )
                        })
                        .collect();
                    (ids, summaries)
                };
                if ids.is_empty() {
                    self.add_message("No saved topologies yet.", Color::Yellow);
                } else {
                    self.add_message(&format!("Saved topologies ({}):", ids.len()), Color::Cyan);
                    for line in summaries {
                        self.add_message(&line, Color::White);
                    }
                }
            }
            "/show" => {
                if args.is_empty() {
                    self.add_message("Usage: /show <chain id>", Color::Yellow);
                } else if self.app.show_saved_topology(args) {
                    self.add_message(&format!("Showing saved topology {args}"), Color::Green);
                } else {
                    self.add_message(&format!("No saved topology {args}"), Color::Red);
                }
            }
            "/live" => {
                self.app.show_live_topology();
                self.add_message("Showing live topology.", Color::Green);
            }
            "/clear-topologies" => {
                self.app.visualizer().clear_saved_topologies();
                self.add_message("Saved topologies cleared.", Color::Green);
            }
            "/dismiss" => {
                if args == "all" {
                    let ids: Vec<u64> = self.app.state().notifications.iter().map(|n| n.id).collect();
                    for id in &ids {
                        self.app.dismiss_notification(*id);
                    }
                    self.add_message(&format!("Dismissed {} notifications.", ids.len()), Color::Green);
                } else {
                    match args.parse::<u64>() {
                        Ok(id) if self.app.dismiss_notification(id) => {
                            self.add_message(&format!("Dismissed notification {id}."), Color::Green)
                        }
                        _ => self.add_message("Usage: /dismiss <id|all>", Color::Yellow),
                    }
                }
            }
            "/reconnect" => {
                let client = self.app.client().clone();
                tokio::spawn(async move {
                    if let Err(e) = client.connect().await {
                        tracing::warn!(error = %e, "manual reconnect failed");
                    }
                });
                self.add_message("Reconnecting...", Color::Cyan);
            }
            "/quit" | "/exit" | "/q" => {
                // Handled in the event loop.
            }
            _ => {
                self.add_message(
                    &format!("Unknown command: {command}. Type /help for available commands."),
                    Color::Red,
                );
            }
        }
    }

    fn submit_task(&mut self, description: &str) {
        match self.app.submit_task(description) {
            SubmitOutcome::Sent { task_id } => {
                self.add_message(&format!("Task submitted: {task_id}"), Color::Green);
                self.add_message(&format!("  Description: {description}"), Color::White);
            }
            SubmitOutcome::Busy => {
                self.add_message("A task is already being submitted; wait for it.", Color::Yellow)
            }
            SubmitOutcome::Empty => {}
            SubmitOutcome::NotDelivered { .. } => {
                self.add_message("Not connected to the backend; task was not sent.", Color::Red)
            }
        }
    }

    fn add_message(&mut self, msg: &str, color: Color) {
        self.console_messages.push((Utc::now(), msg.to_string(), color));
        if self.console_messages.len() > MAX_CONSOLE_MESSAGES {
            self.console_messages.remove(0);
        }
    }

    fn render(&self, frame: &mut Frame, snapshot: &ConsoleSnapshot) {
        let banner_height = if snapshot.banners.is_empty() {
            0
        } else {
            snapshot.banners.len().min(3) as u16 + 2
        };
        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(banner_height),
                Constraint::Min(10),
                Constraint::Length(5),
            ])
            .split(frame.area());

        self.render_status_bar(frame, outer[0], snapshot);
        if banner_height > 0 {
            self.render_banners(frame, outer[1], snapshot);
        }
        self.render_main_area(frame, outer[2], snapshot);
        self.render_input(frame, outer[3], snapshot);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let block = Block::default()
            .title(" Cosmic Agent Network ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let connection = snap.system.connection;
        let mut spans = vec![
            Span::styled("  Status: ", Style::default().fg(Color::Gray)),
            Span::styled(connection.label(), Style::default().fg(connection_color(connection))),
        ];
        if connection == ConnectionView::Disconnected && snap.reconnect_attempts > 0 {
            spans.push(Span::styled(
                format!(" (retry {})", snap.reconnect_attempts),
                Style::default().fg(Color::Yellow),
            ));
        }
        spans.extend([
            Span::styled("  |  Backend: ", Style::default().fg(Color::Gray)),
            Span::styled(snap.backend_url.clone(), Style::default().fg(Color::White)),
            Span::styled("  |  Agents: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}/{}", snap.system.agents_active, snap.system.agents_total),
                Style::default().fg(Color::Green),
            ),
            Span::styled("  |  Uptime: ", Style::default().fg(Color::Gray)),
            Span::styled(format_uptime(snap.system.uptime_secs), Style::default().fg(Color::Magenta)),
        ]);
        if snap.submitting {
            spans.push(Span::styled(
                "  |  Submitting...",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ));
        }

        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn render_banners(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red));
        let lines: Vec<Line> = snap
            .banners
            .iter()
            .take(3)
            .map(|n| {
                Line::from(vec![
                    Span::styled(format!("  [{}] ", n.id), Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        n.message.clone(),
                        Style::default()
                            .fg(level_color(n.level))
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::styled("  (/dismiss to close)", Style::default().fg(Color::DarkGray)),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_main_area(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);

        let left = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(8),
                Constraint::Length(8),
                Constraint::Min(4),
            ])
            .split(columns[0]);
        self.render_system(frame, left[0], snap);
        self.render_topology(frame, left[1], snap);
        self.render_collaborations(frame, left[2], snap);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(10), Constraint::Min(4)])
            .split(columns[1]);
        self.render_tasks(frame, right[0], snap);
        self.render_console_output(frame, right[1], snap);
    }

    fn render_system(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let block = Block::default()
            .title(" System ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::LightBlue));

        let s = &snap.system;
        let text = vec![
            Line::from(vec![
                Span::styled("  Agents: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    format!(
                        "{} total, {} active, {} offline",
                        s.agents_total, s.agents_active, s.agents_offline
                    ),
                    Style::default().fg(Color::Green),
                ),
            ]),
            Line::from(vec![
                Span::styled("  CPU/Mem: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    format!(
                        "{} / {}",
                        format_percent(s.cpu_usage),
                        format_percent(s.memory_usage)
                    ),
                    Style::default().fg(Color::Yellow),
                ),
            ]),
            Line::from(vec![
                Span::styled("  Msg/s: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    s.messages_per_second
                        .map(|m| format!("{m:.1}"))
                        .unwrap_or_else(|| "-".to_string()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled("  Done: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    s.tasks_completed
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    Style::default().fg(Color::Cyan),
                ),
            ]),
            Line::from(vec![
                Span::styled("  Force field: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    match (s.tcf_energy, s.tcf_coherence) {
                        (Some(e), Some(c)) => format!("energy {e:.2}, coherence {c:.2}"),
                        _ => "-".to_string(),
                    },
                    Style::default().fg(Color::Magenta),
                ),
            ]),
        ];
        frame.render_widget(Paragraph::new(text).block(block), area);
    }

    fn render_topology(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let t = &snap.topology;
        let title = match (&t.selection, t.showing_saved) {
            (Some(id), true) => format!(" Network: saved {id} "),
            (None, true) => " Network: task chain ".to_string(),
            _ => " Network: live ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow));

        let mut text = vec![
            Line::from(vec![
                Span::styled("  Nodes: ", Style::default().fg(Color::Gray)),
                Span::styled(
                    format!("{} ({} agents, {} tasks)", t.nodes, t.agents, t.tasks),
                    Style::default().fg(Color::White),
                ),
            ]),
            Line::from(vec![
                Span::styled("  Links: ", Style::default().fg(Color::Gray)),
                Span::styled(t.links.to_string(), Style::default().fg(Color::White)),
                Span::styled(
                    if t.dangling > 0 {
                        format!(" ({} unresolved)", t.dangling)
                    } else {
                        String::new()
                    },
                    Style::default().fg(Color::Red),
                ),
            ]),
            Line::from(vec![
                Span::styled("  Saved: ", Style::default().fg(Color::Gray)),
                Span::styled(t.saved_ids.len().to_string(), Style::default().fg(Color::Cyan)),
            ]),
        ];
        for id in t.saved_ids.iter().take(area.height.saturating_sub(5) as usize) {
            let marker = if t.selection.as_deref() == Some(id.as_str()) { "▶" } else { " " };
            text.push(Line::from(Span::styled(
                format!("   {marker} {id}"),
                Style::default().fg(Color::DarkGray),
            )));
        }
        frame.render_widget(Paragraph::new(text).block(block), area);
    }

    fn render_collaborations(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let c = &snap.collaborations;
        let block = Block::default()
            .title(format!(
                " Collaborations ({} active / {} total) ",
                c.active_count, c.total_count
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green));

        if c.active.is_empty() && c.recent_allocations.is_empty() {
            let text = Paragraph::new(Line::from(Span::styled(
                "  Waiting for collaboration activity...",
                Style::default().fg(Color::DarkGray),
            )))
            .block(block);
            frame.render_widget(text, area);
            return;
        }

        let mut lines: Vec<Line> = c
            .active
            .iter()
            .map(|row| {
                Line::from(vec![
                    Span::styled(format!("  {} ", row.id), Style::default().fg(Color::White)),
                    Span::styled(format!("[{}] ", row.status), Style::default().fg(Color::Cyan)),
                    Span::styled(row.participants.join(", "), Style::default().fg(Color::Gray)),
                ])
            })
            .collect();
        for alloc in &c.recent_allocations {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("  {} ", alloc.source),
                    Style::default().fg(Color::Magenta),
                ),
                Span::styled(
                    format!("{} -> {}", alloc.task_id, alloc.agents.join(", ")),
                    Style::default().fg(Color::Gray),
                ),
            ]));
        }
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_tasks(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let t = &snap.tasks;
        let block = Block::default()
            .title(format!(
                " Tasks ({} pending, {} running, {} done, {} failed) ",
                t.pending, t.in_progress, t.completed, t.failed
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));

        if t.rows.is_empty() {
            let text = Paragraph::new(Line::from(Span::styled(
                "  No tasks. Type a task description below to submit one.",
                Style::default().fg(Color::DarkGray),
            )))
            .block(block);
            frame.render_widget(text, area);
            return;
        }

        let rows: Vec<Row> = t
            .rows
            .iter()
            .skip(self.task_scroll as usize)
            .map(|task| {
                let progress = task
                    .progress
                    .map(|p| format!("{:>3.0}%", p * 100.0))
                    .unwrap_or_default();
                Row::new(vec![
                    Cell::from(Span::styled(
                        format!("  {}", truncate(&task.id, 16)),
                        Style::default().fg(Color::White),
                    )),
                    Cell::from(Span::styled(
                        format!("{} {}", format_task_status(task.status), progress),
                        Style::default().fg(task_status_color(task.status)),
                    )),
                    Cell::from(Span::styled(
                        truncate(&task.assigned, 20),
                        Style::default().fg(Color::White),
                    )),
                    Cell::from(Span::styled(
                        truncate(&task.title, 40),
                        Style::default().fg(Color::Gray),
                    )),
                ])
            })
            .collect();

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(20),
                Constraint::Percentage(18),
                Constraint::Percentage(20),
                Constraint::Percentage(42),
            ],
        )
        .block(block)
        .header(
            Row::new(vec!["  Task ID", "Status", "Assigned", "Title"])
                .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD)),
        );
        frame.render_widget(table, area);
    }

    /// Console messages interleaved with recent log entries and toasts.
    fn render_console_output(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let block = Block::default()
            .title(" Console Output ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White));

        let mut entries: Vec<(DateTime<Utc>, String, Color)> = self.console_messages.clone();
        entries.extend(
            snap.event_log
                .iter()
                .map(|e| (e.timestamp, e.message.clone(), Color::DarkGray)),
        );
        entries.extend(
            snap.toasts
                .iter()
                .map(|n| (n.created_at, n.message.clone(), level_color(n.level))),
        );
        entries.sort_by_key(|(ts, _, _)| *ts);

        let inner_height = area.height.saturating_sub(2) as usize;
        let start = entries.len().saturating_sub(inner_height);
        let lines: Vec<Line> = entries[start..]
            .iter()
            .map(|(ts, msg, color)| {
                Line::from(vec![
                    Span::styled(
                        format!("  [{}] ", ts.format("%H:%M:%S")),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(msg.clone(), Style::default().fg(*color)),
                ])
            })
            .collect();
        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect, snap: &ConsoleSnapshot) {
        let block = Block::default()
            .title(" Input (Enter = submit task, /help = commands, /quit = exit) ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green));

        let input_display = if self.input.is_empty() {
            let hint = if snap.system.connection == ConnectionView::Demo {
                "Demo mode: tasks cannot be submitted"
            } else {
                "Describe a task or type /command..."
            };
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled(hint, Style::default().fg(Color::DarkGray)),
            ])
        } else {
            Line::from(vec![
                Span::styled("  > ", Style::default().fg(Color::Green)),
                Span::styled(self.input.clone(), Style::default().fg(Color::White)),
            ])
        };
        let hint_line = Line::from(Span::styled(
            "  Ctrl+C or /quit to exit  |  Up/Down for history  |  PgUp/PgDn scroll tasks",
            Style::default().fg(Color::DarkGray),
        ));

        frame.render_widget(
            Paragraph::new(vec![Line::from(""), input_display, hint_line]).block(block),
            area,
        );
        frame.set_cursor_position((area.x + 4 + self.cursor_pos as u16, area.y + 2));
    }

    /// Handle a key press. Returns `true` if the console should exit.
    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        match (code, modifiers) {
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => return true,
            (KeyCode::Char(c), _) => {
                let at = self.byte_offset(self.cursor_pos);
                self.input.insert(at, c);
                self.cursor_pos += 1;
            }
            (KeyCode::Backspace, _) => {
                if self.cursor_pos > 0 {
                    let at = self.byte_offset(self.cursor_pos - 1);
                    self.input.remove(at);
                    self.cursor_pos -= 1;
                }
            }
            (KeyCode::Delete, _) => {
                if self.cursor_pos < self.input.chars().count() {
                    let at = self.byte_offset(self.cursor_pos);
                    self.input.remove(at);
                }
            }
            (KeyCode::Left, _) => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            (KeyCode::Right, _) => {
                self.cursor_pos = (self.cursor_pos + 1).min(self.input.chars().count())
            }
            (KeyCode::Home, _) => self.cursor_pos = 0,
            (KeyCode::End, _) => self.cursor_pos = self.input.chars().count(),
            (KeyCode::Up, _) => {
                if !self.history.is_empty() {
                    let pos = match self.history_pos {
                        Some(p) if p > 0 => p - 1,
                        Some(p) => p,
                        None => self.history.len() - 1,
                    };
                    self.history_pos = Some(pos);
                    self.input = self.history[pos].clone();
                    self.cursor_pos = self.input.chars().count();
                }
            }
            (KeyCode::Down, _) => {
                if let Some(pos) = self.history_pos {
                    if pos + 1 < self.history.len() {
                        self.history_pos = Some(pos + 1);
                        self.input = self.history[pos + 1].clone();
                        self.cursor_pos = self.input.chars().count();
                    } else {
                        self.history_pos = None;
                        self.input.clear();
                        self.cursor_pos = 0;
                    }
                }
            }
            (KeyCode::PageUp, _) => self.task_scroll = self.task_scroll.saturating_sub(5),
            (KeyCode::PageDown, _) => self.task_scroll = self.task_scroll.saturating_add(5),
            _ => {}
        }
        false
    }

    fn byte_offset(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

/// `name cap1,cap2` → (`name`, [`cap1`, `cap2`])
fn parse_agent_args(args: &str) -> (String, Vec<String>) {
    let mut parts = args.splitn(2, char::is_whitespace);
    let name = parts.next().unwrap_or("").trim().to_string();
    let capabilities = parts
        .next()
        .map(|rest| {
            rest.split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    (name, capabilities)
}

/// `title | description` → (`title`, `description`); the description
/// defaults to the title.
fn parse_task_args(args: &str) -> (String, String) {
    match args.split_once('|') {
        Some((title, description)) => (title.trim().to_string(), description.trim().to_string()),
        None => (args.trim().to_string(), args.trim().to_string()),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        s.to_string()
    }
}

fn format_uptime(secs: i64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn format_percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.0}%"))
        .unwrap_or_else(|| "-".to_string())
}

fn format_task_status(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::InProgress => "Running",
        TaskStatus::Completed => "Completed",
        TaskStatus::Failed => "Failed",
        TaskStatus::Unknown => "Unknown",
    }
}

fn task_status_color(status: TaskStatus) -> Color {
    match status {
        TaskStatus::Pending => Color::Yellow,
        TaskStatus::InProgress => Color::Blue,
        TaskStatus::Completed => Color::Green,
        TaskStatus::Failed => Color::Red,
        TaskStatus::Unknown => Color::White,
    }
}

fn connection_color(connection: ConnectionView) -> Color {
    match connection {
        ConnectionView::Connecting => Color::Yellow,
        ConnectionView::Connected => Color::Green,
        ConnectionView::Disconnected => Color::Red,
        ConnectionView::Demo => Color::Magenta,
        ConnectionView::Failed => Color::Red,
    }
}

fn level_color(level: NotificationLevel) -> Color {
    match level {
        NotificationLevel::Info => Color::Cyan,
        NotificationLevel::Success => Color::Green,
        NotificationLevel::Warning => Color::Yellow,
        NotificationLevel::Error => Color::Red,
    }
}

fn setup_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Run the dashboard until the user quits. Initialises the app in the
/// background and shuts it down on exit.
pub async fn run_console(app: CosmicAgentApp) -> anyhow::Result<()> {
    use std::io::IsTerminal;
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        return Err(anyhow::anyhow!(
            "the dashboard console requires a terminal (TTY); use --headless"
        ));
    }

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let init = {
        let app = app.clone();
        tokio::spawn(async move { app.initialize().await })
    };

    let mut terminal = setup_terminal()?;
    let mut console = DashboardConsole::new(app.clone());
    let tick_rate = Duration::from_millis(100);

    let result: anyhow::Result<()> = async {
        loop {
            let snapshot = console.snapshot();
            terminal.draw(|frame| console.render(frame, &snapshot))?;

            // Requires the multi-threaded runtime.
            let ready = tokio::task::block_in_place(|| event::poll(tick_rate))?;
            if !ready {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                if key.code == KeyCode::Enter {
                    let trimmed = console.input.trim();
                    if trimmed == "/quit" || trimmed == "/exit" || trimmed == "/q" {
                        break;
                    }
                    console.process_input();
                } else if console.handle_key(key.code, key.modifiers) {
                    break;
                }
            }
        }
        Ok(())
    }
    .await;

    restore_terminal(&mut terminal)?;
    init.abort();
    app.shutdown();
    result
}
