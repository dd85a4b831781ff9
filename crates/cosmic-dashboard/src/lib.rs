//! Cosmic Dashboard - operator view of the Cosmic Agent Network.
//!
//! [`CosmicAgentApp`] owns the socket client, folds inbound events into
//! [`SystemState`] and the network visualizer, and exposes the user
//! actions. The monitors turn that state into panel view models; the
//! [`console`] module draws them in the terminal.

pub mod app;
pub mod config;
pub mod console;
pub mod monitors;
pub mod state;

pub use app::{CosmicAgentApp, ListenerRegistration, PollOutcome, SubmissionGuard, SubmitOutcome};
pub use config::DashboardConfig;
pub use monitors::{CollaborationMonitor, SystemMonitor, TaskManager};
pub use state::{ConnectionView, Notification, NotificationKind, NotificationLevel, SystemState};
