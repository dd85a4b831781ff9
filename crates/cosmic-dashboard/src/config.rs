//! Dashboard configuration.
//!
//! Sources, lowest precedence first: built-in defaults, the TOML file,
//! `COSMIC_*` environment variables, command-line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use cosmic_client::{BackendConfig, ClientOptions, ReconnectPolicy};

pub const ENV_BACKEND_URL: &str = "COSMIC_BACKEND_URL";
pub const ENV_HOSTNAME: &str = "COSMIC_HOSTNAME";
pub const ENV_DEMO_MODE: &str = "COSMIC_DEMO_MODE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub backend: BackendConfig,
    pub client: ClientSection,
    pub dashboard: DashboardSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub socket_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub reconnect_base_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub transport_retry_ms: u64,
    pub http_timeout_ms: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            socket_timeout_ms: 20_000,
            heartbeat_interval_ms: 25_000,
            reconnect_base_ms: 1_000,
            reconnect_max_delay_ms: 30_000,
            max_reconnect_attempts: 10,
            transport_retry_ms: 1_000,
            http_timeout_ms: 10_000,
        }
    }
}

impl ClientSection {
    pub fn options(&self) -> ClientOptions {
        ClientOptions {
            socket_timeout: Duration::from_millis(self.socket_timeout_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            reconnect: ReconnectPolicy {
                base_interval: Duration::from_millis(self.reconnect_base_ms),
                max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
                max_attempts: self.max_reconnect_attempts,
                transport_retry: Duration::from_millis(self.transport_retry_ms),
                ..ReconnectPolicy::default()
            },
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardSection {
    pub poll_interval_ms: u64,
    /// Poll `/api/ai-status` over HTTP while the socket is down.
    pub http_fallback: bool,
    pub max_notifications: usize,
    pub toast_ttl_ms: u64,
    pub log_capacity: usize,
}

impl Default for DashboardSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            http_fallback: true,
            max_notifications: 20,
            toast_ttl_ms: 5_000,
            log_capacity: 500,
        }
    }
}

impl DashboardConfig {
    /// `<config dir>/cosmic-agent/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cosmic-agent")
            .join("config.toml")
    }

    /// Load from `path`, or from the default location if it exists.
    /// An explicitly given path must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::default_path(), false),
        };
        if !required && !path.exists() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply `COSMIC_*` overrides using `lookup` to read variables.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(hostname) = lookup(ENV_HOSTNAME).filter(|v| !v.is_empty()) {
            self.set_hostname(&hostname);
        }
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            self.backend.backend_url = Some(url);
        }
        if let Some(raw) = lookup(ENV_DEMO_MODE) {
            match parse_flag(&raw) {
                Some(flag) => self.backend.demo_mode = Some(flag),
                None => tracing::warn!(value = %raw, "ignoring unrecognised {ENV_DEMO_MODE}"),
            }
        }
    }

    /// Pretend the dashboard is served from `hostname`. Production settings
    /// and explicit overrides are kept.
    pub fn set_hostname(&mut self, hostname: &str) {
        let scheme = if hostname == "localhost" || hostname == "127.0.0.1" {
            "http"
        } else {
            "https"
        };
        let resolved = BackendConfig::from_origin(&format!("{scheme}://{hostname}"));
        self.backend.hostname = resolved.hostname;
        self.backend.origin = resolved.origin;
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.dashboard.poll_interval_ms.max(1))
    }

    pub fn toast_ttl(&self) -> Duration {
        Duration::from_millis(self.dashboard.toast_ttl_ms)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_client_defaults() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.client.options(), ClientOptions::default());
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.backend.websocket_url(), "ws://localhost:8080");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = DashboardConfig::from_toml(
            r#"
            [backend]
            hostname = "preview.vercel.app"
            origin = "https://preview.vercel.app"

            [dashboard]
            poll_interval_ms = 2000
            "#,
        )
        .unwrap();
        assert!(cfg.backend.should_use_demo_mode());
        assert_eq!(cfg.dashboard.poll_interval_ms, 2_000);
        assert_eq!(cfg.dashboard.max_notifications, 20);
        assert_eq!(cfg.client.max_reconnect_attempts, 10);
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            (ENV_HOSTNAME, "preview.vercel.app"),
            (ENV_BACKEND_URL, "https://api.example.com"),
            (ENV_DEMO_MODE, "no"),
        ]
        .into_iter()
        .collect();
        let mut cfg = DashboardConfig::default();
        cfg.apply_env_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.backend.hostname, "preview.vercel.app");
        assert_eq!(cfg.backend.origin, "https://preview.vercel.app");
        assert!(!cfg.backend.should_use_demo_mode());
        assert_eq!(cfg.backend.websocket_url(), "wss://api.example.com");
    }

    #[test]
    fn bad_demo_flag_is_ignored() {
        let mut cfg = DashboardConfig::default();
        cfg.apply_env_from(|k| (k == ENV_DEMO_MODE).then(|| "maybe".to_string()));
        assert_eq!(cfg.backend.demo_mode, None);
    }

    #[test]
    fn toml_round_trips() {
        let mut cfg = DashboardConfig::default();
        cfg.backend.demo_mode = Some(true);
        let text = cfg.to_toml().unwrap();
        assert_eq!(DashboardConfig::from_toml(&text).unwrap(), cfg);
    }
}
