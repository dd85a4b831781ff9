//! Backend URL resolution.
//!
//! Resolution works on a configured hostname/origin pair rather than on
//! ambient process state. An explicit URL override or demo flag, when set,
//! wins over the hostname rules.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PRODUCTION_HOSTNAME: &str = "cosmic-agent-network.vercel.app";
pub const DEFAULT_PRODUCTION_URL: &str = "https://cosmic-agent-network-backend.onrender.com";
pub const LOCAL_BACKEND_URL: &str = "http://localhost:8080";
const VERCEL_SUFFIX: &str = "vercel.app";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Hostname the dashboard is served from.
    pub hostname: String,
    /// Origin (`scheme://host[:port]`) the dashboard is served from.
    pub origin: String,
    /// The one deployment host that has a real backend behind it.
    pub production_hostname: String,
    pub production_url: String,
    /// Explicit backend URL, bypassing hostname rules.
    pub backend_url: Option<String>,
    /// Explicit demo-mode switch, bypassing hostname rules.
    pub demo_mode: Option<bool>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self::from_origin("http://localhost:8080")
    }
}

impl BackendConfig {
    /// Build a config for a dashboard served from `origin`.
    pub fn from_origin(origin: &str) -> Self {
        let origin = origin.trim_end_matches('/').to_string();
        Self {
            hostname: hostname_of(&origin),
            origin,
            production_hostname: DEFAULT_PRODUCTION_HOSTNAME.to_string(),
            production_url: DEFAULT_PRODUCTION_URL.to_string(),
            backend_url: None,
            demo_mode: None,
        }
    }

    pub fn is_vercel_deployment(&self) -> bool {
        self.hostname.contains(VERCEL_SUFFIX)
    }

    pub fn is_localhost(&self) -> bool {
        self.hostname == "localhost" || self.hostname == "127.0.0.1"
    }

    fn is_production(&self) -> bool {
        self.hostname == self.production_hostname
    }

    pub fn backend_url(&self) -> String {
        if let Some(url) = &self.backend_url {
            return url.trim_end_matches('/').to_string();
        }
        if self.is_production() {
            self.production_url.clone()
        } else if self.is_vercel_deployment() {
            tracing::warn!(
                hostname = %self.hostname,
                "Vercel deployment without a socket backend; falling back to origin"
            );
            self.origin.clone()
        } else if self.is_localhost() {
            LOCAL_BACKEND_URL.to_string()
        } else {
            self.origin.clone()
        }
    }

    pub fn websocket_url(&self) -> String {
        let url = self.backend_url();
        if let Some(rest) = url.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = url.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            url
        }
    }

    pub fn should_use_demo_mode(&self) -> bool {
        if let Some(flag) = self.demo_mode {
            return flag;
        }
        if self.backend_url.is_some() {
            return false;
        }
        self.is_vercel_deployment() && !self.is_production()
    }
}

fn hostname_of(origin: &str) -> String {
    let without_scheme = origin
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(origin);
    let host_port = without_scheme.split('/').next().unwrap_or("");
    // Bracketed IPv6 hosts keep their colons.
    if let Some(rest) = host_port.strip_prefix('[') {
        return rest.split(']').next().unwrap_or("").to_string();
    }
    host_port.split(':').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hostname_is_extracted_from_origin() {
        assert_eq!(hostname_of("https://example.com:8443/app"), "example.com");
        assert_eq!(hostname_of("http://127.0.0.1:3000"), "127.0.0.1");
        assert_eq!(hostname_of("http://[::1]:3000"), "::1");
        assert_eq!(hostname_of("example.org"), "example.org");
    }

    #[test]
    fn localhost_resolves_to_local_backend() {
        let cfg = BackendConfig::from_origin("http://localhost:3000");
        assert!(cfg.is_localhost());
        assert_eq!(cfg.backend_url(), LOCAL_BACKEND_URL);
        assert_eq!(cfg.websocket_url(), "ws://localhost:8080");
        assert!(!cfg.should_use_demo_mode());
    }

    #[test]
    fn production_host_uses_fixed_url() {
        let cfg = BackendConfig::from_origin(&format!("https://{DEFAULT_PRODUCTION_HOSTNAME}"));
        assert!(cfg.is_vercel_deployment());
        assert_eq!(cfg.backend_url(), DEFAULT_PRODUCTION_URL);
        assert!(cfg.websocket_url().starts_with("wss://"));
        assert!(!cfg.should_use_demo_mode());
    }

    #[test]
    fn generic_vercel_host_falls_back_to_origin_in_demo_mode() {
        let cfg = BackendConfig::from_origin("https://preview-123.vercel.app/");
        assert_eq!(cfg.backend_url(), "https://preview-123.vercel.app");
        assert_eq!(cfg.websocket_url(), "wss://preview-123.vercel.app");
        assert!(cfg.should_use_demo_mode());
    }

    #[test]
    fn other_hosts_use_origin() {
        let cfg = BackendConfig::from_origin("https://agents.example.com");
        assert!(!cfg.is_vercel_deployment());
        assert!(!cfg.is_localhost());
        assert_eq!(cfg.backend_url(), "https://agents.example.com");
        assert!(!cfg.should_use_demo_mode());
    }

    #[test]
    fn explicit_flags_win_over_hostname() {
        let mut cfg = BackendConfig::from_origin("https://preview-123.vercel.app");
        cfg.backend_url = Some("http://10.0.0.5:9000/".into());
        assert_eq!(cfg.backend_url(), "http://10.0.0.5:9000");
        assert_eq!(cfg.websocket_url(), "ws://10.0.0.5:9000");
        assert!(!cfg.should_use_demo_mode());

        let mut cfg = BackendConfig::from_origin("http://localhost:3000");
        cfg.demo_mode = Some(true);
        assert!(cfg.should_use_demo_mode());
    }
}
