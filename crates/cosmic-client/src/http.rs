//! Plain-HTTP status fetch, used when the socket is down.

use std::time::Duration;

use cosmic_protocol::{AiSystemStatus, AI_STATUS_PATH};

use crate::ClientError;

#[derive(Debug, Clone)]
pub struct StatusFallback {
    http: reqwest::Client,
    base_url: String,
}

impl StatusFallback {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn status_url(&self) -> String {
        format!("{}{}", self.base_url, AI_STATUS_PATH)
    }

    pub async fn fetch_status(&self) -> Result<AiSystemStatus, ClientError> {
        let url = self.status_url();
        tracing::debug!(url = %url, "fetching status over HTTP");
        let status = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<AiSystemStatus>()
            .await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_url_joins_without_double_slash() {
        let f = StatusFallback::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(f.status_url(), "http://localhost:8080/api/ai-status");
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_http_error() {
        let f = StatusFallback::new("http://127.0.0.1:9", Duration::from_secs(5)).unwrap();
        assert!(matches!(f.fetch_status().await, Err(ClientError::Http(_))));
    }
}
