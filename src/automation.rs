//! Outbound side of the relay: hands chat turns to the external workflow
//! engine, which answers later through the callback endpoint.

use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::protocol::{OutboundTurn, AUTOMATION_FAILED, AUTOMATION_UNREACHABLE};

/// Result type for automation calls
pub type AutomationResult<T> = Result<T, AutomationError>;

#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("webhook returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("webhook request failed: {0}")]
    Request(String),

    #[error("webhook timed out after {0:?}")]
    Timeout(Duration),
}

impl AutomationError {
    /// Event code reported to the session's listeners
    pub fn code(&self) -> &'static str {
        match self {
            Self::Status { .. } => AUTOMATION_FAILED,
            Self::Request(_) | Self::Timeout(_) => AUTOMATION_UNREACHABLE,
        }
    }
}

/// Anything that can accept a chat turn for asynchronous processing
#[async_trait]
pub trait AutomationClient: Send + Sync {
    /// Hand the turn over. Success only means the engine accepted it; the
    /// answer arrives later via the callback endpoint.
    async fn forward(&self, turn: &OutboundTurn) -> AutomationResult<()>;

    fn name(&self) -> &str;
}

/// Posts turns as JSON to a webhook URL
pub struct WebhookClient {
    url: reqwest::Url,
    timeout: Duration,
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(url: reqwest::Url, timeout: Duration) -> Self {
        Self {
            url,
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

/// Longest webhook error body carried into an error event
const MAX_ERROR_BODY: usize = 200;

#[async_trait]
impl AutomationClient for WebhookClient {
    async fn forward(&self, turn: &OutboundTurn) -> AutomationResult<()> {
        let start = Instant::now();

        let response = tokio::time::timeout(
            self.timeout,
            self.client.post(self.url.clone()).json(turn).send(),
        )
        .await
        .map_err(|_| AutomationError::Timeout(self.timeout))?
        .map_err(|e| AutomationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutomationError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        tracing::debug!(
            session_id = %turn.session_id,
            status = status.as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Webhook accepted turn"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let status = AutomationError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(status.code(), AUTOMATION_FAILED);
        assert!(status.to_string().contains("500"));

        assert_eq!(
            AutomationError::Request("connection refused".to_string()).code(),
            AUTOMATION_UNREACHABLE
        );
        assert_eq!(
            AutomationError::Timeout(Duration::from_secs(1)).code(),
            AUTOMATION_UNREACHABLE
        );
    }

    #[tokio::test]
    async fn test_unreachable_webhook() {
        // Reserve a free port, then release it so nothing is listening there
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let url = reqwest::Url::parse(&format!("http://127.0.0.1:{}/hook", port)).unwrap();
        let client = WebhookClient::new(url, Duration::from_secs(2));
        let turn = OutboundTurn {
            session_id: "abc".to_string(),
            text: "hello".to_string(),
            user_id: None,
            message_id: None,
        };

        let err = client.forward(&turn).await.unwrap_err();
        assert_eq!(err.code(), AUTOMATION_UNREACHABLE);
    }
}
