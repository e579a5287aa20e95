//! Slack webhook client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use crate::errors::RelayError;
use crate::slack::types::WebhookMessage;

/// Timeout for webhook posts
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers chat notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `message` to an incoming webhook or an interaction `response_url`
    async fn post(&self, webhook_url: &str, message: &WebhookMessage) -> Result<(), RelayError>;
}

/// Notifier backed by Slack incoming webhooks
#[derive(Clone)]
pub struct SlackWebhookClient {
    client: Client,
}

impl SlackWebhookClient {
    pub fn new() -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|e| RelayError::ConfigError(format!("failed to build slack client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Notifier for SlackWebhookClient {
    async fn post(&self, webhook_url: &str, message: &WebhookMessage) -> Result<(), RelayError> {
        if webhook_url.is_empty() {
            return Err(RelayError::NotifyError("slack webhook url is empty".to_string()));
        }

        debug!("Posting {} blocks to slack webhook", message.blocks.len());
        let response = self
            .client
            .post(webhook_url)
            .json(message)
            .send()
            .await
            .map_err(|e| RelayError::NotifyError(format!("failed to post slack webhook: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Slack webhook failed: {} - {}", status, body);
            return Err(RelayError::NotifyError(format!(
                "slack webhook answered {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}
