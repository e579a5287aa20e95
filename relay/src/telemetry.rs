//! Deployment audit trail
//!
//! Every deployment accepted by the gateway is recorded as one structured
//! log entry. With a Datadog API key the entry goes to the Datadog log intake,
//! otherwise it is only written to the local log.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_models::DeploymentEvent;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::settings::{DatadogSettings, Secrets};
use crate::errors::{Operation, RelayError, TransportStage};

const AUDIT_TIMEOUT: Duration = Duration::from_secs(10);
const DD_API_KEY_HEADER: &str = "DD-API-KEY";

/// Deployment audit entry, in the Datadog v2 log intake shape
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub ddsource: String,
    pub ddtags: String,
    pub hostname: String,
    pub service: String,
    pub message: String,
    #[serde(flatten)]
    pub properties: AuditProperties,
}

/// Attributes attached to an audit entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditProperties {
    pub audit_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub date: String,
    pub org: String,
    pub repository: String,
    pub branch: String,
    pub application_name: String,
    pub application_namespace: String,
    pub operator: String,
    pub commit: String,
    pub docker_tag: String,
}

impl AuditEntry {
    pub fn for_deployment(event: &DeploymentEvent, service: &str, hostname: &str) -> Self {
        Self {
            ddsource: "devops-relay".to_string(),
            ddtags: format!("env:{}", event.branch),
            hostname: hostname.to_string(),
            service: service.to_string(),
            message: format!("[{}] {} service deployed.", event.branch, event.application_name),
            properties: AuditProperties {
                audit_id: Uuid::new_v4(),
                recorded_at: Utc::now(),
                date: event.date.clone(),
                org: event.org.clone(),
                repository: event.repo.clone(),
                branch: event.branch.clone(),
                application_name: event.application_name.clone(),
                application_namespace: event.application_namespace.clone(),
                operator: event.operator.clone(),
                commit: event.commit_message.clone(),
                docker_tag: event.docker_tag.clone(),
            },
        }
    }
}

/// Destination of deployment audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), RelayError>;
}

/// Writes audit entries to the local log only
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), RelayError> {
        info!(
            audit_id = %entry.properties.audit_id,
            org = %entry.properties.org,
            operator = %entry.properties.operator,
            "{}",
            entry.message
        );
        Ok(())
    }
}

/// Ships audit entries to the Datadog log intake
pub struct DatadogAuditSink {
    client: Client,
    intake_url: String,
    api_key: SecretString,
}

impl DatadogAuditSink {
    pub fn new(site: &str, api_key: SecretString) -> Result<Self, RelayError> {
        Self::with_intake_url(format!("https://http-intake.logs.{}/api/v2/logs", site), api_key)
    }

    pub fn with_intake_url(intake_url: String, api_key: SecretString) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(AUDIT_TIMEOUT)
            .build()
            .map_err(|e| RelayError::ConfigError(format!("failed to build audit client: {}", e)))?;
        Ok(Self {
            client,
            intake_url,
            api_key,
        })
    }
}

#[async_trait]
impl AuditSink for DatadogAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), RelayError> {
        let operation = Operation::AuditLog;
        let response = self
            .client
            .post(&self.intake_url)
            .header(DD_API_KEY_HEADER, self.api_key.expose_secret())
            .json(&[entry])
            .send()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::Send, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::transport(
                operation,
                TransportStage::Status,
                format!("{}: {}", status, body),
            ));
        }

        debug!("Audit entry {} accepted ({})", entry.properties.audit_id, status);
        Ok(())
    }
}

/// Datadog sink when an API key is configured, log sink otherwise
pub fn audit_sink(settings: &DatadogSettings, secrets: &Secrets) -> Result<Box<dyn AuditSink>, RelayError> {
    match &secrets.datadog_api_key {
        Some(key) => Ok(Box::new(DatadogAuditSink::new(&settings.site, key.clone())?)),
        None => {
            info!("DD_API_KEY is not set, deployment audit goes to the local log only");
            Ok(Box::new(LogAuditSink))
        }
    }
}
