//! ArgoCD and Argo Rollouts client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::app::settings::{ArgoSettings, Secrets};
use crate::errors::{Operation, RelayError, TransportStage};
use crate::utils::join_url;

/// Timeout for GitOps controller calls
pub const ARGO_TIMEOUT: Duration = Duration::from_secs(10);

/// GitOps controller operations used by the orchestrator
#[async_trait]
pub trait GitOpsController: Send + Sync {
    /// Obtain a short-lived session token
    async fn session_token(&self) -> Result<SecretString, RelayError>;

    /// Trigger a sync of `application_name`
    async fn sync_application(
        &self,
        token: &SecretString,
        application_name: &str,
    ) -> Result<(), RelayError>;

    /// Promote a paused rollout
    async fn promote_rollout(&self, rollout: &str, namespace: &str) -> Result<(), RelayError>;

    /// Abort a paused rollout
    async fn abort_rollout(&self, rollout: &str, namespace: &str) -> Result<(), RelayError>;
}

#[derive(Serialize)]
struct SessionRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(default)]
    token: Option<String>,
}

#[derive(Serialize)]
struct RolloutRequest<'a> {
    name: &'a str,
    namespace: &'a str,
}

/// HTTP client for ArgoCD and the Argo Rollouts dashboard
pub struct ArgoClient {
    client: Client,
    argocd_url: String,
    rollouts_url: String,
    username: String,
    password: SecretString,
}

impl ArgoClient {
    pub fn new(settings: &ArgoSettings, secrets: &Secrets) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(ARGO_TIMEOUT)
            .build()
            .map_err(|e| RelayError::ConfigError(format!("failed to build argo client: {}", e)))?;

        Ok(Self {
            client,
            argocd_url: settings.argocd_url.clone(),
            rollouts_url: settings.rollouts_url.clone(),
            username: secrets.argo_username.clone().unwrap_or_default(),
            password: secrets
                .argo_password
                .clone()
                .unwrap_or_else(|| SecretString::from("")),
        })
    }

    async fn rollout_action(
        &self,
        operation: Operation,
        action: &str,
        rollout: &str,
        namespace: &str,
    ) -> Result<(), RelayError> {
        let url = join_url(
            &self.rollouts_url,
            &format!("api/v1/rollouts/{}/{}/{}", namespace, rollout, action),
        );
        debug!("PUT {}", url);

        let response = self
            .client
            .request(Method::PUT, &url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .json(&RolloutRequest {
                name: rollout,
                namespace,
            })
            .send()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::Send, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::ReadBody, e))?;

        if !status.is_success() {
            return Err(RelayError::transport(
                operation,
                TransportStage::Status,
                format!("{}: {}", status, body),
            ));
        }

        info!("[{}/{}] rollout {} requested", namespace, rollout, action);
        Ok(())
    }
}

#[async_trait]
impl GitOpsController for ArgoClient {
    async fn session_token(&self) -> Result<SecretString, RelayError> {
        let operation = Operation::ArgoSession;
        let url = join_url(&self.argocd_url, "api/v1/session");
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .json(&SessionRequest {
                username: &self.username,
                password: self.password.expose_secret(),
            })
            .send()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::Send, e))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::ReadBody, e))?;
        let session: SessionResponse = serde_json::from_slice(&body)
            .map_err(|e| RelayError::transport(operation, TransportStage::Unmarshal, e))?;

        match session.token {
            Some(token) if !token.is_empty() => Ok(SecretString::from(token)),
            _ => Err(RelayError::transport(
                operation,
                TransportStage::Unmarshal,
                format!("no session token in response ({})", status),
            )),
        }
    }

    async fn sync_application(
        &self,
        token: &SecretString,
        application_name: &str,
    ) -> Result<(), RelayError> {
        let operation = Operation::ArgoSync;
        let url = join_url(
            &self.argocd_url,
            &format!("api/v1/applications/{}/sync", application_name),
        );
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .bearer_auth(token.expose_secret())
            .send()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::Send, e))?;

        // The health check confirms the sync, the answer is only logged
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::ReadBody, e))?;
        if status.is_success() {
            info!("[{}] sync requested", application_name);
        } else {
            warn!("[{}] sync answered {}: {}", application_name, status, body);
        }
        Ok(())
    }

    async fn promote_rollout(&self, rollout: &str, namespace: &str) -> Result<(), RelayError> {
        self.rollout_action(Operation::RolloutPromote, "promote", rollout, namespace)
            .await
    }

    async fn abort_rollout(&self, rollout: &str, namespace: &str) -> Result<(), RelayError> {
        self.rollout_action(Operation::RolloutAbort, "abort", rollout, namespace)
            .await
    }
}
