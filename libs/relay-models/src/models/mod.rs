//! API models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Branch value that routes to the production environment.
pub const PROD_BRANCH: &str = "prod";

/// Deployment event posted by a CI workflow and relayed to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentEvent {
    pub date: String,
    pub org: String,
    pub operator: String,
    pub repo: String,
    pub docker_tag: String,
    pub commit_message: String,
    /// Incoming webhook used for every notification about this deployment.
    /// CI workflows written against the first relay version send `slack_webhook_url`.
    #[serde(alias = "slack_webhook_url")]
    pub notify_webhook_url: String,
    pub branch: String,
    pub application_name: String,
    pub application_namespace: String,
}

impl DeploymentEvent {
    /// Names of the fields that are empty. An event is only relayed when this is empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("date", &self.date),
            ("org", &self.org),
            ("operator", &self.operator),
            ("repo", &self.repo),
            ("docker_tag", &self.docker_tag),
            ("commit_message", &self.commit_message),
            ("notify_webhook_url", &self.notify_webhook_url),
            ("branch", &self.branch),
            ("application_name", &self.application_name),
            ("application_namespace", &self.application_namespace),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn is_prod(&self) -> bool {
        self.branch == PROD_BRANCH
    }
}

/// Relay health check request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckRequest {
    pub application_name: String,
    pub org: String,
    pub branch: String,
}

/// Outcome chosen by the approver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalDecision {
    Approve,
    Reject,
}

impl ApprovalDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalDecision::Approve => "approve",
            ApprovalDecision::Reject => "reject",
        }
    }
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for approval results other than `approve` and `reject`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown approval result: {0:?}")]
pub struct UnknownDecision(pub String);

impl FromStr for ApprovalDecision {
    type Err = UnknownDecision;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(ApprovalDecision::Approve),
            "reject" => Ok(ApprovalDecision::Reject),
            other => Err(UnknownDecision(other.to_string())),
        }
    }
}

/// Decoded approval button value.
///
/// Positional layout on the wire:
/// `org/branch/application_name/application_namespace/request_type/result`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalToken {
    pub org: String,
    pub branch: String,
    pub application_name: String,
    pub application_namespace: String,
    pub request_type: String,
    pub result: ApprovalDecision,
}

impl ApprovalToken {
    /// Rollout resource name managed by Argo Rollouts for this application.
    pub fn rollout_name(&self) -> String {
        format!("{}-rollout", self.application_name)
    }
}

/// Chat user who clicked an approval button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub id: String,
}

/// Approval callback forwarded from the gateway to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackResponse {
    pub button: ApprovalToken,
    pub user: User,
    pub response_url: String,
}

/// Status of a relay response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failed,
}

/// Body returned by every relay endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub status: ResponseStatus,
}

impl StatusResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error: None,
            status: ResponseStatus::Success,
        }
    }

    pub fn failed(message: impl Into<String>, error: Option<String>) -> Self {
        Self {
            message: message.into(),
            error,
            status: ResponseStatus::Failed,
        }
    }
}

/// Body returned by the server's `/sys/healthcheck`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckMessage {
    pub message: String,
}

/// Body returned by the gateway's `/sys/healthcheck`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub result: String,
    pub status: ResponseStatus,
}
