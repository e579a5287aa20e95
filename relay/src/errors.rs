//! Error types for the DevOps relay

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_models::StatusResponse;
use thiserror::Error;

/// Outbound operations, used to tag transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RelayDeployment,
    RelayApproval,
    RelayHealthCheck,
    ArgoSession,
    ArgoSync,
    RolloutPromote,
    RolloutAbort,
    AuditLog,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::RelayDeployment => "relay_deployment",
            Operation::RelayApproval => "relay_approval",
            Operation::RelayHealthCheck => "relay_health_check",
            Operation::ArgoSession => "argo_session",
            Operation::ArgoSync => "argo_sync",
            Operation::RolloutPromote => "rollout_promote",
            Operation::RolloutAbort => "rollout_abort",
            Operation::AuditLog => "audit_log",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of an outbound call that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStage {
    Marshal,
    Build,
    Send,
    ReadBody,
    Status,
    Unmarshal,
}

impl std::fmt::Display for TransportStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            TransportStage::Marshal => "failed to marshal payload",
            TransportStage::Build => "failed to create request",
            TransportStage::Send => "failed to send request",
            TransportStage::ReadBody => "failed to read response body",
            TransportStage::Status => "unexpected response status",
            TransportStage::Unmarshal => "failed to unmarshal response body",
        };
        f.write_str(stage)
    }
}

/// Main error type for the DevOps relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Routing error: {0}")]
    RoutingError(String),

    #[error("{operation} | {stage}: {detail}")]
    TransportError {
        operation: Operation,
        stage: TransportStage,
        detail: String,
    },

    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Notification error: {0}")]
    NotifyError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

impl RelayError {
    pub fn transport(
        operation: Operation,
        stage: TransportStage,
        detail: impl std::fmt::Display,
    ) -> Self {
        RelayError::TransportError {
            operation,
            stage,
            detail: detail.to_string(),
        }
    }

    /// HTTP status for endpoints that map failures conventionally
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::AuthError(_) => StatusCode::UNAUTHORIZED,
            RelayError::BadRequest(_)
            | RelayError::ValidationError(_)
            | RelayError::RoutingError(_)
            | RelayError::DecodeError(_) => StatusCode::BAD_REQUEST,
            RelayError::TransportError { .. }
            | RelayError::NotifyError(_)
            | RelayError::ConfigError(_)
            | RelayError::ServerError(_)
            | RelayError::ShutdownError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short, client-facing summary of the failure
    pub fn summary(&self) -> &'static str {
        match self {
            RelayError::AuthError(_) => "Unauthorized request. Check your request.",
            RelayError::BadRequest(_) => "failed to get service info",
            RelayError::ValidationError(_) => "invalid service info",
            RelayError::RoutingError(_) => "failed to get target server endpoint",
            RelayError::TransportError { .. } => "failed to relay request",
            RelayError::DecodeError(_) => "failed to parse payload",
            RelayError::NotifyError(_) => "failed to send notification",
            RelayError::ConfigError(_) => "relay is not configured",
            RelayError::ServerError(_) | RelayError::ShutdownError(_) => "internal server error",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = StatusResponse::failed(self.summary(), Some(self.to_string()));
        (status, Json(body)).into_response()
    }
}
