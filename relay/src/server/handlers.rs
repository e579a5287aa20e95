//! HTTP request handlers of the relay server

use std::future::Future;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_models::{
    DeploymentEvent, HealthCheckMessage, HealthCheckRequest, SlackResponse, StatusResponse,
};
use serde::Serialize;
use tracing::{error, info};

use crate::deploy::orchestrator::{ApprovalOutcome, DeploymentOutcome};
use crate::errors::RelayError;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Liveness handler, shared by both roles
pub async fn health_handler() -> impl IntoResponse {
    let version = version_info();
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "devops-relay".to_string(),
        version: version.version,
    })
}

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Version handler
pub async fn version_handler() -> impl IntoResponse {
    let version = version_info();
    Json(VersionResponse {
        version: version.version,
        git_hash: version.git_hash,
        build_time: version.build_time,
    })
}

/// Parse and validate a deployment event body
pub fn validate_event(
    payload: Result<Json<DeploymentEvent>, JsonRejection>,
) -> Result<DeploymentEvent, RelayError> {
    let Json(event) = payload.map_err(|e| RelayError::BadRequest(e.body_text()))?;
    let missing = event.missing_fields();
    if !missing.is_empty() {
        return Err(RelayError::ValidationError(format!(
            "missing fields: {}",
            missing.join(", ")
        )));
    }
    Ok(event)
}

/// Run orchestration work on its own task.
///
/// A caller that times out or disconnects drops the handler future, the task
/// still runs to completion. Only the shutdown signal stops it early.
async fn run_detached<T, F>(work: F) -> Result<T, RelayError>
where
    F: Future<Output = Result<T, RelayError>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(work)
        .await
        .map_err(|e| RelayError::ServerError(format!("orchestration task failed: {}", e)))?
}

fn health_check_failed(notify_error: Option<String>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(StatusResponse::failed("server health check failed", notify_error)),
    )
        .into_response()
}

/// Deployment event relayed by the gateway
pub async fn deployment_handler(
    State(state): State<ServerState>,
    payload: Result<Json<DeploymentEvent>, JsonRejection>,
) -> Response {
    let event = match validate_event(payload) {
        Ok(event) => event,
        Err(e) => {
            error!("Rejected deployment event: {}", e);
            return e.into_response();
        }
    };
    let app = event.application_name.clone();
    info!("[{}] deployment requested by {} on {}", app, event.operator, event.branch);

    let orchestrator = state.orchestrator.clone();
    let shutdown_signal = state.shutdown_signal();
    let outcome =
        run_detached(async move { orchestrator.deploy(&event, shutdown_signal).await }).await;

    match outcome {
        Ok(DeploymentOutcome::Completed) => {
            Json(StatusResponse::success(format!("{} | Sync success.", app))).into_response()
        }
        Ok(DeploymentOutcome::AwaitingApproval) => {
            Json(StatusResponse::success(format!("{} | Approval requested.", app))).into_response()
        }
        Ok(DeploymentOutcome::HealthCheckFailed { notify_error, .. }) => {
            health_check_failed(notify_error)
        }
        Err(e) => {
            error!("[{}] deployment failed: {}", app, e);
            e.into_response()
        }
    }
}

/// Approval decision relayed by the gateway
pub async fn approval_handler(
    State(state): State<ServerState>,
    payload: Result<Json<SlackResponse>, JsonRejection>,
) -> Response {
    let response = match payload {
        Ok(Json(response)) => response,
        Err(e) => return RelayError::BadRequest(e.body_text()).into_response(),
    };
    let app = response.button.application_name.clone();

    let orchestrator = state.orchestrator.clone();
    let shutdown_signal = state.shutdown_signal();
    let outcome = run_detached(async move {
        orchestrator
            .resolve_approval(&response, shutdown_signal)
            .await
    })
    .await;

    match outcome {
        Ok(ApprovalOutcome::Promoted) => {
            Json(StatusResponse::success(format!("{} | Rollout promoted.", app))).into_response()
        }
        Ok(ApprovalOutcome::Aborted) => {
            Json(StatusResponse::success(format!("{} | Rollout aborted.", app))).into_response()
        }
        Ok(ApprovalOutcome::HealthCheckFailed { notify_error, .. }) => {
            health_check_failed(notify_error)
        }
        Err(e) => {
            error!("[{}] approval handling failed: {}", app, e);
            e.into_response()
        }
    }
}

/// Reachability check relayed by the gateway
pub async fn sys_healthcheck_handler(
    payload: Result<Json<HealthCheckRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => Json(HealthCheckMessage {
            message: format!(
                "Service Name: {}, Org: {}, Branch: {}",
                request.application_name, request.org, request.branch
            ),
        })
        .into_response(),
        Err(e) => RelayError::BadRequest(e.body_text()).into_response(),
    }
}
