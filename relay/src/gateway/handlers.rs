//! HTTP request handlers of the gateway

use axum::{
    extract::{
        rejection::{FormRejection, JsonRejection},
        State,
    },
    response::{IntoResponse, Response},
    Form, Json,
};
use http::StatusCode;
use relay_models::{
    DeploymentEvent, HealthCheckMessage, HealthCheckRequest, HealthCheckResult, ResponseStatus,
    SlackResponse, StatusResponse,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::deploy::approval::decode_interaction;
use crate::errors::{Operation, RelayError};
use crate::gateway::state::GatewayState;
use crate::http::client::RelayResponse;
use crate::server::handlers::validate_event;
use crate::slack::messages;
use crate::slack::types::WebhookMessage;
use crate::telemetry::AuditEntry;

/// Form body of a Slack interaction callback
#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    #[serde(default)]
    pub payload: String,
}

/// Relay server answer as a gateway response, keeping the server's status code
fn relayed_failure(response: &RelayResponse) -> Response {
    let body = serde_json::from_slice::<StatusResponse>(&response.body).unwrap_or_else(|_| {
        StatusResponse::failed(
            "relay server request failed",
            Some(String::from_utf8_lossy(&response.body).into_owned()),
        )
    });
    (response.status, Json(body)).into_response()
}

/// CI deployment event
pub async fn github_update_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<DeploymentEvent>, JsonRejection>,
) -> Response {
    match relay_deployment(&state, payload).await {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to relay deployment event: {}", e);
            e.into_response()
        }
    }
}

async fn relay_deployment(
    state: &GatewayState,
    payload: Result<Json<DeploymentEvent>, JsonRejection>,
) -> Result<Response, RelayError> {
    let event = validate_event(payload)?;
    let target = state.resolver.resolve(&event.org, &event.branch)?;
    info!(
        "[{}] relaying deployment to {} ({})",
        event.application_name,
        target.base_url,
        target.environment.as_str()
    );

    let response = state
        .relay
        .post_json(Operation::RelayDeployment, &target.base_url, "update/github", &event)
        .await?;

    if !response.status.is_success() {
        warn!(
            "[{}] relay server answered {}",
            event.application_name, response.status
        );
        return Ok(relayed_failure(&response));
    }

    let entry = AuditEntry::for_deployment(&event, &state.datadog.service, &state.datadog.hostname);
    let audit = state.audit.clone();
    tokio::spawn(async move {
        if let Err(e) = audit.record(&entry).await {
            warn!("Failed to record deployment audit: {}", e);
        }
    });

    Ok(Json(StatusResponse::success(format!(
        "{} | Sync success.",
        event.application_name
    )))
    .into_response())
}

/// Slack approval button callback.
///
/// Always answers 200, Slack treats anything else as an outage.
pub async fn slack_deploy_handler(
    State(state): State<GatewayState>,
    form: Result<Form<InteractionForm>, FormRejection>,
) -> Response {
    let raw_payload = match form {
        Ok(Form(form)) => form.payload,
        Err(e) => {
            warn!("Failed to read slack form: {}", e);
            String::new()
        }
    };

    let response = match decode_interaction(&raw_payload) {
        Ok(response) => response,
        Err(e) => {
            error!("Failed to parse slack payload: {}", e);
            return Json(StatusResponse::failed("failed to parse payload", Some(e.to_string())))
                .into_response();
        }
    };
    debug!("Slack decision: {:?}", response.button);

    let button = &response.button;
    let target = match state.resolver.resolve(&button.org, &button.branch) {
        Ok(target) => target,
        Err(e) => {
            error!("Failed to get target server: {}", e);
            return Json(StatusResponse::failed(
                "failed to get target server endpoint",
                Some(e.to_string()),
            ))
            .into_response();
        }
    };
    info!("[{}] {} decision goes to {}", button.application_name, button.result, target.base_url);

    // the relay server takes a while, so acknowledge in chat first
    let ack = WebhookMessage::new(messages::decision_in_progress(
        button.result,
        &response.user.name,
        &button.application_name,
    ))
    .replacing_original(true);
    if let Err(e) = state.notifier.post(&response.response_url, &ack).await {
        warn!("Failed to acknowledge slack decision: {}", e);
    }

    let message = format!("{} | {} received.", button.application_name, button.result);
    tokio::spawn(forward_decision(state, target.base_url, response));

    Json(StatusResponse::success(message)).into_response()
}

async fn forward_decision(state: GatewayState, base_url: String, response: SlackResponse) {
    let app = response.button.application_name.clone();
    match state
        .relay
        .post_json(Operation::RelayApproval, &base_url, "update/slack", &response)
        .await
    {
        Ok(relayed) if relayed.status.is_success() => {
            info!("[{}] decision handled by relay server", app);
        }
        Ok(relayed) => {
            warn!(
                "[{}] relay server answered {}: {}",
                app,
                relayed.status,
                String::from_utf8_lossy(&relayed.body)
            );
        }
        Err(e) => error!("[{}] failed to relay decision: {}", app, e),
    }
}

/// Reachability check of a relay server
pub async fn sys_healthcheck_handler(
    State(state): State<GatewayState>,
    payload: Result<Json<HealthCheckRequest>, JsonRejection>,
) -> Response {
    match relay_healthcheck(&state, payload).await {
        Ok(response) => response,
        Err(e) => {
            error!("Relay health check failed: {}", e);
            e.into_response()
        }
    }
}

async fn relay_healthcheck(
    state: &GatewayState,
    payload: Result<Json<HealthCheckRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Json(request) = payload.map_err(|e| RelayError::BadRequest(e.body_text()))?;
    let target = state.resolver.resolve(&request.org, &request.branch)?;

    let response = state
        .relay
        .post_json(Operation::RelayHealthCheck, &target.base_url, "sys/healthcheck", &request)
        .await?;
    let message: HealthCheckMessage = response.json(Operation::RelayHealthCheck)?;

    let status = if response.status == StatusCode::OK {
        ResponseStatus::Success
    } else {
        ResponseStatus::Failed
    };
    Ok((
        response.status,
        Json(HealthCheckResult {
            result: message.message,
            status,
        }),
    )
        .into_response())
}
