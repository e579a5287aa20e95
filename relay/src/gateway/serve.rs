//! Gateway routes

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::authn::request_token::{require_request_token, RequestAuth};
use crate::authn::slack_signature::{verify_slack_signature, SlackSignatureVerifier};
use crate::gateway::handlers::{github_update_handler, slack_deploy_handler, sys_healthcheck_handler};
use crate::gateway::state::GatewayState;
use crate::server::handlers::{health_handler, version_handler};

/// Routes of the gateway
pub fn router(state: GatewayState, auth: RequestAuth, verifier: SlackSignatureVerifier) -> Router {
    let ci = Router::new()
        .route("/v2/github/update", post(github_update_handler))
        .route("/sys/healthcheck", post(sys_healthcheck_handler))
        .route_layer(from_fn_with_state(auth, require_request_token));

    let slack = Router::new()
        .route("/v2/slack/deploy", post(slack_deploy_handler))
        .route_layer(from_fn_with_state(verifier, verify_slack_signature));

    Router::new()
        .route("/healthz/healthcheck", get(health_handler))
        .route("/version", get(version_handler))
        .merge(ci)
        .merge(slack)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}
