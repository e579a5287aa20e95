//! HTTP server setup

use std::future::Future;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::authn::request_token::{require_request_token, RequestAuth};
use crate::errors::RelayError;
use crate::server::handlers::{
    approval_handler, deployment_handler, health_handler, sys_healthcheck_handler,
    version_handler,
};
use crate::server::state::ServerState;

/// Routes of the relay server
pub fn router(state: ServerState, auth: RequestAuth) -> Router {
    let relayed = Router::new()
        .route("/update/github", post(deployment_handler))
        .route("/update/slack", post(approval_handler))
        .route("/sys/healthcheck", post(sys_healthcheck_handler))
        .route_layer(from_fn_with_state(auth, require_request_token));

    Router::new()
        .route("/healthz/healthcheck", get(health_handler))
        .route("/version", get(version_handler))
        .merge(relayed)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    app: Router,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), RelayError>>, RelayError> {
    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| RelayError::ServerError(format!("failed to bind {}: {}", addr, e)))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| RelayError::ServerError(e.to_string()))
    });

    Ok(handle)
}
