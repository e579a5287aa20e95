//! Main application run loop

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::app::options::{AppOptions, LifecycleOptions, Role};
use crate::app::settings::Settings;
use crate::authn::request_token::RequestAuth;
use crate::authn::slack_signature::SlackSignatureVerifier;
use crate::deploy::health::HealthChecker;
use crate::deploy::orchestrator::Orchestrator;
use crate::errors::RelayError;
use crate::gateway::{self, state::GatewayState};
use crate::http::argocd::ArgoClient;
use crate::http::client::RelayClient;
use crate::http::slack::SlackWebhookClient;
use crate::routing::resolver::TargetResolver;
use crate::server::{self, serve::serve, state::ServerState};
use crate::telemetry::audit_sink;

/// Run the relay in the configured role until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    settings: Arc<Settings>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), RelayError> {
    info!("Initializing DevOps relay ({})...", options.role);

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    if let Err(e) = init(&options, &settings, shutdown_tx.clone(), &mut shutdown_manager).await {
        error!("Failed to start relay: {}", e);
        shutdown_manager.shutdown().await?;
        return Err(e);
    }

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    settings: &Settings,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), RelayError> {
    settings.validate(options.role)?;

    let app = match options.role {
        Role::Gateway => init_gateway(settings)?,
        Role::Server => init_server(settings, shutdown_tx.clone())?,
    };

    let mut shutdown_rx = shutdown_tx.subscribe();
    let server_handle = serve(&options.server, app, async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_http_server_handle(server_handle)?;
    Ok(())
}

fn request_auth(settings: &Settings) -> RequestAuth {
    if settings.secrets.request_token.is_none() {
        warn!("REQUEST_TOKEN is not set, every authenticated route will answer 401");
    }
    RequestAuth::new(settings.secrets.request_token.clone())
}

fn init_gateway(settings: &Settings) -> Result<Router, RelayError> {
    info!("Initializing gateway routes...");

    let state = GatewayState::new(
        TargetResolver::from_settings(settings),
        RelayClient::new(settings.secrets.request_token.clone())?,
        Arc::new(SlackWebhookClient::new()?),
        Arc::from(audit_sink(&settings.datadog, &settings.secrets)?),
        settings.datadog.clone(),
    );
    let verifier = SlackSignatureVerifier::new(
        settings.secrets.slack_signing_secret.clone(),
        settings.slack.timestamp_tolerance_secs,
    );

    Ok(gateway::serve::router(state, request_auth(settings), verifier))
}

fn init_server(settings: &Settings, shutdown_tx: broadcast::Sender<()>) -> Result<Router, RelayError> {
    info!("Initializing relay server routes...");

    let policy = settings.health_check_policy();
    info!(
        "Health check policy: {} attempts every {:?}",
        policy.max_attempts, policy.interval
    );

    let orchestrator = Orchestrator::new(
        Arc::new(ArgoClient::new(&settings.argo, &settings.secrets)?),
        Arc::new(SlackWebhookClient::new()?),
        HealthChecker::new(&settings.health_check, policy)?,
    );
    let state = ServerState::new(Arc::new(orchestrator), shutdown_tx);

    Ok(server::serve::router(state, request_auth(settings)))
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    http_server_handle: Option<JoinHandle<Result<(), RelayError>>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            http_server_handle: None,
        }
    }

    pub fn with_http_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), RelayError>>,
    ) -> Result<(), RelayError> {
        if self.http_server_handle.is_some() {
            return Err(RelayError::ShutdownError("server_handle already set".to_string()));
        }
        self.http_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), RelayError> {
        // stops the listener and cancels in-flight health checks
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.lifecycle_options.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), RelayError> {
        info!("Shutting down DevOps relay...");

        if let Some(handle) = self.http_server_handle.take() {
            handle
                .await
                .map_err(|e| RelayError::ShutdownError(e.to_string()))??;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
