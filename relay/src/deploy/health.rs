//! Bounded health check polling against an application's preview service

use std::future::Future;
use std::time::{Duration, Instant};

use reqwest::{Client, StatusCode};
use tracing::{debug, error, info};

use crate::app::settings::HealthCheckSettings;
use crate::app::ShutdownSignal;
use crate::errors::RelayError;

/// Health path of back-end services
pub const BACKEND_HEALTH_PATH: &str = "/healthz/healthcheck";

/// Health check retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckPolicy {
    /// Number of requests before giving up, at least 1
    pub max_attempts: u32,

    /// Delay between two requests
    pub interval: Duration,
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 25,
            interval: Duration::from_secs(5),
        }
    }
}

/// How a polling run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthOutcome {
    /// A request answered 200 or 204
    Healthy,
    /// Every attempt failed
    Exhausted,
    /// The shutdown signal fired before a verdict
    Cancelled,
}

/// Result of a polling run together with the limits that were applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthCheckReport {
    pub outcome: HealthOutcome,
    pub attempts: u32,
    pub policy: HealthCheckPolicy,
    pub elapsed: Duration,
}

impl HealthCheckReport {
    pub fn passed(&self) -> bool {
        self.outcome == HealthOutcome::Healthy
    }
}

/// Builds health check URLs for deployed applications
#[derive(Debug, Clone)]
pub struct HealthUrls {
    template: String,
    frontend_apps: Vec<String>,
}

impl HealthUrls {
    pub fn new(template: impl Into<String>, frontend_apps: Vec<String>) -> Self {
        Self {
            template: template.into(),
            frontend_apps,
        }
    }

    /// Front-end applications are checked at their root, everything else at
    /// [`BACKEND_HEALTH_PATH`].
    pub fn health_url(&self, app_name: &str, namespace: &str) -> String {
        let base = self
            .template
            .replace("{app}", app_name)
            .replace("{namespace}", namespace);
        let base = base.trim_end_matches('/');

        if self.frontend_apps.iter().any(|app| app == app_name) {
            format!("{}/", base)
        } else {
            format!("{}{}", base, BACKEND_HEALTH_PATH)
        }
    }
}

/// Health checker for preview services
#[derive(Debug, Clone)]
pub struct HealthChecker {
    client: Client,
    urls: HealthUrls,
    policy: HealthCheckPolicy,
}

impl HealthChecker {
    pub fn new(settings: &HealthCheckSettings, policy: HealthCheckPolicy) -> Result<Self, RelayError> {
        // Health checks rely on the attempt ceiling, not on a request timeout
        let client = Client::builder()
            .build()
            .map_err(|e| RelayError::ConfigError(format!("failed to build health check client: {}", e)))?;

        Ok(Self {
            client,
            urls: HealthUrls::new(
                settings.preview_url_template.clone(),
                settings.frontend_apps.clone(),
            ),
            policy,
        })
    }

    pub fn policy(&self) -> HealthCheckPolicy {
        self.policy
    }

    /// Poll the preview service of `app_name` until healthy, exhausted or cancelled
    pub async fn check_application(
        &self,
        app_name: &str,
        namespace: &str,
        shutdown_signal: ShutdownSignal,
    ) -> HealthCheckReport {
        let url = self.urls.health_url(app_name, namespace);
        poll(
            &self.client,
            &url,
            app_name,
            self.policy,
            tokio::time::sleep,
            shutdown_signal,
        )
        .await
    }
}

/// Run the polling loop
pub async fn poll<S, F>(
    client: &Client,
    url: &str,
    app_name: &str,
    policy: HealthCheckPolicy,
    sleep_fn: S,
    mut shutdown_signal: ShutdownSignal,
) -> HealthCheckReport
where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    let started = Instant::now();
    let report = |outcome, attempts| HealthCheckReport {
        outcome,
        attempts,
        policy,
        elapsed: started.elapsed(),
    };

    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        let response = tokio::select! {
            _ = &mut shutdown_signal => {
                info!("[{}] health check cancelled after {} attempts", app_name, attempts);
                return report(HealthOutcome::Cancelled, attempts);
            }
            response = client.get(url).send() => response,
        };
        attempts += 1;

        match response {
            Ok(resp) if matches!(resp.status(), StatusCode::OK | StatusCode::NO_CONTENT) => {
                info!(
                    "Status Code: {} | [{}] health check success",
                    resp.status().as_u16(),
                    app_name
                );
                return report(HealthOutcome::Healthy, attempts);
            }
            Ok(resp) => {
                info!(
                    "Status Code: {} | [{}] health check retry [{}]",
                    resp.status().as_u16(),
                    app_name,
                    attempts
                );
            }
            Err(e) => {
                info!("[{}] health check retry [{}]: {}", app_name, attempts, e);
            }
        }

        if attempts >= max_attempts {
            error!("[{}] health check fail after {} attempts", app_name, attempts);
            return report(HealthOutcome::Exhausted, attempts);
        }

        debug!("[{}] next health check in {:?}", app_name, policy.interval);
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("[{}] health check cancelled after {} attempts", app_name, attempts);
                return report(HealthOutcome::Cancelled, attempts);
            }
            _ = sleep_fn(policy.interval) => {}
        }
    }
}
