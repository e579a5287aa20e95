//! Deployment orchestrator
//!
//! Runs on a relay server. A deployment event triggers a GitOps sync, waits
//! for the preview service to become healthy and then either notifies the
//! team (non-production) or asks for a human decision (production). The
//! decision callback promotes or aborts the paused rollout.

use std::sync::Arc;

use relay_models::{ApprovalDecision, DeploymentEvent, SlackResponse};
use tracing::{debug, error, info, warn};

use crate::app::ShutdownSignal;
use crate::deploy::approval::approval_values;
use crate::deploy::fsm::{DeploymentLifecycle, LifecycleEvent};
use crate::deploy::health::{HealthCheckReport, HealthChecker, HealthOutcome};
use crate::errors::RelayError;
use crate::http::argocd::GitOpsController;
use crate::http::slack::Notifier;
use crate::slack::messages;
use crate::slack::types::WebhookMessage;

/// How a deployment request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentOutcome {
    /// Non-production deployment synced, healthy and announced
    Completed,
    /// Production deployment healthy, approval request posted
    AwaitingApproval,
    /// Preview service never became healthy
    HealthCheckFailed {
        report: HealthCheckReport,
        notify_error: Option<String>,
    },
}

/// How an approval callback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Promoted,
    Aborted,
    /// The re-check before promotion failed, nothing was promoted
    HealthCheckFailed {
        report: HealthCheckReport,
        notify_error: Option<String>,
    },
}

/// Deployment orchestrator
pub struct Orchestrator {
    gitops: Arc<dyn GitOpsController>,
    notifier: Arc<dyn Notifier>,
    health: HealthChecker,
}

impl Orchestrator {
    pub fn new(
        gitops: Arc<dyn GitOpsController>,
        notifier: Arc<dyn Notifier>,
        health: HealthChecker,
    ) -> Self {
        Self {
            gitops,
            notifier,
            health,
        }
    }

    /// Handle a relayed deployment event.
    ///
    /// Validation, authentication and routing happened upstream.
    pub async fn deploy(
        &self,
        event: &DeploymentEvent,
        shutdown_signal: ShutdownSignal,
    ) -> Result<DeploymentOutcome, RelayError> {
        let app = event.application_name.as_str();
        let mut lifecycle = DeploymentLifecycle::new();
        advance(&mut lifecycle, LifecycleEvent::Authenticate)?;
        advance(&mut lifecycle, LifecycleEvent::Route)?;

        let token = self.gitops.session_token().await?;
        self.gitops.sync_application(&token, app).await?;
        advance(&mut lifecycle, LifecycleEvent::TriggerSync)?;

        advance(&mut lifecycle, LifecycleEvent::StartHealthCheck)?;
        let report = self
            .health
            .check_application(app, &event.application_namespace, shutdown_signal)
            .await;

        match report.outcome {
            HealthOutcome::Cancelled => Err(cancelled(app)),
            HealthOutcome::Exhausted => {
                advance(&mut lifecycle, LifecycleEvent::HealthFailed)?;
                let message = WebhookMessage::new(messages::health_check_failed(app, &report));
                let notify_error = self.notify_best_effort(&event.notify_webhook_url, &message).await;
                advance(&mut lifecycle, LifecycleEvent::Notify)?;
                Ok(DeploymentOutcome::HealthCheckFailed {
                    report,
                    notify_error,
                })
            }
            HealthOutcome::Healthy => {
                advance(&mut lifecycle, LifecycleEvent::HealthPassed)?;
                if event.is_prod() {
                    let (approve, reject) = approval_values(event);
                    let message =
                        WebhookMessage::new(messages::deploy_request(event, &approve, &reject));
                    self.notifier.post(&event.notify_webhook_url, &message).await?;
                    advance(&mut lifecycle, LifecycleEvent::RequestApproval)?;
                    info!("[{}] approval requested", app);
                    Ok(DeploymentOutcome::AwaitingApproval)
                } else {
                    let message = WebhookMessage::new(messages::update_success(event));
                    self.notifier.post(&event.notify_webhook_url, &message).await?;
                    advance(&mut lifecycle, LifecycleEvent::Notify)?;
                    info!("[{}] {} deployment completed", app, event.branch);
                    Ok(DeploymentOutcome::Completed)
                }
            }
        }
    }

    /// Handle an approval decision relayed by the gateway
    pub async fn resolve_approval(
        &self,
        response: &SlackResponse,
        shutdown_signal: ShutdownSignal,
    ) -> Result<ApprovalOutcome, RelayError> {
        let button = &response.button;
        let app = button.application_name.as_str();
        let rollout = button.rollout_name();
        let mut lifecycle = DeploymentLifecycle::awaiting_approval();

        match button.result {
            ApprovalDecision::Approve => {
                advance(&mut lifecycle, LifecycleEvent::Approve)?;
                info!("[{}] approved by {}", app, response.user.name);

                advance(&mut lifecycle, LifecycleEvent::StartHealthCheck)?;
                let report = self
                    .health
                    .check_application(app, &button.application_namespace, shutdown_signal)
                    .await;

                match report.outcome {
                    HealthOutcome::Cancelled => Err(cancelled(app)),
                    HealthOutcome::Exhausted => {
                        advance(&mut lifecycle, LifecycleEvent::HealthFailed)?;
                        let message =
                            WebhookMessage::new(messages::health_check_failed(app, &report))
                                .replacing_original(true);
                        let notify_error =
                            self.notify_best_effort(&response.response_url, &message).await;
                        advance(&mut lifecycle, LifecycleEvent::Notify)?;
                        Ok(ApprovalOutcome::HealthCheckFailed {
                            report,
                            notify_error,
                        })
                    }
                    HealthOutcome::Healthy => {
                        advance(&mut lifecycle, LifecycleEvent::HealthPassed)?;
                        self.run_rollout_action(response, &rollout).await?;
                        advance(&mut lifecycle, LifecycleEvent::Promote)?;
                        self.confirm_decision(response).await?;
                        advance(&mut lifecycle, LifecycleEvent::Notify)?;
                        Ok(ApprovalOutcome::Promoted)
                    }
                }
            }
            ApprovalDecision::Reject => {
                advance(&mut lifecycle, LifecycleEvent::Reject)?;
                info!("[{}] rejected by {}", app, response.user.name);

                self.run_rollout_action(response, &rollout).await?;
                advance(&mut lifecycle, LifecycleEvent::Abort)?;
                self.confirm_decision(response).await?;
                advance(&mut lifecycle, LifecycleEvent::Notify)?;
                Ok(ApprovalOutcome::Aborted)
            }
        }
    }

    async fn run_rollout_action(&self, response: &SlackResponse, rollout: &str) -> Result<(), RelayError> {
        let button = &response.button;
        let namespace = button.application_namespace.as_str();
        let result = match button.result {
            ApprovalDecision::Approve => self.gitops.promote_rollout(rollout, namespace).await,
            ApprovalDecision::Reject => self.gitops.abort_rollout(rollout, namespace).await,
        };

        if let Err(e) = &result {
            error!("[{}] rollout {} failed: {}", rollout, button.result, e);
            let message = WebhookMessage::new(messages::rollout_failed(
                button.result,
                &button.application_name,
                &e.to_string(),
            ));
            // the rollout error is what gets reported
            let _ = self.notify_best_effort(&response.response_url, &message).await;
        }
        result
    }

    /// Replace the approval request with the recorded decision
    async fn confirm_decision(&self, response: &SlackResponse) -> Result<(), RelayError> {
        let message = WebhookMessage::new(messages::decision_recorded(
            response.button.result,
            &response.user.name,
            &response.button.application_name,
        ))
        .replacing_original(true);
        self.notifier.post(&response.response_url, &message).await
    }

    async fn notify_best_effort(&self, webhook_url: &str, message: &WebhookMessage) -> Option<String> {
        match self.notifier.post(webhook_url, message).await {
            Ok(()) => None,
            Err(e) => {
                warn!("Failed to send notification: {}", e);
                Some(e.to_string())
            }
        }
    }
}

fn advance(lifecycle: &mut DeploymentLifecycle, event: LifecycleEvent) -> Result<(), RelayError> {
    let stage = lifecycle
        .process(event)
        .map_err(|e| RelayError::ServerError(e.to_string()))?;
    debug!("Deployment stage: {:?}", stage);
    if lifecycle.is_terminal() {
        info!("Deployment lifecycle settled: {:?}", lifecycle.history());
    }
    Ok(())
}

fn cancelled(app: &str) -> RelayError {
    RelayError::ShutdownError(format!("[{}] health check cancelled by shutdown", app))
}
