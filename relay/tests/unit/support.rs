//! Fakes and fixtures shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{http::StatusCode, routing::get, Router};
use devops_relay::app::settings::HealthCheckSettings;
use devops_relay::app::ShutdownSignal;
use devops_relay::deploy::health::{HealthCheckPolicy, HealthChecker, BACKEND_HEALTH_PATH};
use devops_relay::deploy::orchestrator::Orchestrator;
use devops_relay::errors::RelayError;
use devops_relay::http::argocd::GitOpsController;
use devops_relay::http::slack::Notifier;
use devops_relay::slack::types::WebhookMessage;
use devops_relay::telemetry::{AuditEntry, AuditSink};
use devops_relay::utils::HmacSha256;
use futures::FutureExt;
use hmac::Mac;
use relay_models::DeploymentEvent;
use secrecy::SecretString;
use serde_json::Value;
use tokio::net::TcpListener;

pub const REQUEST_TOKEN: &str = "relay-shared-token";

pub fn event(branch: &str) -> DeploymentEvent {
    DeploymentEvent {
        date: "2025-01-01 10:00:00".to_string(),
        org: "org-a".to_string(),
        operator: "octocat".to_string(),
        repo: "svc1".to_string(),
        docker_tag: "v1.2.3".to_string(),
        commit_message: "fix: retry on timeout".to_string(),
        notify_webhook_url: "https://hooks.slack.test/services/T/B/X".to_string(),
        branch: branch.to_string(),
        application_name: "svc1".to_string(),
        application_namespace: "svc1-ns".to_string(),
    }
}

pub fn never() -> ShutdownSignal {
    futures::future::pending().boxed()
}

// ================================ GITOPS ======================================= //

/// Records every controller call as a short string
#[derive(Default)]
pub struct FakeGitOps {
    calls: Mutex<Vec<String>>,
    fail_rollouts: bool,
}

impl FakeGitOps {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_rollouts() -> Arc<Self> {
        Arc::new(Self {
            fail_rollouts: true,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn rollout(&self, action: &str, rollout: &str, namespace: &str) -> Result<(), RelayError> {
        self.record(format!("{} {}/{}", action, namespace, rollout));
        if self.fail_rollouts {
            return Err(RelayError::ServerError(format!("{} rejected", action)));
        }
        Ok(())
    }
}

#[async_trait]
impl GitOpsController for FakeGitOps {
    async fn session_token(&self) -> Result<SecretString, RelayError> {
        self.record("session".to_string());
        Ok(SecretString::from("session-token"))
    }

    async fn sync_application(
        &self,
        _token: &SecretString,
        application_name: &str,
    ) -> Result<(), RelayError> {
        self.record(format!("sync {}", application_name));
        Ok(())
    }

    async fn promote_rollout(&self, rollout: &str, namespace: &str) -> Result<(), RelayError> {
        self.rollout("promote", rollout, namespace)
    }

    async fn abort_rollout(&self, rollout: &str, namespace: &str) -> Result<(), RelayError> {
        self.rollout("abort", rollout, namespace)
    }
}

// =============================== NOTIFIER ====================================== //

#[derive(Debug, Clone)]
pub struct Post {
    pub url: String,
    pub body: Value,
}

impl Post {
    pub fn replaces_original(&self) -> bool {
        self.body["replace_original"] == Value::Bool(true)
    }

    /// Value of the button with `action_id`, if the message carries one
    pub fn button_value(&self, action_id: &str) -> Option<String> {
        self.body["blocks"]
            .as_array()?
            .iter()
            .filter(|block| block["type"] == "actions")
            .filter_map(|block| block["elements"].as_array())
            .flatten()
            .find(|element| element["action_id"] == action_id)
            .and_then(|element| element["value"].as_str())
            .map(str::to_string)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    posts: Mutex<Vec<Post>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post(&self, webhook_url: &str, message: &WebhookMessage) -> Result<(), RelayError> {
        let body = serde_json::to_value(message).unwrap();
        self.posts.lock().unwrap().push(Post {
            url: webhook_url.to_string(),
            body,
        });
        Ok(())
    }
}

// ================================= AUDIT ======================================= //

#[derive(Default)]
pub struct RecordingAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAudit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, entry: &AuditEntry) -> Result<(), RelayError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

// ============================= PREVIEW SERVICE ================================= //

/// Preview service of `app` answering `statuses` in order, repeating the last one.
///
/// Returns a preview URL template pointing at the stub and the hit counter.
pub async fn spawn_preview(app: &str, statuses: Vec<u16>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        &format!("/{}{}", app, BACKEND_HEALTH_PATH),
        get(move || {
            let counter = counter.clone();
            let statuses = statuses.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let code = statuses.get(n).or(statuses.last()).copied().unwrap_or(500);
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}/{{app}}", addr), hits)
}

pub fn hits(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}

pub fn orchestrator(
    gitops: Arc<FakeGitOps>,
    notifier: Arc<RecordingNotifier>,
    preview_url_template: &str,
    max_attempts: u32,
) -> Orchestrator {
    orchestrator_with_interval(
        gitops,
        notifier,
        preview_url_template,
        max_attempts,
        Duration::from_millis(10),
    )
}

pub fn orchestrator_with_interval(
    gitops: Arc<FakeGitOps>,
    notifier: Arc<RecordingNotifier>,
    preview_url_template: &str,
    max_attempts: u32,
    interval: Duration,
) -> Orchestrator {
    let settings = HealthCheckSettings {
        preview_url_template: preview_url_template.to_string(),
        ..Default::default()
    };
    let policy = HealthCheckPolicy {
        max_attempts,
        interval,
    };
    Orchestrator::new(
        gitops,
        notifier,
        HealthChecker::new(&settings, policy).unwrap(),
    )
}

/// Poll `condition` until it holds or a second has passed
pub async fn eventually<F>(condition: F) -> bool
where
    F: FnMut() -> bool,
{
    eventually_within(Duration::from_secs(1), condition).await
}

/// Poll `condition` every 10ms until it holds or `limit` has passed
pub async fn eventually_within<F>(limit: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// `X-Slack-Signature` value for a timestamp and raw body
pub fn slack_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(format!("v0:{}:", timestamp).as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve_local(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}
