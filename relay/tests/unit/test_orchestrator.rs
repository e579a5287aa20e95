//! End-to-end deployment scenarios on a relay server

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use devops_relay::authn::request_token::RequestAuth;
use devops_relay::deploy::approval::decode_interaction;
use devops_relay::deploy::health::HealthOutcome;
use devops_relay::deploy::orchestrator::{ApprovalOutcome, DeploymentOutcome};
use devops_relay::errors::{Operation, RelayError};
use devops_relay::http::client::{RelayClient, REQUEST_AUTH_HEADER};
use devops_relay::server::{serve::router, state::ServerState};
use devops_relay::slack::messages::{APPROVE_ACTION_ID, REJECT_ACTION_ID};
use futures::FutureExt;
use relay_models::{SlackResponse, StatusResponse};
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::broadcast;
use tower::ServiceExt;

use crate::support::{
    event, eventually_within, hits, never, orchestrator, orchestrator_with_interval, serve_local,
    spawn_preview, FakeGitOps, RecordingNotifier, REQUEST_TOKEN,
};

const RESPONSE_URL: &str = "https://hooks.slack.test/actions/T/1/abc";

fn interaction(value: &str) -> SlackResponse {
    let payload = json!({
        "type": "block_actions",
        "user": { "id": "U123", "username": "alice" },
        "actions": [{ "action_id": "approve", "block_id": "action_block", "value": value }],
        "response_url": RESPONSE_URL
    });
    decode_interaction(&payload.to_string()).unwrap()
}

#[tokio::test]
async fn test_dev_deployment_notifies_without_approval() {
    let (template, health_hits) = spawn_preview("svc1", vec![200]).await;
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), &template, 3);

    let event = event("dev");
    let outcome = orchestrator.deploy(&event, never()).await.unwrap();

    assert_eq!(outcome, DeploymentOutcome::Completed);
    assert_eq!(gitops.calls(), vec!["session", "sync svc1"]);
    assert_eq!(hits(&health_hits), 1);

    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].url, event.notify_webhook_url);
    assert_eq!(posts[0].button_value(APPROVE_ACTION_ID), None);
    assert!(!posts[0].replaces_original());
}

#[tokio::test]
async fn test_exhausted_health_check_answers_internal_error() {
    let (template, health_hits) = spawn_preview("svc1", vec![503]).await;
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), &template, 3);

    let (shutdown_tx, _) = broadcast::channel(1);
    let state = ServerState::new(Arc::new(orchestrator), shutdown_tx);
    let app = router(
        state,
        RequestAuth::new(Some(SecretString::from(REQUEST_TOKEN))),
    );

    let request = Request::post("/update/github")
        .header("content-type", "application/json")
        .header(REQUEST_AUTH_HEADER, REQUEST_TOKEN)
        .body(Body::from(serde_json::to_vec(&event("prod")).unwrap()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: StatusResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.message, "server health check failed");

    assert_eq!(hits(&health_hits), 3);
    assert_eq!(gitops.calls(), vec!["session", "sync svc1"]);

    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].button_value(APPROVE_ACTION_ID), None);
}

#[tokio::test]
async fn test_production_approval_promotes_rollout() {
    let (template, health_hits) = spawn_preview("svc1", vec![200]).await;
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), &template, 3);

    let event = event("prod");
    let outcome = orchestrator.deploy(&event, never()).await.unwrap();
    assert_eq!(outcome, DeploymentOutcome::AwaitingApproval);

    let request = &notifier.posts()[0];
    assert_eq!(request.url, event.notify_webhook_url);
    let approve = request.button_value(APPROVE_ACTION_ID).unwrap();
    let reject = request.button_value(REJECT_ACTION_ID).unwrap();
    assert_eq!(approve, "org-a/prod/svc1/svc1-ns/deploy/approve");
    assert_eq!(reject, "org-a/prod/svc1/svc1-ns/deploy/reject");

    let response = interaction(&approve);
    assert_eq!(response.user.name, "alice");
    let outcome = orchestrator.resolve_approval(&response, never()).await.unwrap();

    assert_eq!(outcome, ApprovalOutcome::Promoted);
    assert_eq!(hits(&health_hits), 2);
    assert_eq!(
        gitops.calls(),
        vec!["session", "sync svc1", "promote svc1-ns/svc1-rollout"]
    );

    let posts = notifier.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].url, RESPONSE_URL);
    assert!(posts[1].replaces_original());
}

#[tokio::test]
async fn test_rejection_aborts_without_recheck() {
    let (template, health_hits) = spawn_preview("svc1", vec![200]).await;
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), &template, 3);

    let response = interaction("org-a/prod/svc1/svc1-ns/deploy/reject");
    let outcome = orchestrator.resolve_approval(&response, never()).await.unwrap();

    assert_eq!(outcome, ApprovalOutcome::Aborted);
    assert_eq!(hits(&health_hits), 0);
    assert_eq!(gitops.calls(), vec!["abort svc1-ns/svc1-rollout"]);

    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].url, RESPONSE_URL);
    assert!(posts[0].replaces_original());
}

#[tokio::test]
async fn test_failed_recheck_skips_promotion() {
    let (template, health_hits) = spawn_preview("svc1", vec![500]).await;
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), &template, 2);

    let response = interaction("org-a/prod/svc1/svc1-ns/deploy/approve");
    let outcome = orchestrator.resolve_approval(&response, never()).await.unwrap();

    match outcome {
        ApprovalOutcome::HealthCheckFailed {
            report,
            notify_error,
        } => {
            assert_eq!(report.outcome, HealthOutcome::Exhausted);
            assert_eq!(report.attempts, 2);
            assert_eq!(notify_error, None);
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(hits(&health_hits), 2);
    assert!(gitops.calls().is_empty());
    assert!(notifier.posts()[0].replaces_original());
}

#[tokio::test]
async fn test_rollout_failure_is_reported() {
    let (template, _) = spawn_preview("svc1", vec![200]).await;
    let gitops = FakeGitOps::failing_rollouts();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), &template, 1);

    let response = interaction("org-a/prod/svc1/svc1-ns/deploy/approve");
    let result = orchestrator.resolve_approval(&response, never()).await;

    assert!(matches!(result, Err(RelayError::ServerError(_))));
    assert_eq!(gitops.calls(), vec!["promote svc1-ns/svc1-rollout"]);
    // failure notice only, no confirmation
    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].body.to_string().contains("Rollout promote failed"));
}

#[tokio::test]
async fn test_shutdown_cancels_health_check() {
    let (template, _) = spawn_preview("svc1", vec![503]).await;
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), &template, 1000);

    let shutdown = tokio::time::sleep(Duration::from_millis(50)).boxed();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        orchestrator.deploy(&event("dev"), shutdown),
    )
    .await
    .unwrap();

    assert!(matches!(result, Err(RelayError::ShutdownError(_))));
    assert!(notifier.posts().is_empty());
}

#[tokio::test]
async fn test_caller_timeout_does_not_cancel_approval() {
    // healthy only after four 300ms intervals, well past the caller timeout
    let (template, health_hits) = spawn_preview("svc1", vec![503, 503, 503, 503, 200]).await;
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator_with_interval(
        gitops.clone(),
        notifier.clone(),
        &template,
        10,
        Duration::from_millis(300),
    );

    let (shutdown_tx, _) = broadcast::channel(1);
    let state = ServerState::new(Arc::new(orchestrator), shutdown_tx);
    let base_url = serve_local(router(
        state,
        RequestAuth::new(Some(SecretString::from(REQUEST_TOKEN))),
    ))
    .await;

    let client = RelayClient::with_timeout(
        Some(SecretString::from(REQUEST_TOKEN)),
        Duration::from_millis(500),
    )
    .unwrap();
    let response = interaction("org-a/prod/svc1/svc1-ns/deploy/approve");
    let result = client
        .post_json(Operation::RelayApproval, &base_url, "update/slack", &response)
        .await;
    assert!(result.is_err(), "caller should time out first");

    let promoted = eventually_within(Duration::from_secs(5), || {
        gitops.calls() == vec!["promote svc1-ns/svc1-rollout"] && notifier.posts().len() == 1
    })
    .await;
    assert!(promoted, "calls: {:?}", gitops.calls());
    assert_eq!(hits(&health_hits), 5);
    assert!(notifier.posts()[0].replaces_original());
}
