//! Approval callbacks answered by the relay server over HTTP

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use devops_relay::authn::request_token::RequestAuth;
use devops_relay::http::client::REQUEST_AUTH_HEADER;
use devops_relay::server::{serve::router, state::ServerState};
use relay_models::{ResponseStatus, StatusResponse};
use secrecy::SecretString;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use crate::support::{hits, orchestrator, spawn_preview, FakeGitOps, RecordingNotifier, REQUEST_TOKEN};

fn server(template: &str, max_attempts: u32) -> (Router, Arc<FakeGitOps>, Arc<RecordingNotifier>) {
    let gitops = FakeGitOps::new();
    let notifier = RecordingNotifier::new();
    let orchestrator = orchestrator(gitops.clone(), notifier.clone(), template, max_attempts);

    let (shutdown_tx, _) = broadcast::channel(1);
    let state = ServerState::new(Arc::new(orchestrator), shutdown_tx);
    let app = router(
        state,
        RequestAuth::new(Some(SecretString::from(REQUEST_TOKEN))),
    );
    (app, gitops, notifier)
}

fn approval(result: &str) -> Value {
    json!({
        "button": {
            "org": "org-a",
            "branch": "prod",
            "application_name": "svc1",
            "application_namespace": "svc1-ns",
            "request_type": "deploy",
            "result": result
        },
        "user": { "name": "alice", "id": "U123" },
        "response_url": "https://hooks.slack.test/actions/T/1/abc"
    })
}

async fn post_approval(app: Router, body: Value) -> (StatusCode, StatusResponse) {
    let request = Request::post("/update/slack")
        .header("content-type", "application/json")
        .header(REQUEST_AUTH_HEADER, REQUEST_TOKEN)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_unknown_result_is_bad_request() {
    let (template, health_hits) = spawn_preview("svc1", vec![200]).await;
    let (app, gitops, notifier) = server(&template, 3);

    let (status, body) = post_approval(app, approval("maybe")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.status, ResponseStatus::Failed);
    assert_eq!(hits(&health_hits), 0);
    assert!(gitops.calls().is_empty());
    assert!(notifier.posts().is_empty());
}

#[tokio::test]
async fn test_exhausted_recheck_is_internal_error() {
    let (template, health_hits) = spawn_preview("svc1", vec![500]).await;
    let (app, gitops, notifier) = server(&template, 2);

    let (status, body) = post_approval(app, approval("approve")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.status, ResponseStatus::Failed);
    assert_eq!(body.message, "server health check failed");
    assert_eq!(hits(&health_hits), 2);
    assert!(gitops.calls().is_empty());
    // the failure notice replaces the approval request
    let posts = notifier.posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].replaces_original());
}

#[tokio::test]
async fn test_approval_promotes_and_answers_ok() {
    let (template, health_hits) = spawn_preview("svc1", vec![200]).await;
    let (app, gitops, notifier) = server(&template, 3);

    let (status, body) = post_approval(app, approval("approve")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.status, ResponseStatus::Success);
    assert_eq!(body.message, "svc1 | Rollout promoted.");
    assert_eq!(hits(&health_hits), 1);
    assert_eq!(gitops.calls(), vec!["promote svc1-ns/svc1-rollout"]);
    assert_eq!(notifier.posts().len(), 1);
}
