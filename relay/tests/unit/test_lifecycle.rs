//! Deployment lifecycle tests

use devops_relay::deploy::fsm::{DeploymentLifecycle, DeploymentStage, LifecycleEvent};

fn walk(lifecycle: &mut DeploymentLifecycle, events: &[LifecycleEvent]) {
    for event in events {
        lifecycle.process(*event).unwrap();
    }
}

const UNTIL_HEALTH_CHECK: [LifecycleEvent; 4] = [
    LifecycleEvent::Authenticate,
    LifecycleEvent::Route,
    LifecycleEvent::TriggerSync,
    LifecycleEvent::StartHealthCheck,
];

#[test]
fn test_lifecycle_initial_state() {
    let lifecycle = DeploymentLifecycle::new();
    assert_eq!(lifecycle.stage(), DeploymentStage::Received);
    assert_eq!(lifecycle.history(), &[DeploymentStage::Received]);
    assert!(!lifecycle.is_terminal());
}

#[test]
fn test_production_deployment_spans_two_requests() {
    // deployment request
    let mut lifecycle = DeploymentLifecycle::new();
    walk(&mut lifecycle, &UNTIL_HEALTH_CHECK);
    walk(
        &mut lifecycle,
        &[LifecycleEvent::HealthPassed, LifecycleEvent::RequestApproval],
    );
    assert_eq!(lifecycle.stage(), DeploymentStage::AwaitingApproval);
    assert!(lifecycle.is_terminal());

    // approval callback
    let mut lifecycle = DeploymentLifecycle::awaiting_approval();
    walk(
        &mut lifecycle,
        &[
            LifecycleEvent::Approve,
            LifecycleEvent::StartHealthCheck,
            LifecycleEvent::HealthPassed,
            LifecycleEvent::Promote,
            LifecycleEvent::Notify,
        ],
    );
    assert_eq!(
        lifecycle.history(),
        &[
            DeploymentStage::AwaitingApproval,
            DeploymentStage::Approved,
            DeploymentStage::HealthPending,
            DeploymentStage::HealthPassed,
            DeploymentStage::RolloutPromoted,
            DeploymentStage::Notified,
        ]
    );
}

#[test]
fn test_failed_health_check_ends_in_notification() {
    let mut lifecycle = DeploymentLifecycle::new();
    walk(&mut lifecycle, &UNTIL_HEALTH_CHECK);
    walk(
        &mut lifecycle,
        &[LifecycleEvent::HealthFailed, LifecycleEvent::Notify],
    );
    assert_eq!(lifecycle.stage(), DeploymentStage::Notified);

    // no approval after a failure
    let err = lifecycle.process(LifecycleEvent::Approve).unwrap_err();
    assert_eq!(err.from, DeploymentStage::Notified);
    assert_eq!(err.event, LifecycleEvent::Approve);
}

#[test]
fn test_rejection_cannot_promote() {
    let mut lifecycle = DeploymentLifecycle::awaiting_approval();
    lifecycle.process(LifecycleEvent::Reject).unwrap();
    assert!(lifecycle.process(LifecycleEvent::Promote).is_err());
    assert!(lifecycle.process(LifecycleEvent::StartHealthCheck).is_err());

    lifecycle.process(LifecycleEvent::Abort).unwrap();
    assert_eq!(lifecycle.stage(), DeploymentStage::RolloutAborted);
}

#[test]
fn test_invalid_transition_keeps_stage() {
    let mut lifecycle = DeploymentLifecycle::new();
    assert!(lifecycle.process(LifecycleEvent::HealthPassed).is_err());
    assert_eq!(lifecycle.stage(), DeploymentStage::Received);
    assert_eq!(lifecycle.history().len(), 1);
}
