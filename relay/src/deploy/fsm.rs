//! Finite state machine for a deployment lifecycle
//!
//! Nothing is persisted: a deployment request walks the machine from
//! `Received` and an approval callback resumes it at `AwaitingApproval`
//! from the context carried by the approval token.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Deployment stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStage {
    Received,
    Authenticated,
    Routed,
    SyncTriggered,
    HealthPending,
    HealthPassed,
    HealthFailed,
    AwaitingApproval,
    Approved,
    Rejected,
    RolloutPromoted,
    RolloutAborted,
    Notified,
}

/// Lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Authenticate,
    Route,
    TriggerSync,
    StartHealthCheck,
    HealthPassed,
    HealthFailed,
    RequestApproval,
    Approve,
    Reject,
    Promote,
    Abort,
    Notify,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid transition: {from:?} -> {event:?}")]
pub struct InvalidTransition {
    pub from: DeploymentStage,
    pub event: LifecycleEvent,
}

/// Deployment lifecycle
#[derive(Debug, Clone)]
pub struct DeploymentLifecycle {
    stage: DeploymentStage,
    approved: bool,
    history: Vec<DeploymentStage>,
}

impl DeploymentLifecycle {
    /// Create a new lifecycle in the received stage
    pub fn new() -> Self {
        Self::starting_at(DeploymentStage::Received)
    }

    /// Resume a production deployment waiting on a human decision
    pub fn awaiting_approval() -> Self {
        Self::starting_at(DeploymentStage::AwaitingApproval)
    }

    fn starting_at(stage: DeploymentStage) -> Self {
        Self {
            stage,
            approved: false,
            history: vec![stage],
        }
    }

    pub fn stage(&self) -> DeploymentStage {
        self.stage
    }

    /// Every stage visited, in order
    pub fn history(&self) -> &[DeploymentStage] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.stage,
            DeploymentStage::Notified | DeploymentStage::AwaitingApproval
        )
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: LifecycleEvent) -> Result<DeploymentStage, InvalidTransition> {
        use DeploymentStage as S;
        use LifecycleEvent as E;

        let next = match (self.stage, event) {
            (S::Received, E::Authenticate) => S::Authenticated,
            (S::Authenticated, E::Route) => S::Routed,
            (S::Routed, E::TriggerSync) => S::SyncTriggered,
            (S::SyncTriggered, E::StartHealthCheck) => S::HealthPending,

            (S::HealthPending, E::HealthPassed) => S::HealthPassed,
            (S::HealthPending, E::HealthFailed) => S::HealthFailed,

            // first pass of a production deployment
            (S::HealthPassed, E::RequestApproval) if !self.approved => S::AwaitingApproval,
            // re-check after approval
            (S::HealthPassed, E::Promote) if self.approved => S::RolloutPromoted,
            (S::HealthPassed, E::Notify) if !self.approved => S::Notified,

            (S::AwaitingApproval, E::Approve) => {
                self.approved = true;
                S::Approved
            }
            (S::AwaitingApproval, E::Reject) => S::Rejected,
            (S::Approved, E::StartHealthCheck) => S::HealthPending,
            (S::Rejected, E::Abort) => S::RolloutAborted,

            (S::HealthFailed, E::Notify)
            | (S::RolloutPromoted, E::Notify)
            | (S::RolloutAborted, E::Notify) => S::Notified,

            (from, event) => return Err(InvalidTransition { from, event }),
        };

        self.stage = next;
        self.history.push(next);
        Ok(next)
    }
}

impl Default for DeploymentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
