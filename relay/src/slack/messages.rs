//! Slack message builders for deployment notifications
//!
//! - Health check failure
//! - Production approval request with approve/reject buttons
//! - Deployment success
//! - Approval decision confirmations

use relay_models::{ApprovalDecision, DeploymentEvent};

use super::types::{ActionElement, Block, ButtonStyle, Text};
use crate::deploy::health::HealthCheckReport;

/// Block id of the approval buttons
pub const ACTION_BLOCK_ID: &str = "action_block";
/// Block id of the footer context
pub const CONTEXT_BLOCK_ID: &str = "context_block";
/// Action id of the approve button
pub const APPROVE_ACTION_ID: &str = "approve";
/// Action id of the reject button
pub const REJECT_ACTION_ID: &str = "deny";

const SUPPORT_NOTE: &str =
    ":pushpin: *If anything goes wrong during the deployment, contact the DevOps team.*";

fn repository_link(event: &DeploymentEvent) -> String {
    format!(
        "*Service:*\n*<https://github.com/{org}/{repo}|{org}/{repo}>*",
        org = event.org,
        repo = event.repo
    )
}

fn operator(event: &DeploymentEvent) -> String {
    format!("*Operator:*\n@{}", event.operator)
}

fn commit(event: &DeploymentEvent) -> String {
    format!("*Changes*\n{}", event.commit_message)
}

fn context(text: impl Into<String>) -> Block {
    Block::Context {
        block_id: Some(CONTEXT_BLOCK_ID.to_string()),
        elements: vec![Text::mrkdwn(text)],
    }
}

/// Health check failure, including the attempt limit and the interval that were applied
pub fn health_check_failed(service_name: &str, report: &HealthCheckReport) -> Vec<Block> {
    vec![
        Block::text(":warning: *Health Check failed* :warning:"),
        Block::Divider,
        Block::text(
            "The service scheduled for update failed its health check.\n\
             Contact an administrator (@devops) to deploy the service.",
        ),
        Block::text(format!(
            "> *Target service*: {}\n> *Health check attempts*: `{}`\n> *Health check interval*: `{} s`",
            service_name,
            report.policy.max_attempts,
            report.policy.interval.as_secs()
        )),
    ]
}

/// Production approval request carrying the encoded approve and reject tokens
pub fn deploy_request(event: &DeploymentEvent, approve_value: &str, reject_value: &str) -> Vec<Block> {
    vec![
        Block::text("🚀 *Production deployment approval request* 🚀"),
        Block::Divider,
        Block::fields([repository_link(event), operator(event)]),
        Block::fields([
            format!("*Branch:*\n`{}`", event.branch),
            format!("*Date:*\n{}", event.date),
        ]),
        Block::text(commit(event)),
        Block::Actions {
            block_id: Some(ACTION_BLOCK_ID.to_string()),
            elements: vec![
                ActionElement::Button {
                    text: Text::plain("Approve"),
                    action_id: APPROVE_ACTION_ID.to_string(),
                    value: Some(approve_value.to_string()),
                    style: Some(ButtonStyle::Primary),
                },
                ActionElement::Button {
                    text: Text::plain("Reject"),
                    action_id: REJECT_ACTION_ID.to_string(),
                    value: Some(reject_value.to_string()),
                    style: Some(ButtonStyle::Danger),
                },
            ],
        },
        context(format!(
            ":warning: *Approving deploys the new version.*\n{}",
            SUPPORT_NOTE
        )),
    ]
}

/// Non-production deployment success
pub fn update_success(event: &DeploymentEvent) -> Vec<Block> {
    vec![
        Block::text(format!("🚀 *`{}` service deployed* 🚀", event.branch)),
        Block::Divider,
        Block::fields([repository_link(event), operator(event)]),
        Block::text(commit(event)),
        context(SUPPORT_NOTE),
    ]
}

/// Confirmation of an approval decision
pub fn decision_recorded(decision: ApprovalDecision, user_name: &str, application_name: &str) -> Vec<Block> {
    let text = match decision {
        ApprovalDecision::Approve => format!(
            ":white_check_mark: *Production deployment approved* | *{}* approved the *{}* deployment.",
            user_name, application_name
        ),
        ApprovalDecision::Reject => format!(
            ":no_entry: *Production deployment rejected* | *{}* rejected the *{}* deployment.",
            user_name, application_name
        ),
    };
    vec![Block::text(text)]
}

/// Acknowledgement posted by the gateway while the relay server handles a decision
pub fn decision_in_progress(decision: ApprovalDecision, user_name: &str, application_name: &str) -> Vec<Block> {
    let verb = match decision {
        ApprovalDecision::Approve => "approved",
        ApprovalDecision::Reject => "rejected",
    };
    vec![
        Block::text(format!(
            ":hourglass_flowing_sand: *{}* {} the *{}* deployment. Processing...",
            user_name, verb, application_name
        )),
        context(SUPPORT_NOTE),
    ]
}

/// Rollout promotion or abort failed after a decision was recorded
pub fn rollout_failed(decision: ApprovalDecision, application_name: &str, error: &str) -> Vec<Block> {
    let action = match decision {
        ApprovalDecision::Approve => "promote",
        ApprovalDecision::Reject => "abort",
    };
    vec![
        Block::text(format!(
            ":x: *Rollout {} failed* | *{}*",
            action, application_name
        )),
        context(format!("`{}`\n{}", error, SUPPORT_NOTE)),
    ]
}
