//! Slack Block Kit messages and interaction payloads

pub mod messages;
pub mod types;
