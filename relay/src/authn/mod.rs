//! Inbound request authentication

pub mod request_token;
pub mod slack_signature;
