//! Outbound HTTP clients

pub mod argocd;
pub mod client;
pub mod slack;
