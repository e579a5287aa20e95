//! Gateway: public entry point relaying CI and Slack traffic to relay servers

pub mod handlers;
pub mod serve;
pub mod state;
