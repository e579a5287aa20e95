//! Relay server: receives relayed events and drives deployments

pub mod handlers;
pub mod serve;
pub mod state;
