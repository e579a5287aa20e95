//! DevOps Relay Library
//!
//! Core modules of the deployment gateway and the relay server that drives
//! GitOps syncs, preview health checks and Slack approved rollouts.

pub mod app;
pub mod authn;
pub mod deploy;
pub mod errors;
pub mod gateway;
pub mod http;
pub mod logs;
pub mod routing;
pub mod server;
pub mod slack;
pub mod telemetry;
pub mod utils;
