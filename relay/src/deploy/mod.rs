//! Deployment orchestration

pub mod approval;
pub mod fsm;
pub mod health;
pub mod orchestrator;
