//! Integration tests for the DevOps relay

mod support;
mod test_lifecycle;
mod test_orchestrator;
mod test_server;
