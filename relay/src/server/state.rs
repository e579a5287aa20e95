//! Server state

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::broadcast;

use crate::app::ShutdownSignal;
use crate::deploy::orchestrator::Orchestrator;

/// Server state shared across handlers
#[derive(Clone)]
pub struct ServerState {
    pub orchestrator: Arc<Orchestrator>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ServerState {
    pub fn new(orchestrator: Arc<Orchestrator>, shutdown_tx: broadcast::Sender<()>) -> Self {
        Self {
            orchestrator,
            shutdown_tx,
        }
    }

    /// Future resolving when the process starts shutting down
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        async move {
            let _ = shutdown_rx.recv().await;
        }
        .boxed()
    }
}
