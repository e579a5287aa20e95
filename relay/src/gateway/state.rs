//! Gateway state

use std::sync::Arc;

use crate::app::settings::DatadogSettings;
use crate::http::client::RelayClient;
use crate::http::slack::Notifier;
use crate::routing::resolver::TargetResolver;
use crate::telemetry::AuditSink;

/// Gateway state shared across handlers
#[derive(Clone)]
pub struct GatewayState {
    pub resolver: Arc<TargetResolver>,
    pub relay: RelayClient,
    pub notifier: Arc<dyn Notifier>,
    pub audit: Arc<dyn AuditSink>,
    pub datadog: Arc<DatadogSettings>,
}

impl GatewayState {
    pub fn new(
        resolver: TargetResolver,
        relay: RelayClient,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        datadog: DatadogSettings,
    ) -> Self {
        Self {
            resolver: Arc::new(resolver),
            relay,
            notifier,
            audit,
            datadog: Arc::new(datadog),
        }
    }
}
