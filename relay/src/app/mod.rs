//! Process setup: settings, options and the run loop

pub mod options;
pub mod run;
pub mod settings;

/// Future that resolves when in-flight work should stop
pub type ShutdownSignal = futures::future::BoxFuture<'static, ()>;
