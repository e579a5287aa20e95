//! Logging configuration

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::settings::Settings;
use crate::errors::RelayError;

/// Log level configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_filter_string(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

impl serde::Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_filter_string())
    }
}

impl<'de> serde::Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Environment variable holding a full `EnvFilter` directive
pub const RUST_LOG_ENV: &str = "RUST_LOG";

/// HTTP stack crates kept at `warn` when the relay logs verbosely
const QUIET_TARGETS: &[&str] = &["hyper_util", "h2", "reqwest", "rustls"];

/// Logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Log level, overridden by `RUST_LOG` when set
    pub log_level: LogLevel,

    /// Emit one JSON object per line, `LOG_FORMAT=json`
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_format: false,
        }
    }
}

impl LogOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            log_level: settings.log_level,
            json_format: settings.log_json,
        }
    }

    /// Filter directive for `rust_log`, the raw `RUST_LOG` value.
    ///
    /// A non-empty `RUST_LOG` replaces the configured level entirely.
    pub fn filter_directive(&self, rust_log: Option<&str>) -> String {
        if let Some(directive) = rust_log.map(str::trim).filter(|d| !d.is_empty()) {
            return directive.to_string();
        }

        let level = self.log_level.to_filter_string();
        match self.log_level {
            LogLevel::Trace | LogLevel::Debug => QUIET_TARGETS
                .iter()
                .fold(level.to_string(), |acc, target| format!("{},{}=warn", acc, target)),
            _ => level.to_string(),
        }
    }
}

/// Initialize the global subscriber.
///
/// An unparseable `RUST_LOG` falls back to the configured level.
pub fn init_logging(options: LogOptions) -> Result<(), RelayError> {
    let rust_log = std::env::var(RUST_LOG_ENV).ok();
    let filter = EnvFilter::try_new(options.filter_directive(rust_log.as_deref()))
        .or_else(|e| {
            eprintln!("Ignoring {}: {}", RUST_LOG_ENV, e);
            EnvFilter::try_new(options.filter_directive(None))
        })
        .map_err(|e| RelayError::ConfigError(format!("invalid log filter: {}", e)))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    if options.json_format {
        subscriber
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
            .map_err(|e| RelayError::ConfigError(e.to_string()))?;
    } else {
        subscriber
            .with(fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| RelayError::ConfigError(e.to_string()))?;
    }

    Ok(())
}
