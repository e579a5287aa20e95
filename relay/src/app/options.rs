//! Application configuration options

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::app::settings::Settings;
use crate::errors::RelayError;

/// Which side of the relay this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Public entry point: authenticates CI and Slack traffic and forwards it
    Gateway,
    /// In-cluster relay server: drives ArgoCD and the approval flow
    Server,
}

impl FromStr for Role {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gateway" => Ok(Role::Gateway),
            "server" => Ok(Role::Server),
            other => Err(RelayError::ConfigError(format!(
                "invalid role: {} (expected gateway or server)",
                other
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Gateway => f.write_str("gateway"),
            Role::Server => f.write_str("server"),
        }
    }
}

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub role: Role,

    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server configuration
    pub server: ServerOptions,
}

impl AppOptions {
    pub fn from_settings(role: Role, settings: &Settings) -> Self {
        Self {
            role,
            lifecycle: LifecycleOptions {
                max_shutdown_delay: settings.max_shutdown_delay(),
            },
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP listener options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}
