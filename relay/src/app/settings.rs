//! Relay settings
//!
//! Settings are read once at startup: an optional JSON file
//! (`RELAY_SETTINGS_FILE`) provides the routing table and tunables, then
//! environment variables overlay it. Secrets only come from the environment.
//! The result is immutable and shared by reference for the life of the process.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use crate::app::options::Role;
use crate::deploy::health::HealthCheckPolicy;
use crate::errors::RelayError;
use crate::logs::LogLevel;

pub const SETTINGS_FILE_ENV: &str = "RELAY_SETTINGS_FILE";

/// Relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,

    /// Listener configuration
    #[serde(default)]
    pub server: ServerSettings,

    /// Organizations allowed to deploy through the gateway
    #[serde(default = "default_allowed_orgs")]
    pub allowed_orgs: Vec<String>,

    /// Relay server endpoints keyed by organization
    #[serde(default)]
    pub routes: BTreeMap<String, RouteEndpoints>,

    /// GitOps controller configuration
    #[serde(default)]
    pub argo: ArgoSettings,

    /// Health check configuration
    #[serde(default)]
    pub health_check: HealthCheckSettings,

    /// Slack callback verification
    #[serde(default)]
    pub slack: SlackSettings,

    /// Deployment audit sink
    #[serde(default)]
    pub datadog: DatadogSettings,

    /// Maximum time to wait for in-flight requests on shutdown, in seconds
    #[serde(default = "default_shutdown_delay")]
    pub max_shutdown_delay_secs: u64,

    #[serde(skip)]
    pub secrets: Secrets,
}

fn default_allowed_orgs() -> Vec<String> {
    vec!["org-a".to_string(), "org-b".to_string()]
}

fn default_shutdown_delay() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            server: ServerSettings::default(),
            allowed_orgs: default_allowed_orgs(),
            routes: BTreeMap::new(),
            argo: ArgoSettings::default(),
            health_check: HealthCheckSettings::default(),
            slack: SlackSettings::default(),
            datadog: DatadogSettings::default(),
            max_shutdown_delay_secs: default_shutdown_delay(),
            secrets: Secrets::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Dev and prod relay server base URLs of one organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEndpoints {
    #[serde(default)]
    pub dev: String,

    #[serde(default)]
    pub prod: String,
}

/// ArgoCD and Argo Rollouts endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgoSettings {
    #[serde(default = "default_argocd_url")]
    pub argocd_url: String,

    #[serde(default = "default_rollouts_url")]
    pub rollouts_url: String,
}

fn default_argocd_url() -> String {
    "http://argocd-server.argocd.svc.cluster.local".to_string()
}

fn default_rollouts_url() -> String {
    "http://argocd-argo-rollouts-dashboard.argocd.svc.cluster.local".to_string()
}

impl Default for ArgoSettings {
    fn default() -> Self {
        Self {
            argocd_url: default_argocd_url(),
            rollouts_url: default_rollouts_url(),
        }
    }
}

/// Health check settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Base URL of the preview service; `{app}` and `{namespace}` are substituted
    #[serde(default = "default_preview_url_template")]
    pub preview_url_template: String,

    /// Applications checked at `/` instead of `/healthz/healthcheck`
    #[serde(default = "default_frontend_apps")]
    pub frontend_apps: Vec<String>,
}

fn default_max_attempts() -> u32 {
    25
}

fn default_interval_secs() -> u64 {
    5
}

fn default_preview_url_template() -> String {
    "http://{app}-preview.{namespace}.svc.cluster.local".to_string()
}

fn default_frontend_apps() -> Vec<String> {
    [
        "homepage-front",
        "cms-front",
        "mydata-front",
        "pms-front",
        "mydata-cms-front",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            interval_secs: default_interval_secs(),
            preview_url_template: default_preview_url_template(),
            frontend_apps: default_frontend_apps(),
        }
    }
}

/// Slack request verification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSettings {
    /// Maximum age of a signed request in seconds; 0 disables the check
    #[serde(default = "default_timestamp_tolerance")]
    pub timestamp_tolerance_secs: u64,
}

fn default_timestamp_tolerance() -> u64 {
    300
}

impl Default for SlackSettings {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: default_timestamp_tolerance(),
        }
    }
}

/// Datadog log intake settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatadogSettings {
    #[serde(default = "default_dd_site")]
    pub site: String,

    #[serde(default = "default_dd_service")]
    pub service: String,

    #[serde(default = "default_dd_hostname")]
    pub hostname: String,
}

fn default_dd_site() -> String {
    "datadoghq.com".to_string()
}

fn default_dd_service() -> String {
    "devops-gateway".to_string()
}

fn default_dd_hostname() -> String {
    "devops-relay".to_string()
}

impl Default for DatadogSettings {
    fn default() -> Self {
        Self {
            site: default_dd_site(),
            service: default_dd_service(),
            hostname: default_dd_hostname(),
        }
    }
}

/// Secrets injected through the environment
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub request_token: Option<SecretString>,
    pub slack_signing_secret: Option<SecretString>,
    pub argo_username: Option<String>,
    pub argo_password: Option<SecretString>,
    pub datadog_api_key: Option<SecretString>,
}

impl Settings {
    /// Load settings from the optional settings file and the process environment
    pub async fn load() -> Result<Self, RelayError> {
        let mut settings = match std::env::var(SETTINGS_FILE_ENV) {
            Ok(path) if !path.is_empty() => Self::read_file(Path::new(&path)).await?,
            _ => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Read a JSON settings file
    pub async fn read_file(path: &Path) -> Result<Self, RelayError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RelayError::ConfigError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_json::from_str(&raw).map_err(|e| {
            RelayError::ConfigError(format!("failed to parse {}: {}", path.display(), e))
        })?;
        info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Overlay environment variables, looked up through `lookup`.
    ///
    /// Unparseable numeric overrides are ignored and the current value is kept.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(level) = non_empty("LOG_LEVEL") {
            match level.parse() {
                Ok(level) => self.log_level = level,
                Err(e) => warn!("Ignoring LOG_LEVEL: {}", e),
            }
        }
        if let Some(format) = non_empty("LOG_FORMAT") {
            self.log_json = format.eq_ignore_ascii_case("json");
        }
        if let Some(host) = non_empty("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = non_empty("SERVER_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => warn!("Ignoring invalid SERVER_PORT {:?}", port),
            }
        }

        if let Some(limits) = non_empty("HEALTH_CHECK_LIMITS") {
            match limits.parse::<u32>() {
                Ok(limits) if limits >= 1 => self.health_check.max_attempts = limits,
                _ => info!(
                    "Invalid HEALTH_CHECK_LIMITS {:?}. Keeping {}",
                    limits, self.health_check.max_attempts
                ),
            }
        }
        if let Some(interval) = non_empty("HEALTH_CHECK_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(interval) => self.health_check.interval_secs = interval,
                Err(_) => info!(
                    "Invalid HEALTH_CHECK_INTERVAL {:?}. Keeping {}s",
                    interval, self.health_check.interval_secs
                ),
            }
        }
        if let Some(template) = non_empty("PREVIEW_URL_TEMPLATE") {
            self.health_check.preview_url_template = template;
        }

        if let Some(tolerance) = non_empty("SLACK_TIMESTAMP_TOLERANCE_SECS") {
            match tolerance.parse() {
                Ok(tolerance) => self.slack.timestamp_tolerance_secs = tolerance,
                Err(_) => warn!("Ignoring invalid SLACK_TIMESTAMP_TOLERANCE_SECS {:?}", tolerance),
            }
        }

        if let Some(url) = non_empty("ARGOCD_URL") {
            self.argo.argocd_url = url;
        }
        if let Some(url) = non_empty("ARGO_ROLLOUTS_URL") {
            self.argo.rollouts_url = url;
        }
        if let Some(site) = non_empty("DD_SITE") {
            self.datadog.site = site;
        }

        let secret = |key: &str| non_empty(key).map(SecretString::from);
        self.secrets = Secrets {
            request_token: secret("REQUEST_TOKEN"),
            slack_signing_secret: secret("SLACK_BOT_SIGNING_SECRET"),
            argo_username: non_empty("ARGO_ADMIN_USERNAME"),
            argo_password: secret("ARGO_ADMIN_PASSWORD"),
            datadog_api_key: secret("DD_API_KEY"),
        };
    }

    /// Check the settings the given role depends on
    pub fn validate(&self, role: Role) -> Result<(), RelayError> {
        match role {
            Role::Gateway => {
                for (org, endpoints) in &self.routes {
                    for url in [&endpoints.dev, &endpoints.prod] {
                        if !url.is_empty() {
                            parse_http_url(&format!("routes.{}", org), url)?;
                        }
                    }
                }
                for org in &self.allowed_orgs {
                    if !self.routes.contains_key(org) {
                        warn!("Allowed organization {} has no route", org);
                    }
                }
                if self.secrets.slack_signing_secret.is_none() {
                    warn!("SLACK_BOT_SIGNING_SECRET is not set, slack callbacks will fail");
                }
            }
            Role::Server => {
                parse_http_url("argo.argocd_url", &self.argo.argocd_url)?;
                parse_http_url("argo.rollouts_url", &self.argo.rollouts_url)?;
                if !self.health_check.preview_url_template.contains("{app}") {
                    return Err(RelayError::ConfigError(
                        "health_check.preview_url_template must contain {app}".to_string(),
                    ));
                }
                if self.secrets.argo_username.is_none() || self.secrets.argo_password.is_none() {
                    warn!("ArgoCD credentials are not set, sync requests will be rejected");
                }
            }
        }
        Ok(())
    }

    pub fn health_check_policy(&self) -> HealthCheckPolicy {
        HealthCheckPolicy {
            max_attempts: self.health_check.max_attempts.max(1),
            interval: Duration::from_secs(self.health_check.interval_secs),
        }
    }

    pub fn max_shutdown_delay(&self) -> Duration {
        Duration::from_secs(self.max_shutdown_delay_secs)
    }
}

fn parse_http_url(name: &str, value: &str) -> Result<Url, RelayError> {
    let url = Url::parse(value)
        .map_err(|e| RelayError::ConfigError(format!("invalid {} {:?}: {}", name, value, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(RelayError::ConfigError(format!(
            "invalid {} {:?}: unsupported scheme {}",
            name, value, scheme
        ))),
    }
}
