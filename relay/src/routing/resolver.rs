//! Resolves the relay server that handles an (organization, branch) pair

use std::collections::{BTreeMap, BTreeSet};

use relay_models::PROD_BRANCH;

use crate::app::settings::{RouteEndpoints, Settings};
use crate::errors::RelayError;

/// Deployment environment behind a relay server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Prod,
}

impl Environment {
    /// Only the exact branch name `prod` targets production
    pub fn for_branch(branch: &str) -> Self {
        if branch == PROD_BRANCH {
            Environment::Prod
        } else {
            Environment::Dev
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

/// A resolved relay server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayTarget {
    pub organization: String,
    pub environment: Environment,
    pub base_url: String,
}

/// Static routing table guarded by an organization allow-list
#[derive(Debug, Clone, Default)]
pub struct TargetResolver {
    allowed_orgs: BTreeSet<String>,
    routes: BTreeMap<String, RouteEndpoints>,
}

impl TargetResolver {
    pub fn new<I, S>(allowed_orgs: I, routes: BTreeMap<String, RouteEndpoints>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_orgs: allowed_orgs.into_iter().map(Into::into).collect(),
            routes,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.allowed_orgs.iter().cloned(), settings.routes.clone())
    }

    /// Resolve the relay server for `org` and `branch`.
    ///
    /// The allow-list is checked before the routing table so an organization
    /// that only appears in the table is still rejected.
    pub fn resolve(&self, org: &str, branch: &str) -> Result<RelayTarget, RelayError> {
        if !self.allowed_orgs.contains(org) {
            return Err(RelayError::RoutingError(format!(
                "invalid organization: {}",
                org
            )));
        }

        let endpoints = self.routes.get(org).ok_or_else(|| {
            RelayError::RoutingError(format!("unknown organization: {}", org))
        })?;

        let environment = Environment::for_branch(branch);
        let base_url = match environment {
            Environment::Prod => &endpoints.prod,
            Environment::Dev => &endpoints.dev,
        };

        if base_url.is_empty() {
            return Err(RelayError::RoutingError(format!(
                "empty target endpoint for org: {}, branch: {}",
                org, branch
            )));
        }

        Ok(RelayTarget {
            organization: org.to_string(),
            environment,
            base_url: base_url.clone(),
        })
    }
}
