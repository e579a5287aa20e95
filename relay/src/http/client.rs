//! Relay dispatcher: forwards JSON payloads from the gateway to relay servers

use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::{Operation, RelayError, TransportStage};
use crate::utils::join_url;

/// Header carrying the shared request token between gateway and servers
pub const REQUEST_AUTH_HEADER: &str = "Request-Auth";

/// Timeout for every relayed request
pub const RELAY_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw response of a relayed request
#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl RelayResponse {
    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self, operation: Operation) -> Result<T, RelayError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| RelayError::transport(operation, TransportStage::Unmarshal, e))
    }
}

/// HTTP client for gateway to relay server traffic
#[derive(Clone)]
pub struct RelayClient {
    client: Client,
    request_token: Option<SecretString>,
}

impl RelayClient {
    /// Create a new relay client
    pub fn new(request_token: Option<SecretString>) -> Result<Self, RelayError> {
        Self::with_timeout(request_token, RELAY_TIMEOUT)
    }

    pub fn with_timeout(
        request_token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::ConfigError(format!("failed to build relay client: {}", e)))?;

        Ok(Self {
            client,
            request_token,
        })
    }

    /// POST `payload` as JSON to `{base_url}/{path}`.
    ///
    /// The status code is returned untouched; interpreting it is up to the
    /// caller. Each failing stage yields its own transport error.
    pub async fn post_json<B: Serialize>(
        &self,
        operation: Operation,
        base_url: &str,
        path: &str,
        payload: &B,
    ) -> Result<RelayResponse, RelayError> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| RelayError::transport(operation, TransportStage::Marshal, e))?;

        let url = join_url(base_url, path);
        debug!("POST {} ({})", url, operation);

        let mut request = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.request_token {
            request = request.header(REQUEST_AUTH_HEADER, token.expose_secret());
        }
        let request = request
            .build()
            .map_err(|e| RelayError::transport(operation, TransportStage::Build, e))?;

        let response = self.client.execute(request).await.map_err(|e| {
            error!("{} | failed to send request to {}: {}", operation, url, e);
            RelayError::transport(operation, TransportStage::Send, e)
        })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| RelayError::transport(operation, TransportStage::ReadBody, e))?;

        debug!("{} | {} answered {}", operation, url, status);
        Ok(RelayResponse {
            status,
            body: body.to_vec(),
        })
    }
}
