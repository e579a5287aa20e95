//! Shared request token check for CI and gateway traffic

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::errors::RelayError;
use crate::http::client::REQUEST_AUTH_HEADER;

/// Expected value of the `Request-Auth` header
#[derive(Clone)]
pub struct RequestAuth {
    token: Option<SecretString>,
}

impl RequestAuth {
    pub fn new(token: Option<SecretString>) -> Self {
        Self { token }
    }

    /// A missing configured token rejects every request
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), RelayError> {
        let expected = self
            .token
            .as_ref()
            .map(|t| t.expose_secret())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RelayError::AuthError("no request token configured".to_string()))?;

        let provided = headers
            .get(REQUEST_AUTH_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| RelayError::AuthError(format!("missing {} header", REQUEST_AUTH_HEADER)))?;

        let matches: bool = provided.as_bytes().ct_eq(expected.as_bytes()).into();
        if !matches {
            return Err(RelayError::AuthError("request token mismatch".to_string()));
        }
        Ok(())
    }
}

/// Middleware rejecting requests without the shared token
pub async fn require_request_token(
    State(auth): State<RequestAuth>,
    request: Request,
    next: Next,
) -> Response {
    if let Err(e) = auth.verify(request.headers()) {
        let headers = request.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string()
        };
        warn!(
            "Unauthorized request {} {} | User-Agent: {}, X-Forwarded-Proto: {}, X-Forwarded-For: {}, X-Forwarded-Host: {} | {}",
            request.method(),
            request.uri().path(),
            header("user-agent"),
            header("x-forwarded-proto"),
            header("x-forwarded-for"),
            header("x-forwarded-host"),
            e
        );
        return e.into_response();
    }
    next.run(request).await
}
