//! Slack request signature verification.
//!
//! See: <https://api.slack.com/authentication/verifying-requests-from-slack>

use std::time::Duration;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::Mac;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use crate::errors::RelayError;
use crate::utils::HmacSha256;

pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";
pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
const SIGNATURE_VERSION: &str = "v0";

/// Interaction payloads are small, anything beyond this is not from Slack
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Verifies Slack callbacks against the signing secret
#[derive(Clone)]
pub struct SlackSignatureVerifier {
    secret: Option<SecretString>,
    /// `None` disables the replay window
    tolerance: Option<Duration>,
}

impl SlackSignatureVerifier {
    pub fn new(secret: Option<SecretString>, tolerance_secs: u64) -> Self {
        Self {
            secret,
            tolerance: (tolerance_secs > 0).then(|| Duration::from_secs(tolerance_secs)),
        }
    }

    /// Verify `signature` for `timestamp` and `body` at unix time `now`
    pub fn verify(
        &self,
        timestamp: &str,
        body: &[u8],
        signature: &str,
        now: i64,
    ) -> Result<(), RelayError> {
        let secret = self
            .secret
            .as_ref()
            .map(|s| s.expose_secret())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RelayError::ConfigError("slack signing secret is not set".to_string()))?;

        if let Some(tolerance) = self.tolerance {
            let ts: i64 = timestamp
                .parse()
                .map_err(|_| RelayError::AuthError("invalid request timestamp".to_string()))?;
            if now.abs_diff(ts) > tolerance.as_secs() {
                return Err(RelayError::AuthError("request timestamp too old".to_string()));
            }
        }

        let provided = signature
            .strip_prefix(SIGNATURE_VERSION)
            .and_then(|s| s.strip_prefix('='))
            .and_then(|s| hex::decode(s).ok())
            .ok_or_else(|| RelayError::AuthError("malformed signature".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| RelayError::ConfigError(format!("invalid signing secret: {}", e)))?;
        mac.update(format!("{}:{}:", SIGNATURE_VERSION, timestamp).as_bytes());
        mac.update(body);
        // constant-time comparison
        mac.verify_slice(&provided)
            .map_err(|_| RelayError::AuthError("signature mismatch".to_string()))?;

        debug!("Slack signature verified");
        Ok(())
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Middleware verifying the Slack signature headers.
///
/// The body is buffered for hashing and handed on unchanged to the handler.
pub async fn verify_slack_signature(
    State(verifier): State<SlackSignatureVerifier>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let header = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let (Some(timestamp), Some(signature)) = (header(TIMESTAMP_HEADER), header(SIGNATURE_HEADER))
    else {
        warn!("Slack request without signature headers on {}", parts.uri.path());
        return RelayError::BadRequest("missing slack signature headers".to_string()).into_response();
    };

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return RelayError::BadRequest(format!("failed to read body: {}", e)).into_response()
        }
    };

    if let Err(e) = verifier.verify(&timestamp, &bytes, &signature, unix_now()) {
        warn!("Rejected slack request: {}", e);
        return e.into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
