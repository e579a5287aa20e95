//! Approval token codec
//!
//! Approval buttons carry a slash-delimited value with six positional fields:
//! `org/branch/application_name/application_namespace/request_type/result`.
//! Each field is percent-escaped before joining, so a `/` inside a field can
//! never shift the positions. Plain identifiers (`[A-Za-z0-9._~-]`) are left
//! untouched, which keeps tokens readable in the chat UI.

use relay_models::{ApprovalDecision, ApprovalToken, DeploymentEvent, SlackResponse, User};

use crate::errors::RelayError;
use crate::slack::types::InteractionPayload;

/// Request type used for deployment approval buttons
pub const DEPLOY_REQUEST_TYPE: &str = "deploy";

const TOKEN_FIELDS: usize = 6;

/// Encode a token into a button value
pub fn encode_token(token: &ApprovalToken) -> String {
    [
        token.org.as_str(),
        token.branch.as_str(),
        token.application_name.as_str(),
        token.application_namespace.as_str(),
        token.request_type.as_str(),
        token.result.as_str(),
    ]
    .iter()
    .map(|field| urlencoding::encode(field).into_owned())
    .collect::<Vec<_>>()
    .join("/")
}

/// Decode a button value
pub fn decode_token(value: &str) -> Result<ApprovalToken, RelayError> {
    let fields = value
        .split('/')
        .map(|field| {
            urlencoding::decode(field)
                .map(|f| f.into_owned())
                .map_err(|e| RelayError::DecodeError(format!("invalid token field {:?}: {}", field, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let [org, branch, application_name, application_namespace, request_type, result]: [String;
        TOKEN_FIELDS] = fields.try_into().map_err(|fields: Vec<String>| {
        RelayError::DecodeError(format!(
            "approval token has {} fields, expected {}",
            fields.len(),
            TOKEN_FIELDS
        ))
    })?;

    let result = result
        .parse::<ApprovalDecision>()
        .map_err(|e| RelayError::DecodeError(e.to_string()))?;

    Ok(ApprovalToken {
        org,
        branch,
        application_name,
        application_namespace,
        request_type,
        result,
    })
}

/// Token for `decision` on the deployment described by `event`
pub fn token_for(event: &DeploymentEvent, decision: ApprovalDecision) -> ApprovalToken {
    ApprovalToken {
        org: event.org.clone(),
        branch: event.branch.clone(),
        application_name: event.application_name.clone(),
        application_namespace: event.application_namespace.clone(),
        request_type: DEPLOY_REQUEST_TYPE.to_string(),
        result: decision,
    }
}

/// Encoded approve and reject button values for `event`
pub fn approval_values(event: &DeploymentEvent) -> (String, String) {
    (
        encode_token(&token_for(event, ApprovalDecision::Approve)),
        encode_token(&token_for(event, ApprovalDecision::Reject)),
    )
}

/// Decode the JSON `payload` form field of an interaction callback
pub fn decode_interaction(raw_payload: &str) -> Result<SlackResponse, RelayError> {
    if raw_payload.is_empty() {
        return Err(RelayError::DecodeError("no payload received".to_string()));
    }

    let payload: InteractionPayload = serde_json::from_str(raw_payload)
        .map_err(|e| RelayError::DecodeError(format!("failed to unmarshal payload: {}", e)))?;

    let value = payload
        .actions
        .first()
        .and_then(|action| action.value.as_deref())
        .ok_or_else(|| RelayError::DecodeError("no action value in payload".to_string()))?;
    let button = decode_token(value)?;

    let response_url = payload
        .response_url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| RelayError::DecodeError("no response_url in payload".to_string()))?;

    let name = payload
        .user
        .name
        .or(payload.user.username)
        .unwrap_or_else(|| payload.user.id.clone());

    Ok(SlackResponse {
        button,
        user: User {
            name,
            id: payload.user.id,
        },
        response_url,
    })
}
