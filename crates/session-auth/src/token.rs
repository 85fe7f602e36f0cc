//! Token endpoint wire contract
//!
//! Sign-in and refresh both answer with the backend's standard envelope:
//!
//! ```json
//! { "data": { "token": { "accessToken": "...", "refreshToken": "..." }, "user": { ... } } }
//! ```
//!
//! A 2xx response missing either token is a malformed response, not a success.
//! Requests built here go straight to the transport: they must never pick up
//! a bearer credential, which on the refresh path would be the expired one.

use common::Secret;
use serde::Deserialize;
use transport::header::{ACCEPT, CONTENT_TYPE};
use transport::{ApiRequest, ApiResponse, HeaderValue, Transport};
use tracing::debug;

use crate::credentials::Credential;
use crate::error::{Error, Result};
use crate::state::User;

/// A token pair plus the user it was issued for, when the endpoint sent one.
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub credential: Credential,
    pub user: Option<User>,
}

#[derive(Deserialize)]
struct Envelope {
    data: Option<SessionPayload>,
}

#[derive(Deserialize)]
struct SessionPayload {
    token: Option<TokenPair>,
    user: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// `POST {path}` with `{"refreshToken": ...}` and JSON content negotiation headers.
pub fn refresh_request(path: &str, refresh_token: &Secret<String>) -> ApiRequest {
    json_post(
        path,
        serde_json::json!({ "refreshToken": refresh_token.expose() }),
    )
}

/// `POST {path}` with `{"refreshToken": ...}`, or `{}` when no token is stored.
pub fn logout_request(path: &str, refresh_token: Option<&Secret<String>>) -> ApiRequest {
    let body = match refresh_token {
        Some(token) => serde_json::json!({ "refreshToken": token.expose() }),
        None => serde_json::json!({}),
    };
    json_post(path, body)
}

fn json_post(path: &str, body: serde_json::Value) -> ApiRequest {
    ApiRequest::post(path, body)
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_header(ACCEPT, HeaderValue::from_static("application/json"))
}

/// Exchange a refresh token for a rotated pair.
pub async fn refresh(
    transport: &dyn Transport,
    path: &str,
    refresh_token: &Secret<String>,
) -> Result<SessionGrant> {
    let request = refresh_request(path, refresh_token);
    let response = transport
        .send(&request)
        .await
        .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;
    debug!(status = response.status.as_u16(), "refresh endpoint answered");
    parse_grant(&response)
}

/// Exchange email and password for a session.
pub async fn login(
    transport: &dyn Transport,
    path: &str,
    email: &str,
    password: &Secret<String>,
) -> Result<SessionGrant> {
    let request = json_post(
        path,
        serde_json::json!({ "email": email, "password": password.expose() }),
    );
    let response = transport
        .send(&request)
        .await
        .map_err(|e| Error::Http(format!("sign-in request failed: {e}")))?;
    parse_grant(&response)
}

/// Validate status and extract `data.token` (required) and `data.user` (optional).
pub fn parse_grant(response: &ApiResponse) -> Result<SessionGrant> {
    if !response.is_success() {
        return Err(Error::Rejected {
            status: response.status.as_u16(),
            detail: response.detail(),
        });
    }

    let envelope: Envelope = response
        .json()
        .map_err(|e| Error::MalformedResponse(format!("invalid JSON body: {e}")))?;
    let payload = envelope
        .data
        .ok_or_else(|| Error::MalformedResponse("missing data".into()))?;
    let pair = payload
        .token
        .ok_or_else(|| Error::MalformedResponse("missing data.token".into()))?;

    let access_token = non_empty(pair.access_token, "accessToken")?;
    let refresh_token = non_empty(pair.refresh_token, "refreshToken")?;

    // A user that doesn't match the expected shape doesn't invalidate the tokens
    let user = payload
        .user
        .and_then(|value| serde_json::from_value::<User>(value).ok());

    Ok(SessionGrant {
        credential: Credential {
            access_token,
            refresh_token,
        },
        user,
    })
}

fn non_empty(field: Option<String>, name: &str) -> Result<Secret<String>> {
    match field {
        Some(value) if !value.is_empty() => Ok(Secret::new(value)),
        _ => Err(Error::MalformedResponse(format!("missing data.token.{name}"))),
    }
}
