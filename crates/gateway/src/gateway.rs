//! Authenticated request gateway
//!
//! Wraps a `Transport` so that every request carries the current access token
//! and a 401 is recovered transparently:
//!
//! 1. The first request to see a 401 while no refresh is running becomes the
//!    initiator: it exchanges the stored refresh token for a new pair, stores
//!    both tokens and releases everyone who queued behind it.
//! 2. Requests that see a 401 while that refresh is in flight wait for it.
//! 3. Every affected request is replayed once with the new token. A replay
//!    that gets another 401 ends the session.
//!
//! If the refresh fails, the session is torn down once per episode and each
//! caller receives its own original 401.

use std::sync::{Arc, Mutex};

use common::Secret;
use serde_json::Value;
use session_auth::{
    AuthState, DEFAULT_LOGIN_PATH, DEFAULT_LOGOUT_PATH, DEFAULT_REFRESH_PATH, RefreshTokenStore,
};
use tracing::{debug, info, instrument, warn};
use transport::{ApiRequest, ApiResponse, Attempt, HeaderMap, Method, StatusCode, Transport};

use crate::error::{GatewayError, Result};
use crate::metrics;
use crate::notify::{Notifier, SESSION_EXPIRED_MESSAGE, Severity};
use crate::state::{self, Entry, RefreshGuard, RefreshPhase, RefreshState};

/// Paths of the session endpoints, relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub refresh: String,
    pub login: String,
    pub logout: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            refresh: DEFAULT_REFRESH_PATH.to_string(),
            login: DEFAULT_LOGIN_PATH.to_string(),
            logout: DEFAULT_LOGOUT_PATH.to_string(),
        }
    }
}

/// Extra query pairs and headers for the verb helpers.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
}

impl RequestOptions {
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    fn apply(self, mut request: ApiRequest) -> ApiRequest {
        request.query.extend(self.query);
        request.headers.extend(self.headers);
        request
    }
}

/// How a 401 is resolved, decided atomically under the refresh lock.
enum Recovery {
    /// This request runs the refresh
    Initiate,
    /// Another request is refreshing; wait for its outcome
    Wait(tokio::sync::oneshot::Receiver<state::Release>),
    /// The token was rotated after this request went out; replay with it
    Rotated(Secret<String>),
    /// The session was cleared after this request went out
    Ended,
}

/// Why a refresh attempt produced no usable token.
#[derive(Debug)]
enum RefreshFailure {
    NoRefreshToken,
    Rejected(u16),
    Unreachable(String),
    Malformed(String),
}

impl RefreshFailure {
    fn label(&self) -> &'static str {
        match self {
            RefreshFailure::NoRefreshToken => "no_refresh_token",
            RefreshFailure::Rejected(_) => "rejected",
            RefreshFailure::Unreachable(_) => "unreachable",
            RefreshFailure::Malformed(_) => "malformed",
        }
    }

    /// The error the initiator's caller sees, wrapping its own 401.
    fn into_error(self, response: ApiResponse) -> GatewayError {
        match self {
            RefreshFailure::NoRefreshToken | RefreshFailure::Rejected(_) => {
                GatewayError::AuthorizationExpired { response }
            }
            RefreshFailure::Unreachable(reason) | RefreshFailure::Malformed(reason) => {
                GatewayError::RefreshTransportFailure { response, reason }
            }
        }
    }
}

impl From<session_auth::Error> for RefreshFailure {
    fn from(e: session_auth::Error) -> Self {
        match e {
            session_auth::Error::Rejected { status, .. } => RefreshFailure::Rejected(status),
            session_auth::Error::MalformedResponse(m) => RefreshFailure::Malformed(m),
            other => RefreshFailure::Unreachable(other.to_string()),
        }
    }
}

/// The authenticated request gateway. Share it behind an `Arc`.
pub struct Gateway {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) tokens: Arc<dyn RefreshTokenStore>,
    pub(crate) auth: Arc<dyn AuthState>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) endpoints: Endpoints,
    refresh: Mutex<RefreshState>,
}

impl Gateway {
    pub fn new(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn RefreshTokenStore>,
        auth: Arc<dyn AuthState>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            transport,
            tokens,
            auth,
            notifier,
            endpoints: Endpoints::default(),
            refresh: Mutex::new(RefreshState::Idle),
        }
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn auth(&self) -> &Arc<dyn AuthState> {
        &self.auth
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Snapshot of the refresh coordination state.
    pub fn refresh_phase(&self) -> RefreshPhase {
        state::lock(&self.refresh).phase()
    }

    pub async fn get(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(options.apply(ApiRequest::new(Method::GET, path)))
            .await
    }

    pub async fn post(&self, path: &str, body: Value, options: RequestOptions) -> Result<ApiResponse> {
        self.request(options.apply(ApiRequest::new(Method::POST, path).with_body(body)))
            .await
    }

    pub async fn put(&self, path: &str, body: Value, options: RequestOptions) -> Result<ApiResponse> {
        self.request(options.apply(ApiRequest::new(Method::PUT, path).with_body(body)))
            .await
    }

    pub async fn delete(&self, path: &str, options: RequestOptions) -> Result<ApiResponse> {
        self.request(options.apply(ApiRequest::new(Method::DELETE, path)))
            .await
    }

    /// Send `request` with the current access token, recovering once from a 401.
    #[instrument(skip_all, fields(request_id = %new_request_id(), method = %request.method, path = %request.path))]
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let sent_with = self.auth.access_token();
        let outbound = request
            .clone()
            .with_bearer(sent_with.as_ref().map(|t| t.expose().as_str()));
        let response = self.dispatch(&outbound).await?;

        if response.is_success() {
            return Ok(response);
        }
        self.notify_detail(&response);

        if response.status != StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Upstream { response });
        }
        if request.attempt() == Attempt::Replay {
            self.expire_if_current(sent_with.as_ref());
            return Err(GatewayError::AuthorizationExpired { response });
        }

        self.recover(&request, sent_with.as_ref(), response).await
    }

    async fn recover(
        &self,
        request: &ApiRequest,
        sent_with: Option<&Secret<String>>,
        original: ApiResponse,
    ) -> Result<ApiResponse> {
        match self.begin_recovery(sent_with) {
            Recovery::Rotated(token) => {
                debug!("access token rotated since dispatch, replaying without refresh");
                self.replay(request, &token).await
            }
            Recovery::Ended => {
                debug!("session ended since dispatch, not refreshing");
                Err(GatewayError::AuthorizationExpired { response: original })
            }
            Recovery::Wait(released) => {
                debug!("refresh in flight, queued");
                match released.await {
                    Ok(Some(token)) => self.replay(request, &token).await,
                    _ => Err(GatewayError::AuthorizationExpired { response: original }),
                }
            }
            Recovery::Initiate => {
                let guard = RefreshGuard::new(&self.refresh);
                match self.refresh_credential().await {
                    Ok(token) => {
                        metrics::record_refresh("success");
                        let waiters = guard.release(Some(token.clone()));
                        info!(waiters, "access token refreshed");
                        self.replay(request, &token).await
                    }
                    Err(failure) => {
                        metrics::record_refresh(failure.label());
                        let waiters = guard.release(None);
                        warn!(waiters, reason = ?failure, "token refresh failed, ending session");
                        self.expire_session();
                        Err(failure.into_error(original))
                    }
                }
            }
        }
    }

    /// Decide the recovery path. Runs entirely under the refresh lock with no
    /// suspension point, so two requests can never both initiate.
    fn begin_recovery(&self, sent_with: Option<&Secret<String>>) -> Recovery {
        let mut refresh = state::lock(&self.refresh);
        if refresh.is_idle() {
            match (sent_with, self.auth.access_token()) {
                (Some(sent), Some(current)) if current != *sent => {
                    return Recovery::Rotated(current);
                }
                (None, Some(current)) => return Recovery::Rotated(current),
                (Some(_), None) => return Recovery::Ended,
                _ => {}
            }
        }
        match refresh.enter() {
            Entry::Initiator => Recovery::Initiate,
            Entry::Waiter(released) => Recovery::Wait(released),
        }
    }

    /// Exchange the stored refresh token for a new pair and install it.
    async fn refresh_credential(&self) -> std::result::Result<Secret<String>, RefreshFailure> {
        let stored = match self.tokens.get().await {
            Ok(Some(token)) => token,
            Ok(None) => return Err(RefreshFailure::NoRefreshToken),
            Err(e) => {
                warn!(error = %e, "failed to read stored refresh token");
                return Err(RefreshFailure::NoRefreshToken);
            }
        };

        let grant =
            session_auth::refresh(self.transport.as_ref(), &self.endpoints.refresh, &stored)
                .await?;

        if let Err(e) = self.tokens.set(grant.credential.refresh_token.clone()).await {
            warn!(error = %e, "failed to persist refreshed token");
        }
        self.auth.set_access_token(grant.credential.access_token.clone());
        Ok(grant.credential.access_token)
    }

    async fn replay(&self, request: &ApiRequest, token: &Secret<String>) -> Result<ApiResponse> {
        metrics::record_replay();
        let outbound = request.replay().with_bearer(Some(token.expose()));
        let response = self.dispatch(&outbound).await?;

        if response.is_success() {
            return Ok(response);
        }
        self.notify_detail(&response);

        if response.status == StatusCode::UNAUTHORIZED {
            self.expire_if_current(Some(token));
            return Err(GatewayError::AuthorizationExpired { response });
        }
        Err(GatewayError::Upstream { response })
    }

    /// One transport round trip, with metrics.
    pub(crate) async fn dispatch(&self, request: &ApiRequest) -> Result<ApiResponse> {
        match self.transport.send(request).await {
            Ok(response) => {
                metrics::record_response(response.status.as_u16());
                debug!(
                    status = response.status.as_u16(),
                    attempt = ?request.attempt(),
                    "response received"
                );
                Ok(response)
            }
            Err(e) => {
                metrics::record_network_failure();
                warn!(error = %e, "request failed without a response");
                Err(GatewayError::Network(e))
            }
        }
    }

    pub(crate) fn notify_detail(&self, response: &ApiResponse) {
        if let Some(detail) = response.detail() {
            self.notifier.show(&detail, Severity::Error);
        }
    }

    /// End the session after a 401 on a replay, unless another replay of the
    /// same episode already did. Only the token the replay carried is torn
    /// down; the check and the clear run under the refresh lock.
    fn expire_if_current(&self, used: Option<&Secret<String>>) {
        let _refresh = state::lock(&self.refresh);
        match (used, self.auth.access_token()) {
            (Some(used), Some(current)) if current == *used => {
                warn!("401 on a replayed request, ending session");
                self.expire_session();
            }
            _ => debug!("401 on a replayed request, session already ended"),
        }
    }

    fn expire_session(&self) {
        metrics::record_session_expired();
        self.notifier.show(SESSION_EXPIRED_MESSAGE, Severity::Error);
        self.auth.clear();
    }
}

fn new_request_id() -> String {
    format!("req_{}", uuid::Uuid::new_v4().simple())
}
