//! Scripted collaborators for gateway tests

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use common::Secret;
use serde_json::json;
use session_auth::{InMemoryAuthState, MemoryTokenStore, RefreshTokenStore};
use tokio::sync::Notify;
use transport::{ApiRequest, ApiResponse, StatusCode, Transport};

use crate::gateway::Gateway;
use crate::notify::{Notifier, Severity};

type Handler = dyn Fn(&ApiRequest) -> transport::Result<ApiResponse> + Send + Sync;

/// Transport answering from a closure and recording every request it sees.
///
/// A gate holds the FIRST request to its path until notified, after the
/// request has been recorded. Later requests to that path pass straight through.
pub struct MockTransport {
    handler: Box<Handler>,
    sent: Mutex<Vec<ApiRequest>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl MockTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> transport::Result<ApiResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            sent: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn gate(self, path: &str, gate: Arc<Notify>) -> Self {
        self.gates.lock().unwrap().insert(path.to_string(), gate);
        self
    }

    pub fn sent(&self) -> Vec<ApiRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, path: &str) -> Vec<ApiRequest> {
        self.sent()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

impl Transport for MockTransport {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = transport::Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move {
            self.sent.lock().unwrap().push(request.clone());
            let gate = self.gates.lock().unwrap().remove(&request.path);
            if let Some(gate) = gate {
                gate.notified().await;
            }
            (self.handler)(request)
        })
    }
}

/// Token store whose first `get` waits for a notification.
pub struct GatedTokenStore {
    inner: MemoryTokenStore,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl GatedTokenStore {
    pub fn new(token: Option<&str>, gate: Arc<Notify>) -> Self {
        Self {
            inner: token.map(MemoryTokenStore::with_token).unwrap_or_default(),
            gate: Mutex::new(Some(gate)),
        }
    }
}

impl RefreshTokenStore for GatedTokenStore {
    fn get(
        &self,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<Option<Secret<String>>>> + Send + '_>> {
        Box::pin(async move {
            let gate = self.gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            self.inner.get().await
        })
    }

    fn set(
        &self,
        token: Secret<String>,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<()>> + Send + '_>> {
        self.inner.set(token)
    }

    fn remove(&self) -> Pin<Box<dyn Future<Output = session_auth::Result<()>> + Send + '_>> {
        self.inner.remove()
    }
}

/// Notifier that keeps every message it was asked to show.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(String, Severity)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn count(&self, message: &str) -> usize {
        self.messages()
            .iter()
            .filter(|(m, _)| m == message)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, message: &str, severity: Severity) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }
}

/// A gateway wired to scripted collaborators, with handles to inspect them.
pub struct Harness {
    pub gateway: Arc<Gateway>,
    pub transport: Arc<MockTransport>,
    pub tokens: Arc<dyn RefreshTokenStore>,
    pub auth: Arc<InMemoryAuthState>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(transport: MockTransport, stored: Option<&str>, access: Option<&str>) -> Self {
        let tokens = stored.map(MemoryTokenStore::with_token).unwrap_or_default();
        Self::with_tokens(transport, tokens, access)
    }

    pub fn with_tokens(
        transport: MockTransport,
        tokens: impl RefreshTokenStore + 'static,
        access: Option<&str>,
    ) -> Self {
        let transport = Arc::new(transport);
        let tokens: Arc<dyn RefreshTokenStore> = Arc::new(tokens);
        let auth = Arc::new(access.map(InMemoryAuthState::with_access_token).unwrap_or_default());
        let notifier = Arc::new(RecordingNotifier::default());
        let gateway = Arc::new(Gateway::new(
            transport.clone(),
            tokens.clone(),
            auth.clone(),
            notifier.clone(),
        ));
        Self {
            gateway,
            transport,
            tokens,
            auth,
            notifier,
        }
    }
}

pub fn ok(body: serde_json::Value) -> ApiResponse {
    ApiResponse::json_body(StatusCode::OK, &body)
}

pub fn unauthorized() -> ApiResponse {
    ApiResponse::json_body(StatusCode::UNAUTHORIZED, &json!({"title": "Unauthorized"}))
}

pub fn refresh_ok(access: &str, refresh: &str) -> ApiResponse {
    ok(json!({
        "data": {"token": {"accessToken": access, "refreshToken": refresh}}
    }))
}

pub fn session_ok(access: &str, refresh: &str, email: &str) -> ApiResponse {
    ok(json!({
        "data": {
            "token": {"accessToken": access, "refreshToken": refresh},
            "user": {"id": 1, "email": email, "userRoleCode": "ADMIN"}
        }
    }))
}
