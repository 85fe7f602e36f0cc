//! Outbound request descriptor

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Whether a request is the caller's original attempt or a replay issued
/// after a credential refresh. Replays are never refreshed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Attempt {
    #[default]
    Initial,
    Replay,
}

/// Everything needed to (re)send a request: method, path relative to the
/// transport's base URL, query pairs, headers and an optional JSON body.
///
/// Descriptors are values. Attaching credentials or marking a replay returns
/// a new descriptor rather than mutating one the caller may still hold.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
    attempt: Attempt,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            attempt: Attempt::Initial,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// Copy of this request marked as a post-refresh replay.
    pub fn replay(&self) -> Self {
        Self {
            attempt: Attempt::Replay,
            ..self.clone()
        }
    }

    /// Set `Authorization: Bearer <token>`, or strip any Authorization header
    /// when `token` is `None`.
    ///
    /// A token that cannot be encoded as a header value is dropped with a
    /// warning; the request then goes out without credentials.
    pub fn with_bearer(mut self, token: Option<&str>) -> Self {
        self.headers.remove(AUTHORIZATION);
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {token}")) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    self.headers.insert(AUTHORIZATION, value);
                }
                Err(e) => {
                    warn!(error = %e, "access token is not a valid header value, sending without credentials");
                }
            }
        }
        self
    }

    /// The bearer token currently attached, if any.
    pub fn bearer(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_initial_attempt_without_credentials() {
        let req = ApiRequest::get("/users");
        assert_eq!(req.attempt(), Attempt::Initial);
        assert_eq!(req.method, Method::GET);
        assert!(req.bearer().is_none());
        assert!(req.body.is_none());
    }

    #[test]
    fn replay_leaves_original_untouched() {
        let original = ApiRequest::post("/zakat", serde_json::json!({"amount": 10}))
            .with_query("page", "2");
        let replay = original.replay();

        assert_eq!(original.attempt(), Attempt::Initial);
        assert_eq!(replay.attempt(), Attempt::Replay);
        assert_eq!(replay.path, "/zakat");
        assert_eq!(replay.query, vec![("page".to_string(), "2".to_string())]);
        assert_eq!(replay.body, original.body);
    }

    #[test]
    fn with_bearer_sets_and_replaces_authorization() {
        let req = ApiRequest::get("/a").with_bearer(Some("A1"));
        assert_eq!(req.bearer(), Some("A1"));
        assert!(req.headers.get(AUTHORIZATION).unwrap().is_sensitive());

        let req = req.with_bearer(Some("A2"));
        assert_eq!(req.bearer(), Some("A2"));
        assert_eq!(req.headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn with_bearer_none_strips_stale_header() {
        let req = ApiRequest::get("/a")
            .with_header(AUTHORIZATION, HeaderValue::from_static("Bearer stale"))
            .with_bearer(None);
        assert!(req.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn unencodable_token_is_dropped() {
        let req = ApiRequest::get("/a").with_bearer(Some("bad\ntoken"));
        assert!(req.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn other_headers_survive_credential_changes() {
        let req = ApiRequest::get("/a")
            .with_header(
                HeaderName::from_static("x-client"),
                HeaderValue::from_static("dashboard"),
            )
            .with_bearer(Some("A1"))
            .with_bearer(None);
        assert_eq!(req.headers.get("x-client").unwrap(), "dashboard");
    }
}
