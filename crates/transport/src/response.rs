//! Buffered response

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// A fully-read HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Response with a JSON body and `content-type: application/json`.
    pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self::new(status, headers, Bytes::from(value.to_string()))
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Decode the payload of the backend's `{ "data": ... }` envelope.
    pub fn data<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        self.json::<Envelope<T>>().map(|envelope| envelope.data)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The backend's `detail` error string, when the body is JSON and carries
    /// a non-empty one.
    pub fn detail(&self) -> Option<String> {
        let value: serde_json::Value = self.json().ok()?;
        match value.get("detail")?.as_str()? {
            "" => None,
            detail => Some(detail.to_owned()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn detail_extracted_from_error_body() {
        let resp = ApiResponse::json_body(
            StatusCode::BAD_REQUEST,
            &json!({"detail": "Email already registered"}),
        );
        assert_eq!(resp.detail().as_deref(), Some("Email already registered"));
        assert!(!resp.is_success());
    }

    #[test]
    fn empty_or_missing_detail_is_none() {
        let empty = ApiResponse::json_body(StatusCode::UNAUTHORIZED, &json!({"detail": ""}));
        assert!(empty.detail().is_none());

        let missing = ApiResponse::json_body(StatusCode::NOT_FOUND, &json!({"error": "nope"}));
        assert!(missing.detail().is_none());

        let numeric = ApiResponse::json_body(StatusCode::NOT_FOUND, &json!({"detail": 7}));
        assert!(numeric.detail().is_none());
    }

    #[test]
    fn non_json_body_has_no_detail() {
        let resp = ApiResponse::new(
            StatusCode::BAD_GATEWAY,
            HeaderMap::new(),
            Bytes::from_static(b"<html>bad gateway</html>"),
        );
        assert!(resp.detail().is_none());
        assert_eq!(resp.text(), "<html>bad gateway</html>");
    }

    #[test]
    fn json_decodes_typed_body() {
        #[derive(serde::Deserialize)]
        struct Page {
            total: u32,
        }
        let resp = ApiResponse::json_body(StatusCode::OK, &json!({"total": 42}));
        assert_eq!(resp.json::<Page>().unwrap().total, 42);
        assert_eq!(resp.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn data_unwraps_envelope() {
        let resp = ApiResponse::json_body(
            StatusCode::OK,
            &json!({"data": [{"id": 1}, {"id": 2}], "total": 2}),
        );
        let items: Vec<serde_json::Value> = resp.data().unwrap();
        assert_eq!(items.len(), 2);

        let bare = ApiResponse::json_body(StatusCode::OK, &json!([1, 2]));
        assert!(bare.data::<Vec<u32>>().is_err());
    }
}
