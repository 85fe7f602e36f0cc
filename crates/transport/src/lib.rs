//! Minimal HTTP transport abstraction
//!
//! Defines the `Transport` trait that decouples the authenticated gateway from
//! the HTTP client doing the actual I/O. `HttpTransport` sends requests with
//! reqwest; tests substitute a scripted transport. The gateway decorates a
//! transport instead of installing interceptors on a shared client, so every
//! request passes through exactly one `send` per attempt.

pub mod http;
mod request;
mod response;

pub use http::HttpTransport;
pub use request::{ApiRequest, Attempt};
pub use response::ApiResponse;

pub use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};

use std::future::Future;
use std::pin::Pin;

/// Transport-level failures: no HTTP response was received.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP transport error: {0}")]
    Other(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Sends a single request and returns whatever the server answered.
///
/// Non-2xx statuses are NOT errors at this layer; only a missing response is.
/// Uses `Pin<Box<dyn Future>>` so the gateway can hold an `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;
}
