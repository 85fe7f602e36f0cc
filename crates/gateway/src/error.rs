//! Errors surfaced to gateway callers

use transport::{ApiResponse, StatusCode, TransportError};

/// Why a gateway call failed.
///
/// The two session-terminating variants carry the caller's ORIGINAL 401
/// response: a failed recovery never replaces the error the caller would
/// have seen without it.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Session expired and could not be renewed. Local auth state was cleared.
    #[error("authorization expired ({})", .response.status)]
    AuthorizationExpired { response: ApiResponse },

    /// The refresh endpoint was unreachable or answered with an unusable payload.
    /// Local auth state was cleared.
    #[error("session refresh failed: {reason}")]
    RefreshTransportFailure {
        response: ApiResponse,
        reason: String,
    },

    /// Any other non-2xx response, untouched.
    #[error("upstream returned {}", .response.status)]
    Upstream { response: ApiResponse },

    /// No response at all (timeout, DNS, connection reset).
    #[error("network failure: {0}")]
    Network(#[from] TransportError),

    /// Sign-in, sign-out or restore failed against the token endpoint.
    #[error("session operation failed: {0}")]
    Session(#[from] session_auth::Error),
}

impl GatewayError {
    /// True when the user must sign in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            GatewayError::AuthorizationExpired { .. } | GatewayError::RefreshTransportFailure { .. }
        )
    }

    /// The HTTP response behind this error, if one was received.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            GatewayError::AuthorizationExpired { response }
            | GatewayError::RefreshTransportFailure { response, .. }
            | GatewayError::Upstream { response } => Some(response),
            GatewayError::Network(_) | GatewayError::Session(_) => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|r| r.status)
    }
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
