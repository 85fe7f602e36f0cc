//! Error types for session credential operations

/// Errors from token endpoint calls and credential storage.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token endpoint returned {status}")]
    Rejected { status: u16, detail: Option<String> },

    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for session credential operations.
pub type Result<T> = std::result::Result<T, Error>;
