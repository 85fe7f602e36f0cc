//! Authenticated request gateway for the dashboard backend
//!
//! Every request goes out with the current bearer token. A 401 triggers one
//! shared token refresh no matter how many requests failed together, after
//! which each of them is replayed once. See `gateway` for the recovery rules.

pub mod error;
pub mod gateway;
pub mod metrics;
pub mod notify;
pub mod session;
pub mod state;

#[cfg(test)]
mod test_support;

pub use error::{GatewayError, Result};
pub use gateway::{Endpoints, Gateway, RequestOptions};
pub use notify::{Notifier, SESSION_EXPIRED_MESSAGE, Severity, TracingNotifier};
pub use session::{SIGN_IN_FAILED_MESSAGE, SIGNED_IN_MESSAGE, SIGNED_OUT_MESSAGE};
pub use state::RefreshPhase;
