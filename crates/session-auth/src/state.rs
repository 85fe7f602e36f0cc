//! In-memory auth state: current access token and signed-in user

use std::sync::{PoisonError, RwLock};

use common::Secret;
use serde::{Deserialize, Serialize};

/// A dashboard user as returned by the backend.
///
/// `userProfile` is carried as opaque JSON; nothing in the gateway inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub status_code: Option<String>,
    #[serde(default)]
    pub user_role_code: Option<String>,
    #[serde(default)]
    pub user_profile: Option<serde_json::Value>,
}

/// Who is signed in, as far as this process knows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum UserIdentity {
    /// Start-up: the stored session has not been restored yet
    #[default]
    Unknown,
    /// Resolved: nobody is signed in
    Anonymous,
    Known(User),
}

/// Holder for the current access token and user identity.
///
/// Read on every outbound request and written once per successful refresh,
/// so implementations must be cheap and never block on I/O.
pub trait AuthState: Send + Sync {
    fn access_token(&self) -> Option<Secret<String>>;

    fn set_access_token(&self, token: Secret<String>);

    fn user(&self) -> UserIdentity;

    fn set_user(&self, user: User);

    /// Drop the access token and mark the user as signed out.
    fn clear(&self);
}

#[derive(Default)]
struct Inner {
    access_token: Option<Secret<String>>,
    user: UserIdentity,
}

/// Process-local `AuthState` behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryAuthState {
    inner: RwLock<Inner>,
}

impl InMemoryAuthState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State already holding an access token, user still unknown.
    pub fn with_access_token(token: &str) -> Self {
        let state = Self::new();
        state.set_access_token(Secret::from(token));
        state
    }
}

impl AuthState for InMemoryAuthState {
    fn access_token(&self) -> Option<Secret<String>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.access_token.clone()
    }

    fn set_access_token(&self, token: Secret<String>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.access_token = Some(token).filter(|t| !t.is_empty());
    }

    fn user(&self) -> UserIdentity {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.user.clone()
    }

    fn set_user(&self, user: User) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.user = UserIdentity::Known(user);
    }

    fn clear(&self) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.access_token = None;
        inner.user = UserIdentity::Anonymous;
    }
}
