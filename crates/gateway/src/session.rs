//! Sign-in, sign-out and start-up session restore

use common::Secret;
use session_auth::{SessionGrant, logout_request};
use tracing::{info, instrument, warn};

use crate::error::{GatewayError, Result};
use crate::gateway::Gateway;
use crate::notify::Severity;

pub const SIGNED_IN_MESSAGE: &str = "Signed in";
pub const SIGN_IN_FAILED_MESSAGE: &str = "Sign in failed";
pub const SIGNED_OUT_MESSAGE: &str = "Signed out";

impl Gateway {
    /// Exchange email and password for a session and install it.
    ///
    /// Goes straight to the transport: a 401 here means bad credentials, not
    /// an expired token, so it never triggers a refresh.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, email: &str, password: &Secret<String>) -> Result<()> {
        let grant = session_auth::login(
            self.transport.as_ref(),
            &self.endpoints.login,
            email,
            password,
        )
        .await
        .and_then(require_user);

        let (credential, user) = match grant {
            Ok(granted) => granted,
            Err(e) => {
                let message = match &e {
                    session_auth::Error::Rejected {
                        detail: Some(detail),
                        ..
                    } => detail.clone(),
                    _ => SIGN_IN_FAILED_MESSAGE.to_string(),
                };
                warn!(error = %e, "sign-in failed");
                self.notifier.show(&message, Severity::Error);
                return Err(GatewayError::Session(e));
            }
        };

        self.tokens.set(credential.refresh_token).await?;
        self.auth.set_access_token(credential.access_token);
        info!(user_id = user.id, "signed in");
        self.auth.set_user(user);
        self.notifier.show(SIGNED_IN_MESSAGE, Severity::Success);
        Ok(())
    }

    /// Revoke the refresh token server-side if possible, then forget the session.
    #[instrument(skip_all)]
    pub async fn sign_out(&self) {
        let stored = match self.tokens.get().await {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to read stored refresh token");
                None
            }
        };

        // Sent once with whatever token is held; an expired one is not refreshed
        let current = self.auth.access_token();
        let request = logout_request(&self.endpoints.logout, stored.as_ref())
            .with_bearer(current.as_ref().map(|t| t.expose().as_str()));
        match self.dispatch(&request).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => warn!(
                status = response.status.as_u16(),
                "logout rejected, clearing session anyway"
            ),
            Err(e) => warn!(error = %e, "logout request failed, clearing session anyway"),
        }

        if let Err(e) = self.tokens.remove().await {
            warn!(error = %e, "failed to remove stored refresh token");
        }
        self.auth.clear();
        info!("signed out");
        self.notifier.show(SIGNED_OUT_MESSAGE, Severity::Success);
    }

    /// Resume the persisted session at start-up. Returns whether a user is
    /// now signed in; failures leave the identity `Anonymous` and are silent.
    #[instrument(skip_all)]
    pub async fn restore_session(&self) -> bool {
        let stored = match self.tokens.get().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                self.auth.clear();
                return false;
            }
            Err(e) => {
                warn!(error = %e, "failed to read stored refresh token");
                self.auth.clear();
                return false;
            }
        };

        let restored = session_auth::refresh(
            self.transport.as_ref(),
            &self.endpoints.refresh,
            &stored,
        )
        .await
        .and_then(require_user);

        match restored {
            Ok((credential, user)) => {
                if let Err(e) = self.tokens.set(credential.refresh_token).await {
                    warn!(error = %e, "failed to persist refreshed token");
                }
                self.auth.set_access_token(credential.access_token);
                info!(user_id = user.id, "session restored");
                self.auth.set_user(user);
                true
            }
            Err(e) => {
                info!(error = %e, "stored session could not be restored");
                self.auth.clear();
                false
            }
        }
    }
}

fn require_user(
    grant: SessionGrant,
) -> session_auth::Result<(session_auth::Credential, session_auth::User)> {
    match grant.user {
        Some(user) => Ok((grant.credential, user)),
        None => Err(session_auth::Error::MalformedResponse(
            "missing data.user".into(),
        )),
    }
}
