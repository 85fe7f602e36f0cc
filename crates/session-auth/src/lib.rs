//! Session credentials for the dashboard API
//!
//! Provides the credential model, the refresh/login endpoint wire contract,
//! refresh-token persistence and the in-memory auth state the gateway reads
//! on every request. This crate performs no retry or coordination of its own;
//! that lives in the `gateway` crate.
//!
//! Credential flow:
//! 1. `token::login` exchanges email/password for a `SessionGrant`
//! 2. The refresh token is persisted via `RefreshTokenStore::set`
//! 3. The access token and user go into an `AuthState`
//! 4. On a 401, the gateway calls `token::refresh` with the stored refresh token
//! 5. The rotated pair replaces both the stored and in-memory tokens

pub mod constants;
pub mod credentials;
pub mod error;
pub mod state;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, FileTokenStore, MemoryTokenStore, RefreshTokenStore};
pub use error::{Error, Result};
pub use state::{AuthState, InMemoryAuthState, User, UserIdentity};
pub use token::{SessionGrant, login, logout_request, refresh, refresh_request};
