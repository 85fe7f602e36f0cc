//! Dashboard API endpoint defaults
//!
//! Paths are relative to the configured base URL and can be overridden in the
//! `[api]` config section.

/// Token refresh endpoint. Takes `{"refreshToken": ...}`, returns a rotated pair.
pub const DEFAULT_REFRESH_PATH: &str = "/Auth/Refresh";

/// Email/password sign-in endpoint.
pub const DEFAULT_LOGIN_PATH: &str = "/Auth/Login";

/// Sign-out endpoint. Revokes the refresh token server-side.
pub const DEFAULT_LOGOUT_PATH: &str = "/Auth/Logout";

/// File name used for the persisted refresh token when no path is configured.
pub const DEFAULT_TOKEN_FILE: &str = "refresh_token.json";
