//! Refresh token persistence
//!
//! The refresh token is the only credential that outlives the process. The
//! access token is held in memory by `AuthState` and is never written to disk.
//!
//! `FileTokenStore` keeps the token in a small JSON file. All writes use atomic
//! temp-file + rename so a crash mid-write never leaves a truncated token, and
//! a tokio Mutex serializes writers (refresh and sign-out may race).

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use common::Secret;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// An access/refresh token pair as issued by the token endpoint.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Short-lived bearer token attached to every request
    pub access_token: Secret<String>,
    /// Long-lived token exchanged for a new pair
    pub refresh_token: Secret<String>,
}

/// Persistent storage for the refresh token.
///
/// Uses `Pin<Box<dyn Future>>` return types so the gateway can hold an
/// `Arc<dyn RefreshTokenStore>`.
pub trait RefreshTokenStore: Send + Sync {
    /// The stored refresh token, or `None` when nobody is signed in.
    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Option<Secret<String>>>> + Send + '_>>;

    /// Replace the stored refresh token.
    fn set(&self, token: Secret<String>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Forget the stored refresh token. Removing an absent token is not an error.
    fn remove(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// On-disk layout of the token file.
#[derive(Serialize, Deserialize)]
struct TokenFile {
    refresh_token: String,
}

/// File-backed refresh token store.
///
/// The token is read once at `load` and cached; the file is rewritten on every
/// `set` and deleted on `remove`.
pub struct FileTokenStore {
    path: PathBuf,
    state: Mutex<Option<Secret<String>>>,
}

impl FileTokenStore {
    /// Load the token file at `path`. A missing file means no stored token.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let token = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let file: TokenFile = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), "loaded stored refresh token");
            Some(Secret::new(file.refresh_token)).filter(|t| !t.is_empty())
        } else {
            info!(path = %path.display(), "no token file, starting signed out");
            None
        };

        Ok(Self {
            path,
            state: Mutex::new(token),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RefreshTokenStore for FileTokenStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Option<Secret<String>>>> + Send + '_>> {
        Box::pin(async move { Ok(self.state.lock().await.clone()) })
    }

    fn set(&self, token: Secret<String>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            write_atomic(&self.path, &token).await?;
            *state = Some(token);
            Ok(())
        })
    }

    fn remove(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => debug!(path = %self.path.display(), "removed token file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(format!("removing token file: {e}"))),
            }
            *state = None;
            Ok(())
        })
    }
}

/// Write the token file atomically with 0600 permissions on unix.
async fn write_atomic(path: &Path, token: &Secret<String>) -> Result<()> {
    let json = serde_json::to_string_pretty(&TokenFile {
        refresh_token: token.expose().clone(),
    })
    .map_err(|e| Error::CredentialParse(format!("serializing token file: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;
    let tmp_path = dir.join(format!(".refresh_token.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted refresh token");
    Ok(())
}

/// In-process refresh token store, for tests and embedders with their own persistence.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: std::sync::Mutex<Option<Secret<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: std::sync::Mutex::new(Some(Secret::from(token))),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Secret<String>>> {
        self.token
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl RefreshTokenStore for MemoryTokenStore {
    fn get(&self) -> Pin<Box<dyn Future<Output = Result<Option<Secret<String>>>> + Send + '_>> {
        let token = self.slot().clone();
        Box::pin(async move { Ok(token) })
    }

    fn set(&self, token: Secret<String>) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        *self.slot() = Some(token);
        Box::pin(async { Ok(()) })
    }

    fn remove(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        *self.slot() = None;
        Box::pin(async { Ok(()) })
    }
}
