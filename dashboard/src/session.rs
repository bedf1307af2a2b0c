//! The signed-in user, persisted across restarts.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use payloads::{Role, User, UserId};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Fixed key the session is persisted under.
pub const STORAGE_KEY: &str = "session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub username: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Absent between signup and verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            verified: user.verified,
            name: Some(user.name),
            last_name: Some(user.last_name),
            email: Some(user.email),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    LoggedOut,
    Unverified,
    Verified,
}

/// Where a request for a private page should end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Login,
    Verify,
    Granted,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Could not access the saved session: {0}")]
    Io(#[from] std::io::Error),
    #[error("Saved session is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Malformed token: {0}")]
    MalformedToken(#[from] jsonwebtoken::errors::Error),
}

/// Durable key-value slot holding the serialized session.
pub trait SessionStorage: Debug + Send + Sync {
    fn load(&self) -> Result<Option<String>, SessionError>;
    fn save(&self, value: &str) -> Result<(), SessionError>;
    fn clear(&self) -> Result<(), SessionError>;
}

/// Stores the session as `<dir>/session.json`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(format!("{STORAGE_KEY}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, value: &str) -> Result<(), SessionError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, value)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// In-process storage, for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    value: Mutex<Option<String>>,
    clears: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
            clears: AtomicUsize::new(0),
        }
    }

    pub fn raw(&self) -> Option<String> {
        self.slot().clone()
    }

    /// How many times the slot has been cleared.
    pub fn clear_count(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.value.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<String>, SessionError> {
        Ok(self.raw())
    }

    fn save(&self, value: &str) -> Result<(), SessionError> {
        *self.slot() = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionError> {
        *self.slot() = None;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Persisted {
    state: PersistedState,
    version: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedState {
    user: Option<SessionUser>,
}

/// Handle to the current session. Clones share the same user.
#[derive(Debug, Clone)]
pub struct SessionStore {
    user: Arc<Mutex<Option<SessionUser>>>,
    storage: Arc<dyn SessionStorage>,
}

impl SessionStore {
    /// Restore the session saved in `storage`. Unreadable state is treated
    /// as logged out.
    pub fn rehydrate(storage: Arc<dyn SessionStorage>) -> Self {
        let user = match storage.load() {
            Ok(Some(raw)) => match serde_json::from_str::<Persisted>(&raw) {
                Ok(persisted) => persisted.state.user,
                Err(e) => {
                    tracing::warn!("Discarding saved session: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("Discarding saved session: {e}");
                None
            }
        };
        if let Some(user) = &user {
            tracing::debug!(username = %user.username, "Restored session");
        }
        Self {
            user: Arc::new(Mutex::new(user)),
            storage,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<SessionUser>> {
        self.user.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.slot().clone()
    }

    pub fn token(&self) -> Option<String> {
        self.slot().as_ref().and_then(|user| user.token.clone())
    }

    pub fn is_logged_in(&self) -> bool {
        self.slot().is_some()
    }

    pub fn state(&self) -> AuthState {
        match self.slot().as_ref() {
            None => AuthState::LoggedOut,
            Some(user) if user.verified => AuthState::Verified,
            Some(_) => AuthState::Unverified,
        }
    }

    /// The private-route decision: log in first, then verify, then the page.
    pub fn access(&self) -> Access {
        match self.state() {
            AuthState::LoggedOut => Access::Login,
            AuthState::Unverified => Access::Verify,
            AuthState::Verified => Access::Granted,
        }
    }

    pub fn set_user(&self, user: Option<SessionUser>) {
        let mut slot = self.slot();
        *slot = user;
        self.persist(&slot);
    }

    /// Replace the token of the current user. Ignored when logged out.
    pub fn set_token(&self, token: &str) {
        let mut slot = self.slot();
        if let Some(user) = slot.as_mut() {
            user.token = Some(token.to_string());
            self.persist(&slot);
        }
    }

    pub fn mark_verified(&self) {
        let mut slot = self.slot();
        if let Some(user) = slot.as_mut() {
            user.verified = true;
            self.persist(&slot);
        }
    }

    /// Forget the user and the persisted session. Returns whether anyone was
    /// logged in.
    pub fn logout(&self) -> bool {
        let previous = self.slot().take();
        if let Err(e) = self.storage.clear() {
            tracing::error!("Failed to clear saved session: {e}");
        }
        if let Some(user) = &previous {
            tracing::info!(username = %user.username, "Logged out");
        }
        previous.is_some()
    }

    fn persist(&self, user: &Option<SessionUser>) {
        let persisted = Persisted {
            state: PersistedState { user: user.clone() },
            version: 0,
        };
        let result = serde_json::to_string(&persisted)
            .map_err(SessionError::from)
            .and_then(|raw| self.storage.save(&raw));
        if let Err(e) = result {
            tracing::error!("Failed to save session: {e}");
        }
    }
}

/// Read the user claims out of a token. The signature is not checked; the
/// backend does that on every request.
pub fn decode_token(token: &str) -> Result<SessionUser, SessionError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.required_spec_claims.clear();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let mut user = decode::<SessionUser>(token, &DecodingKey::from_secret(&[]), &validation)?.claims;
    user.token = Some(token.to_string());
    Ok(user)
}
