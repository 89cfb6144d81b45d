//! Process-wide session token store.
//!
//! The single accessor for the authentication credential. Initialised from
//! the persisted token file on startup; every mutation is a whole-value set
//! or clear, and the last writer wins.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use docchat_core::error::DocChatError;
use docchat_core::{AuthResponse, ClientEvent, EventBus, Session};
use tracing::{debug, info, warn};

/// Holds the session token in memory and mirrors it to one well-known file.
pub struct SessionStore {
    token: RwLock<Option<String>>,
    path: Option<PathBuf>,
    events: EventBus,
}

impl SessionStore {
    /// Open the store backed by `path`, loading any persisted token.
    ///
    /// A missing, unreadable or blank file means "not authenticated".
    pub fn open(path: impl Into<PathBuf>, events: EventBus) -> Self {
        let path = path.into();
        let token = read_token(&path);
        if token.is_some() {
            info!("Session token loaded from {}", path.display());
        } else {
            debug!("No session token at {}", path.display());
        }
        Self {
            token: RwLock::new(token),
            path: Some(path),
            events,
        }
    }

    /// A store that never touches disk.
    pub fn in_memory(events: EventBus) -> Self {
        Self {
            token: RwLock::new(None),
            path: None,
            events,
        }
    }

    /// Current credential as a value.
    pub fn snapshot(&self) -> Session {
        Session { token: self.token() }
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Accept the `{ token }` body of a successful sign-in or sign-up.
    pub fn establish(&self, response: AuthResponse) -> Result<(), DocChatError> {
        self.set_token(&response.token)
    }

    /// Store a token. The in-memory value is replaced even if persisting fails.
    pub fn set_token(&self, token: &str) -> Result<(), DocChatError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(DocChatError::SessionStorage(
                "refusing to store an empty token".to_string(),
            ));
        }
        let persisted = {
            let mut current = self.write();
            *current = Some(token.to_string());
            self.persist(Some(token))
        };
        self.changed(true);
        persisted?;
        if let Some(path) = &self.path {
            info!("Session token saved to {}", path.display());
        }
        Ok(())
    }

    /// Explicit logout: clear the token and its persisted copy.
    pub fn logout(&self) -> Result<(), DocChatError> {
        let removed = {
            let mut current = self.write();
            *current = None;
            self.persist(None)
        };
        self.changed(false);
        removed?;
        info!("Logged out");
        Ok(())
    }

    /// The backend rejected `token`; drop it if it is still the current one.
    ///
    /// A token stored after the rejected request was issued is left alone.
    /// Returns whether the session was cleared.
    pub fn invalidate(&self, token: &str, reason: &str) -> bool {
        {
            let mut current = self.write();
            if current.as_deref() != Some(token) {
                debug!(reason = %reason, "Ignoring auth failure for a superseded token");
                return false;
            }
            *current = None;
            if let Err(e) = self.persist(None) {
                warn!(error = %e, "Failed to remove persisted token");
            }
        }
        warn!(reason = %reason, "Session invalidated by backend");
        self.changed(false);
        true
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<String>> {
        self.token.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mirror `token` to disk. Called with the write lock held so the file
    /// always matches the last in-memory write.
    fn persist(&self, token: Option<&str>) -> Result<(), DocChatError> {
        match (&self.path, token) {
            (None, _) => Ok(()),
            (Some(path), Some(token)) => write_token(path, token),
            (Some(path), None) => remove_token(path),
        }
    }

    fn changed(&self, authenticated: bool) {
        self.events
            .publish(ClientEvent::SessionChanged { authenticated });
    }
}

fn read_token(path: &Path) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let token = contents.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn write_token(path: &Path, token: &str) -> Result<(), DocChatError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, token)?;
    // Restrict token file to owner-only access.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn remove_token(path: &Path) -> Result<(), DocChatError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
