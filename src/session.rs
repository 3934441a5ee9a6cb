use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

const SESSION_FILE: &str = "session.json";
const SESSION_DIR: &str = ".fintrack";

/// The active token pair. Both tokens are always stored and cleared
/// together; there is at most one session at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
}

/// Storage for the current session, injected into [`crate::ApiClient`].
///
/// Writes and clears are infallible from the caller's point of view;
/// implementations log failures instead of surfacing them so that logout
/// stays idempotent.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session);
    fn clear(&self);
}

/// In-process store, used by tests and embedders that manage persistence
/// themselves.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, session: &Session) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
    }

    fn clear(&self) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// JSON file store used by the CLI, kept under the user's home directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Resolves the session file from `$FINTRACK_HOME/session.json` when
    /// set, otherwise `$HOME/.fintrack/session.json`. `None` when neither
    /// variable yields a usable directory.
    pub fn from_env() -> Option<Self> {
        if let Ok(home) = std::env::var("FINTRACK_HOME") {
            let trimmed = home.trim();
            if !trimmed.is_empty() {
                return Some(Self::new(PathBuf::from(trimmed).join(SESSION_FILE)));
            }
        }

        let home = std::env::var("HOME").ok()?;
        let trimmed = home.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self::new(
            PathBuf::from(trimmed).join(SESSION_DIR).join(SESSION_FILE),
        ))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        serde_json::from_str(&data).ok()
    }

    fn save(&self, session: &Session) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(session) {
            Ok(data) => {
                if let Err(err) = std::fs::write(&self.path, data) {
                    tracing::warn!(path = %self.path.display(), %err, "failed to persist session");
                }
            }
            Err(err) => tracing::warn!(%err, "failed to serialize session"),
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "failed to remove session file")
            }
        }
    }
}
