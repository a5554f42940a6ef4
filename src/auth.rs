//! Authentication state and its on-disk persistence.
//!
//! The store is an explicit context object shared between the REST client
//! and whatever owns the session. Persistence happens only in the named
//! lifecycle methods: [`AuthStore::set_auth`], [`AuthStore::update_user`],
//! [`AuthStore::logout`], and [`AuthStore::expire`] write through via
//! [`AuthStore::save`]; [`AuthStore::load`] restores on startup.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::client::ClientError;
use crate::model::{User, UserUpdate};
use crate::options::SecretString;

/// Directory under the home directory holding client state.
const STATE_DIR: &str = ".interview-prep";

/// File name of the persisted auth state.
const AUTH_FILE: &str = "auth.json";

/// Shared handle to the auth store.
pub type AuthContext = Arc<RwLock<AuthStore>>;

/// Who is logged in, if anyone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user: Option<User>,
    pub token: Option<SecretString>,
    pub is_authenticated: bool,
}

/// On-disk form; the token is stored in clear like a browser's local storage.
#[derive(Serialize, Deserialize)]
struct PersistedAuth {
    user: Option<User>,
    token: Option<String>,
    #[serde(rename = "isAuthenticated", alias = "is_authenticated")]
    is_authenticated: bool,
}

impl From<&AuthState> for PersistedAuth {
    fn from(state: &AuthState) -> Self {
        Self {
            user: state.user.clone(),
            token: state.token.as_ref().map(|t| t.expose_secret().to_string()),
            is_authenticated: state.is_authenticated,
        }
    }
}

impl From<PersistedAuth> for AuthState {
    fn from(persisted: PersistedAuth) -> Self {
        match (persisted.user, persisted.token) {
            // a token without its user (or the reverse) is not a usable session
            (Some(user), Some(token)) if persisted.is_authenticated => Self {
                user: Some(user),
                token: Some(token.into()),
                is_authenticated: true,
            },
            _ => Self::default(),
        }
    }
}

/// Holds the `{user, token, is_authenticated}` triple and optionally
/// mirrors it to a JSON file.
#[derive(Debug, Default)]
pub struct AuthStore {
    state: AuthState,
    path: Option<PathBuf>,
}

impl AuthStore {
    /// A store that never touches the filesystem.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// A store persisted at `path`. Nothing is read until [`load`](Self::load).
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            state: AuthState::default(),
            path: Some(path.into()),
        }
    }

    /// `~/.interview-prep/auth.json`, loaded.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn from_default_location() -> Option<Self> {
        let home = dirs::home_dir()?;
        let mut store = Self::with_path(home.join(STATE_DIR).join(AUTH_FILE));
        store.load();
        Some(store)
    }

    /// Wrap into a shareable [`AuthContext`].
    pub fn into_context(self) -> AuthContext {
        Arc::new(RwLock::new(self))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn user(&self) -> Option<&User> {
        self.state.user.as_ref()
    }

    pub fn token(&self) -> Option<&SecretString> {
        self.state.token.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.is_authenticated
    }

    /// Restore state from disk.
    ///
    /// A missing file means logged out. An unreadable or corrupt file is
    /// removed and also means logged out.
    pub fn load(&mut self) -> &AuthState {
        let Some(path) = self.path.clone() else {
            return &self.state;
        };

        self.state = match read_persisted(&path) {
            Ok(Some(persisted)) => persisted.into(),
            Ok(None) => AuthState::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "discarding unreadable auth state");
                if let Err(e) = fs::remove_file(&path) {
                    debug!(error = %e, "could not remove auth state file");
                }
                AuthState::default()
            }
        };

        debug!(authenticated = self.state.is_authenticated, "auth state loaded");
        &self.state
    }

    /// Write the current state to disk.
    ///
    /// A logged-out state removes the file rather than writing an empty one.
    pub fn save(&self) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if !self.state.is_authenticated {
            return match fs::remove_file(path) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &PersistedAuth::from(&self.state))?;
        writer.flush()?;
        Ok(())
    }

    /// Record a successful login or signup.
    pub fn set_auth(&mut self, user: User, token: SecretString) -> Result<(), ClientError> {
        self.state = AuthState {
            user: Some(user),
            token: Some(token),
            is_authenticated: true,
        };
        self.save()
    }

    /// Merge `update` into the stored user. Returns `false` when logged out.
    pub fn update_user(&mut self, update: UserUpdate) -> Result<bool, ClientError> {
        let Some(user) = self.state.user.as_mut() else {
            return Ok(false);
        };

        if let Some(email) = update.email {
            user.email = email;
        }
        if let Some(name) = update.name {
            user.name = Some(name);
        }

        self.save()?;
        Ok(true)
    }

    /// Forget the session at the user's request.
    pub fn logout(&mut self) -> Result<(), ClientError> {
        info!("logged out");
        self.clear()
    }

    /// Forget the session because the backend rejected the token.
    pub fn expire(&mut self) -> Result<(), ClientError> {
        info!("session expired");
        self.clear()
    }

    fn clear(&mut self) -> Result<(), ClientError> {
        self.state = AuthState::default();
        self.save()
    }
}

fn read_persisted(path: &Path) -> Result<Option<PersistedAuth>, ClientError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_reader(BufReader::new(file))?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user() -> User {
        User {
            id: 7,
            email: "jane@example.com".to_string(),
            name: Some("Jane".to_string()),
        }
    }

    fn store_in(dir: &TempDir) -> AuthStore {
        AuthStore::with_path(dir.path().join("nested").join(AUTH_FILE))
    }

    #[test]
    fn test_in_memory_starts_logged_out() {
        let store = AuthStore::in_memory();
        assert!(!store.is_authenticated());
        assert!(store.token().is_none());
        assert!(store.save().is_ok());
    }

    #[test]
    fn test_set_auth_persists_and_reloads() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_auth(user(), "tok-1".into()).unwrap();
        assert!(store.path().unwrap().exists());

        let mut reloaded = store_in(&dir);
        let state = reloaded.load().clone();
        assert!(state.is_authenticated);
        assert_eq!(state.user, Some(user()));
        assert_eq!(state.token.unwrap().expose_secret(), "tok-1");
    }

    #[test]
    fn test_logout_removes_file() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_auth(user(), "tok".into()).unwrap();
        store.logout().unwrap();

        assert!(!store.is_authenticated());
        assert!(!store.path().unwrap().exists());
        assert!(!store_in(&dir).load().is_authenticated);
    }

    #[test]
    fn test_expire_clears_state() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.set_auth(user(), "tok".into()).unwrap();
        store.expire().unwrap();

        assert_eq!(store.state(), &AuthState::default());
        assert!(!store.path().unwrap().exists());
    }

    #[test]
    fn test_load_missing_file_is_logged_out() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(!store.load().is_authenticated);
    }

    #[test]
    fn test_load_corrupt_file_is_removed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(AUTH_FILE);
        fs::write(&path, "{not json").unwrap();

        let mut store = AuthStore::with_path(&path);
        assert!(!store.load().is_authenticated);
        assert!(!path.exists());
    }

    #[test]
    fn test_load_token_without_user_is_logged_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(AUTH_FILE);
        fs::write(&path, r#"{"user":null,"token":"tok","isAuthenticated":true}"#).unwrap();

        let mut store = AuthStore::with_path(&path);
        assert_eq!(store.load(), &AuthState::default());
    }

    #[test]
    fn test_update_user_merges_fields() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        assert!(!store.update_user(UserUpdate::default()).unwrap());

        store.set_auth(user(), "tok".into()).unwrap();
        let updated = store
            .update_user(UserUpdate {
                name: Some("J. Doe".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert!(updated);

        let mut reloaded = store_in(&dir);
        let user = reloaded.load().user.clone().unwrap();
        assert_eq!(user.name.as_deref(), Some("J. Doe"));
        assert_eq!(user.email, "jane@example.com");
    }
}
