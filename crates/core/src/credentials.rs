//! Persisted client-side credentials.
//!
//! Three values survive restarts under fixed keys: the access token, the
//! refresh token and the signed-in user's id. Only an interactive (page)
//! context owns a store; server-side rendering has none.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Fallback user id when none is persisted, matching the API's own default.
pub const DEFAULT_USER_ID: i64 = 1;

/// Errors from reading or writing persisted credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("credential file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("credential store lock poisoned")]
    Poisoned,
}

/// Fixed storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKey {
    AccessToken,
    RefreshToken,
    UserId,
}

impl CredentialKey {
    pub const ALL: [CredentialKey; 3] = [CredentialKey::AccessToken, CredentialKey::RefreshToken, CredentialKey::UserId];

    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKey::AccessToken => "access_token",
            CredentialKey::RefreshToken => "refresh_token",
            CredentialKey::UserId => "user_id",
        }
    }
}

/// Key/value store for credentials.
pub trait CredentialStore: Send + Sync + fmt::Debug {
    fn get(&self, key: CredentialKey) -> Option<String>;

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError>;

    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError>;

    fn access_token(&self) -> Option<String> {
        self.get(CredentialKey::AccessToken).filter(|token| !token.is_empty())
    }

    /// Persisted user id, or [`DEFAULT_USER_ID`] when absent or unparsable.
    fn user_id(&self) -> i64 {
        self.get(CredentialKey::UserId)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_USER_ID)
    }

    /// Drop both tokens but keep the user id.
    fn clear_tokens(&self) -> Result<(), CredentialError> {
        self.remove(CredentialKey::AccessToken)?;
        self.remove(CredentialKey::RefreshToken)
    }

    fn clear_all(&self) -> Result<(), CredentialError> {
        for key in CredentialKey::ALL {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-process store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    values: Mutex<BTreeMap<&'static str, String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentials {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.values.lock().ok()?.get(key.as_str()).cloned()
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError> {
        let mut values = self.values.lock().map_err(|_| CredentialError::Poisoned)?;
        values.insert(key.as_str(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError> {
        let mut values = self.values.lock().map_err(|_| CredentialError::Poisoned)?;
        values.remove(key.as_str());
        Ok(())
    }
}

/// JSON file store. Every write rewrites the whole file.
#[derive(Debug)]
pub struct FileCredentials {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileCredentials {
    /// Open the store at `path`, creating an empty one if the file is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "opened credential store");

        Ok(Self { path, values: Mutex::new(values) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(values)?)?;
        Ok(())
    }
}

impl CredentialStore for FileCredentials {
    fn get(&self, key: CredentialKey) -> Option<String> {
        self.values.lock().ok()?.get(key.as_str()).cloned()
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError> {
        let mut values = self.values.lock().map_err(|_| CredentialError::Poisoned)?;
        values.insert(key.as_str().to_string(), value.to_string());
        self.persist(&values)
    }

    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError> {
        let mut values = self.values.lock().map_err(|_| CredentialError::Poisoned)?;
        if values.remove(key.as_str()).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }
}
