//! Bearer-token persistence.
//!
//! The HTTP adapter reads the token from a [`TokenStore`] before every
//! request and clears it when the server answers 401. The file-backed
//! store keeps the token under a fixed key in the user data directory;
//! the in-memory store exists for tests and embedded use.

use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{ApiError, Result};

/// Fixed storage key the bearer token is persisted under.
pub const TOKEN_KEY: &str = "auth_token";

/// Persistent key-value storage for the session token.
pub trait TokenStore: Send + Sync {
  /// Current token, if any.
  fn get(&self) -> Result<Option<String>>;

  /// Persist a new token, replacing any previous one.
  fn set(&self, token: &str) -> Result<()>;

  /// Remove the token. Idempotent.
  fn clear(&self) -> Result<()>;
}

/// File-backed token store rooted in the user data directory.
pub struct FileTokenStore {
  path: PathBuf,
}

impl FileTokenStore {
  /// Open the store at the default location
  /// (`<data_dir>/backdesk/auth_token`).
  pub fn open() -> Result<Self> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| ApiError::Config("Could not determine data directory".to_string()))?;

    Self::open_at(data_dir.join("backdesk").join(TOKEN_KEY))
  }

  /// Open the store at an explicit path.
  pub fn open_at(path: PathBuf) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| ApiError::storage("Failed to create token directory", e))?;
    }

    Ok(Self { path })
  }
}

impl TokenStore for FileTokenStore {
  fn get(&self) -> Result<Option<String>> {
    match std::fs::read_to_string(&self.path) {
      Ok(contents) => {
        let token = contents.trim();
        if token.is_empty() {
          Ok(None)
        } else {
          Ok(Some(token.to_string()))
        }
      }
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(ApiError::storage("Failed to read token", e)),
    }
  }

  fn set(&self, token: &str) -> Result<()> {
    std::fs::write(&self.path, token).map_err(|e| ApiError::storage("Failed to write token", e))
  }

  fn clear(&self) -> Result<()> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(ApiError::storage("Failed to clear token", e)),
    }
  }
}

/// In-memory token store for tests and embedded use.
#[derive(Default)]
pub struct MemoryTokenStore {
  token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Construct a store pre-seeded with a token.
  pub fn with_token(token: &str) -> Self {
    Self {
      token: Mutex::new(Some(token.to_string())),
    }
  }
}

impl TokenStore for MemoryTokenStore {
  fn get(&self) -> Result<Option<String>> {
    Ok(
      self
        .token
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .clone(),
    )
  }

  fn set(&self, token: &str) -> Result<()> {
    *self.token.lock().unwrap_or_else(|p| p.into_inner()) = Some(token.to_string());
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    *self.token.lock().unwrap_or_else(|p| p.into_inner()) = None;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn memory_store_round_trip() {
    let store = MemoryTokenStore::new();
    assert_eq!(store.get().unwrap(), None);

    store.set("abc123").unwrap();
    assert_eq!(store.get().unwrap(), Some("abc123".to_string()));

    store.clear().unwrap();
    assert_eq!(store.get().unwrap(), None);
  }

  #[test]
  fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileTokenStore::open_at(dir.path().join(TOKEN_KEY)).unwrap();

    assert_eq!(store.get().unwrap(), None);

    store.set("tok-1").unwrap();
    assert_eq!(store.get().unwrap(), Some("tok-1".to_string()));

    // Clearing twice is fine
    store.clear().unwrap();
    store.clear().unwrap();
    assert_eq!(store.get().unwrap(), None);
  }
}
