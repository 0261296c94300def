/*
[INPUT]:  Serialized session payloads
[OUTPUT]: Durable key/value persistence for sessions
[POS]:    Session layer - storage abstraction
[UPDATE]: When storage backends or file conventions change
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::{AuthError, AuthResult};

/// Durable storage capability used only by the session manager.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn write(&self, key: &str, bytes: &[u8]) -> AuthResult<()>;
    async fn read(&self, key: &str) -> AuthResult<Option<Vec<u8>>>;
    async fn delete(&self, key: &str) -> AuthResult<()>;
}

/// File-per-key store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn write(&self, key: &str, bytes: &[u8]) -> AuthResult<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                AuthError::session(format!("failed to create session dir {}", self.dir.display()))
                    .with_details(e.to_string())
            })?;
        }

        let path = self.key_path(key);
        std::fs::write(&path, bytes).map_err(|e| {
            AuthError::session(format!("failed to write session file {}", path.display()))
                .with_details(e.to_string())
        })?;

        // The session grants auto-login, keep it private
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(metadata) = std::fs::metadata(&path) {
                let mut perms = metadata.permissions();
                perms.set_mode(0o600);
                let _ = std::fs::set_permissions(&path, perms);
            }
        }

        Ok(())
    }

    async fn read(&self, key: &str) -> AuthResult<Option<Vec<u8>>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        std::fs::read(&path).map(Some).map_err(|e| {
            AuthError::session(format!("failed to read session file {}", path.display()))
                .with_details(e.to_string())
        })
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        let path = self.key_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::session(format!(
                "failed to delete session file {}",
                path.display()
            ))
            .with_details(e.to_string())),
        }
    }
}

/// In-memory store for tests and ephemeral hosts. Writes can be made to
/// fail so persistence-failure paths are testable.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn write(&self, key: &str, bytes: &[u8]) -> AuthResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AuthError::session("session store is read-only"));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> AuthResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
