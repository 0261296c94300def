/*
[INPUT]:  Resolved identities and a durable byte store
[OUTPUT]: Persisted sessions with expiry validation
[POS]:    Session layer - profile lifecycle across process restarts
[UPDATE]: When session schema or expiry policy changes
*/

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::error::AuthResult;
use crate::types::{Identity, Profile};

use super::store::SessionStore;

/// Storage key of the single persisted session
const SESSION_KEY: &str = "session";

/// Owns the persisted [`Profile`]: created on successful pipeline
/// completion, destroyed on explicit logout or expiry.
///
/// Corrupt stored data is treated as "no session", never as a fatal
/// error.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    expiration: Duration,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, expiration_days: i64) -> Self {
        Self {
            store,
            expiration: Duration::days(expiration_days),
        }
    }

    /// Stamp an identity into a profile with a fresh expiry window.
    pub fn build_profile(&self, identity: Identity, avatar_ref: Option<String>) -> Profile {
        let now = Utc::now();
        Profile {
            identity,
            avatar_ref,
            last_login_at: now,
            expires_at: now + self.expiration,
        }
    }

    /// Serialize and store a profile, overwriting any prior session.
    pub async fn persist(&self, profile: &Profile) -> AuthResult<()> {
        let bytes = serde_json::to_vec_pretty(profile).map_err(|e| {
            crate::error::AuthError::session("failed to serialize session")
                .with_details(e.to_string())
        })?;
        self.store.write(SESSION_KEY, &bytes).await?;
        debug!(address = %profile.identity.address, "session saved");
        Ok(())
    }

    /// Build and persist in one step.
    pub async fn save_session(
        &self,
        identity: Identity,
        avatar_ref: Option<String>,
    ) -> AuthResult<Profile> {
        let profile = self.build_profile(identity, avatar_ref);
        self.persist(&profile).await?;
        Ok(profile)
    }

    /// Load the stored profile, expired or not. `None` when nothing is
    /// stored or the data does not deserialize.
    pub async fn load_session(&self) -> Option<Profile> {
        let bytes = match self.store.read(SESSION_KEY).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(err) => {
                warn!(error = %err, "failed to read stored session");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(error = %err, "stored session is corrupt, treating as absent");
                None
            }
        }
    }

    /// True iff a session is loadable and not yet expired.
    pub async fn is_session_valid(&self) -> bool {
        self.load_session()
            .await
            .is_some_and(|profile| !profile.is_expired())
    }

    pub async fn has_valid_session(&self) -> bool {
        self.is_session_valid().await
    }

    /// Login timestamp of the stored session, if any.
    pub async fn last_login_time(&self) -> Option<DateTime<Utc>> {
        self.load_session().await.map(|p| p.last_login_at)
    }

    /// Idempotent deletion of durable session state.
    pub async fn clear_session(&self) -> AuthResult<()> {
        self.store.delete(SESSION_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::{FileSessionStore, MemorySessionStore};

    fn identity() -> Identity {
        Identity {
            address: "0x1234567890abcdef1234567890abcdef12345678".to_string(),
            display_name: Some("player.base.eth".to_string()),
            avatar_url: None,
        }
    }

    fn manager() -> (SessionManager, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        (SessionManager::new(store.clone(), 30), store)
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (manager, _store) = manager();

        let saved = manager.save_session(identity(), None).await.unwrap();
        let loaded = manager.load_session().await.unwrap();
        assert_eq!(saved, loaded);
        assert!(manager.is_session_valid().await);
        assert_eq!(
            manager.last_login_time().await,
            Some(saved.last_login_at)
        );
    }

    #[tokio::test]
    async fn test_expired_session_loads_but_is_invalid() {
        let (manager, _store) = manager();

        let mut profile = manager.build_profile(identity(), None);
        profile.expires_at = Utc::now() - Duration::seconds(1);
        manager.persist(&profile).await.unwrap();

        // Expired data is still readable, validity is a separate question
        assert!(manager.load_session().await.is_some());
        assert!(!manager.is_session_valid().await);
        assert!(!manager.has_valid_session().await);
    }

    #[tokio::test]
    async fn test_no_session_is_invalid() {
        let (manager, _store) = manager();
        assert_eq!(manager.load_session().await, None);
        assert!(!manager.is_session_valid().await);
        assert_eq!(manager.last_login_time().await, None);
    }

    #[tokio::test]
    async fn test_corrupt_session_is_absent() {
        let (manager, store) = manager();
        store.write("session", b"{ not json").await.unwrap();
        assert_eq!(manager.load_session().await, None);
    }

    #[tokio::test]
    async fn test_save_overwrites_prior_session() {
        let (manager, _store) = manager();

        manager.save_session(identity(), None).await.unwrap();
        let mut second = identity();
        second.display_name = Some("other.base.eth".to_string());
        manager.save_session(second, None).await.unwrap();

        let loaded = manager.load_session().await.unwrap();
        assert_eq!(
            loaded.identity.display_name.as_deref(),
            Some("other.base.eth")
        );
    }

    #[tokio::test]
    async fn test_clear_session_is_idempotent() {
        let (manager, _store) = manager();
        manager.save_session(identity(), None).await.unwrap();

        manager.clear_session().await.unwrap();
        manager.clear_session().await.unwrap();
        assert_eq!(manager.load_session().await, None);
    }

    #[tokio::test]
    async fn test_survives_process_restart_via_file_store() {
        let dir = tempfile::tempdir().unwrap();

        let saved = {
            let manager =
                SessionManager::new(Arc::new(FileSessionStore::new(dir.path())), 30);
            manager.save_session(identity(), None).await.unwrap()
        };

        // A fresh manager over the same directory sees the session
        let manager = SessionManager::new(Arc::new(FileSessionStore::new(dir.path())), 30);
        assert_eq!(manager.load_session().await, Some(saved));
    }
}
