/*
[INPUT]:  Resolved wallet data and persistence requirements
[OUTPUT]: Typed identity, profile and avatar models with serde support
[POS]:    Data layer - core value types shared across components
[UPDATE]: When the persisted session schema or avatar handling changes
*/

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The resolved address / display-name / avatar-URL triple for an
/// authenticated wallet. Immutable once resolved for a session; the
/// lowercase address is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Lowercase 0x-prefixed hex address (20 bytes)
    pub address: String,
    /// Base Name, or the abbreviated address when none is registered
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Best available label for display purposes.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.address)
    }
}

/// Persisted session record derived from an [`Identity`] plus expiry
/// metadata. Owned exclusively by the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub identity: Identity,
    /// Source URL of the loaded avatar, `None` when the default was used
    pub avatar_ref: Option<String>,
    pub last_login_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Cached outcome of a registry lookup. A miss (`name: None`) is a valid
/// record so unnamed addresses do not re-query the registry on every login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameRecord {
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Where avatar bytes came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarSource {
    Remote(String),
    Default,
}

/// An undecoded avatar image. Bytes are shared, so clones are cheap enough
/// to cache and to hand out through events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    bytes: Arc<[u8]>,
    content_type: Option<String>,
    source: AvatarSource,
}

impl Avatar {
    pub fn remote(bytes: Vec<u8>, content_type: Option<String>, url: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
            source: AvatarSource::Remote(url.into()),
        }
    }

    pub fn fallback(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type,
            source: AvatarSource::Default,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn source(&self) -> &AvatarSource {
        &self.source
    }

    pub fn is_default(&self) -> bool {
        self.source == AvatarSource::Default
    }

    /// Source URL for remote avatars, used as the profile's avatar_ref.
    pub fn source_url(&self) -> Option<&str> {
        match &self.source {
            AvatarSource::Remote(url) => Some(url),
            AvatarSource::Default => None,
        }
    }
}
