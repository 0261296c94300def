/*
[INPUT]:  Wallet addresses and Base Names
[OUTPUT]: Registry lookup results from an external name service
[POS]:    Registry layer - lookup abstraction over the chain
[UPDATE]: When the registry capability surface changes
*/

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AuthResult;

/// External name registry capability.
///
/// `Ok(None)` means the registry answered and no record exists - a valid
/// terminal outcome, distinct from a failed query.
#[async_trait]
pub trait NameRegistry: Send + Sync {
    /// Reverse-resolve an address to its registered name.
    async fn resolve_name(&self, address: &str) -> AuthResult<Option<String>>;

    /// Look up the avatar URL text record for a name.
    async fn resolve_avatar_url(&self, name: &str) -> AuthResult<Option<String>>;
}

/// Map-backed registry for tests and offline development.
#[derive(Debug, Default)]
pub struct StaticNameRegistry {
    names: HashMap<String, String>,
    avatars: HashMap<String, String>,
}

impl StaticNameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, address: &str, name: &str) -> Self {
        self.names
            .insert(address.to_ascii_lowercase(), name.to_string());
        self
    }

    pub fn with_avatar(mut self, name: &str, url: &str) -> Self {
        self.avatars.insert(name.to_string(), url.to_string());
        self
    }
}

#[async_trait]
impl NameRegistry for StaticNameRegistry {
    async fn resolve_name(&self, address: &str) -> AuthResult<Option<String>> {
        Ok(self.names.get(&address.to_ascii_lowercase()).cloned())
    }

    async fn resolve_avatar_url(&self, name: &str) -> AuthResult<Option<String>> {
        Ok(self.avatars.get(name).cloned())
    }
}
