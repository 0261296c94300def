/*
[INPUT]:  Wallet addresses and a registry lookup backend
[OUTPUT]: Composed identities with cached name/avatar records
[POS]:    Registry layer - cache-then-fetch resolution
[UPDATE]: When resolution policy or address formatting changes
*/

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as TtlDuration;
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::error::{AuthError, AuthResult};
use crate::events::{AuthEvent, EventBus};
use crate::types::{Identity, NameRecord};

use super::lookup::NameRegistry;

/// Resolves wallet addresses to Base Names and avatar URLs.
///
/// Lookups are cached per lowercase address; a registry miss is a valid
/// record and is cached too, so unnamed addresses skip the network on
/// repeat logins. "No name found" is never an error: the identity falls
/// back to the abbreviated address.
pub struct NameResolver {
    registry: Arc<dyn NameRegistry>,
    cache: TtlCache<String, NameRecord>,
    ttl: TtlDuration,
    timeout: Duration,
    events: EventBus,
}

impl NameResolver {
    pub fn new(
        registry: Arc<dyn NameRegistry>,
        ttl_hours: i64,
        timeout: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            cache: TtlCache::new("name"),
            ttl: TtlDuration::hours(ttl_hours),
            timeout,
            events,
        }
    }

    /// Resolve an address to an [`Identity`].
    ///
    /// Malformed addresses fail with Validation before any network call.
    pub async fn resolve(&self, address: &str) -> AuthResult<Identity> {
        let address = match canonical_address(address) {
            Ok(address) => address,
            Err(err) => {
                self.events.emit(AuthEvent::ResolutionError(err.to_string()));
                return Err(err);
            }
        };

        let record = match self.cache.get(&address) {
            Some(record) => {
                debug!(address = %address, "name record served from cache");
                record
            }
            None => match self.fetch_record(&address).await {
                Ok(record) => {
                    self.cache.put(address.clone(), record.clone(), self.ttl);
                    record
                }
                Err(err) => {
                    warn!(address = %address, error = %err, "name resolution failed");
                    self.events.emit(AuthEvent::ResolutionError(err.to_string()));
                    return Err(err);
                }
            },
        };

        let identity = compose_identity(&address, record);
        self.events.emit(AuthEvent::NameResolved {
            address: address.clone(),
            name: identity.label().to_string(),
        });
        Ok(identity)
    }

    /// Avatar URL for an address, through the same cache-then-fetch path.
    pub async fn avatar_url(&self, address: &str) -> AuthResult<Option<String>> {
        Ok(self.resolve(address).await?.avatar_url)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn fetch_record(&self, address: &str) -> AuthResult<NameRecord> {
        let name = tokio::time::timeout(self.timeout, self.registry.resolve_name(address))
            .await
            .map_err(|_| AuthError::name_resolution("name lookup timed out"))??;

        // The avatar URL is best-effort end to end: a failed text-record
        // lookup downgrades to "no avatar" instead of failing resolution.
        let avatar_url = match &name {
            Some(name) => {
                match tokio::time::timeout(self.timeout, self.registry.resolve_avatar_url(name))
                    .await
                {
                    Ok(Ok(url)) => url,
                    Ok(Err(err)) => {
                        warn!(name = %name, error = %err, "avatar url lookup failed");
                        None
                    }
                    Err(_) => {
                        warn!(name = %name, "avatar url lookup timed out");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(NameRecord { name, avatar_url })
    }
}

fn compose_identity(address: &str, record: NameRecord) -> Identity {
    let display_name = record
        .name
        .unwrap_or_else(|| format_address(address));
    Identity {
        address: address.to_string(),
        display_name: Some(display_name),
        avatar_url: record.avatar_url,
    }
}

/// Lowercase an address and require the canonical `0x` + 40 hex form.
pub fn canonical_address(address: &str) -> AuthResult<String> {
    let lower = address.trim().to_ascii_lowercase();
    let well_formed = lower
        .strip_prefix("0x")
        .is_some_and(|body| body.len() == 40 && body.bytes().all(|b| b.is_ascii_hexdigit()));
    if well_formed {
        Ok(lower)
    } else {
        Err(AuthError::validation(format!("malformed wallet address {address:?}")))
    }
}

/// Abbreviate an address for display: first 6 and last 4 characters of
/// the canonical lowercase form (e.g. `0x1234...cdef`). Deterministic and
/// case-insensitive; inputs too short to abbreviate are lowercased as-is.
pub fn format_address(address: &str) -> String {
    let lower = address.trim().to_ascii_lowercase();
    if lower.len() <= 10 {
        return lower;
    }
    format!("{}...{}", &lower[..6], &lower[lower.len() - 4..])
}
