/*
[INPUT]:  Avatar URLs from resolved identities
[OUTPUT]: Cached avatar images with an infallible default
[POS]:    Avatar layer - scheme dispatch and caching
[UPDATE]: When supported URL schemes or fallback behavior change
*/

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as TtlDuration;
use tracing::{debug, warn};
use url::Url;

use crate::cache::TtlCache;
use crate::error::{AuthError, AuthResult};
use crate::events::{AuthEvent, EventBus};
use crate::types::Avatar;

use super::fetcher::ImageFetcher;

/// Built-in placeholder used when no default avatar is configured
const PLACEHOLDER_SVG: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 64 64"><circle cx="32" cy="32" r="32" fill="#0052ff"/><circle cx="32" cy="25" r="11" fill="#fff"/><path d="M11 56a21 15 0 0 1 42 0z" fill="#fff"/></svg>"##;

/// Fetches avatar images with caching and scheme dispatch.
///
/// Supports `http`, `https` and `ipfs` URLs; the latter are rewritten to
/// the configured HTTP gateway. Failures never cascade: callers fall back
/// to [`AvatarLoader::default_avatar`], which touches neither network nor
/// cache.
pub struct AvatarLoader {
    fetcher: Arc<dyn ImageFetcher>,
    cache: TtlCache<String, Avatar>,
    ttl: TtlDuration,
    timeout: Duration,
    ipfs_gateway: String,
    default_avatar: Avatar,
    events: EventBus,
}

impl AvatarLoader {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        ttl_hours: i64,
        timeout: Duration,
        ipfs_gateway: String,
        default_avatar: Avatar,
        events: EventBus,
    ) -> Self {
        Self {
            fetcher,
            cache: TtlCache::new("avatar"),
            ttl: TtlDuration::hours(ttl_hours),
            timeout,
            ipfs_gateway,
            default_avatar,
            events,
        }
    }

    /// Load an avatar, serving from cache when possible.
    pub async fn load_avatar(&self, url: &str) -> AuthResult<Avatar> {
        if let Some(avatar) = self.cache.get(&url.to_string()) {
            debug!(url, "avatar served from cache");
            self.events.emit(AuthEvent::AvatarLoaded(avatar.source().clone()));
            return Ok(avatar);
        }

        match self.fetch_and_cache(url).await {
            Ok(avatar) => {
                self.events.emit(AuthEvent::AvatarLoaded(avatar.source().clone()));
                Ok(avatar)
            }
            Err(err) => {
                warn!(url, error = %err, "avatar load failed");
                self.events.emit(AuthEvent::AvatarError(err.to_string()));
                Err(err)
            }
        }
    }

    /// The configured fallback image. Always succeeds.
    pub fn default_avatar(&self) -> Avatar {
        self.default_avatar.clone()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn fetch_and_cache(&self, url: &str) -> AuthResult<Avatar> {
        let fetch_url = self.resolve_fetch_url(url)?;
        let image = tokio::time::timeout(self.timeout, self.fetcher.fetch(&fetch_url))
            .await
            .map_err(|_| AuthError::avatar_loading("avatar fetch timed out"))??;

        let avatar = Avatar::remote(image.bytes, image.content_type, url);
        self.cache.put(url.to_string(), avatar.clone(), self.ttl);
        Ok(avatar)
    }

    /// Dispatch on the URL scheme, rewriting content-addressed URLs to
    /// the HTTP gateway.
    fn resolve_fetch_url(&self, url: &str) -> AuthResult<String> {
        if let Some(path) = url.strip_prefix("ipfs://") {
            let gateway = self.ipfs_gateway.trim_end_matches('/');
            return Ok(format!("{gateway}/{}", path.trim_start_matches('/')));
        }

        let parsed = Url::parse(url).map_err(|e| {
            AuthError::validation(format!("unparseable avatar url {url:?}"))
                .with_details(e.to_string())
        })?;
        match parsed.scheme() {
            "http" | "https" => Ok(url.to_string()),
            scheme => Err(AuthError::validation(format!(
                "unsupported avatar url scheme {scheme:?}"
            ))),
        }
    }

    /// Build the default avatar from an optional configured image file,
    /// falling back to the built-in placeholder.
    pub fn default_from_path(path: Option<&Path>) -> Avatar {
        if let Some(path) = path {
            match std::fs::read(path) {
                Ok(bytes) => return Avatar::fallback(bytes, guess_content_type(path)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read default avatar, using placeholder");
                }
            }
        }
        Avatar::fallback(
            PLACEHOLDER_SVG.to_vec(),
            Some("image/svg+xml".to_string()),
        )
    }
}

fn guess_content_type(path: &Path) -> Option<String> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime.to_string())
}
