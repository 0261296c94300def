/*
[INPUT]:  Validated configuration and external capability seams
[OUTPUT]: The connect -> resolve -> avatar -> persist authentication flow
[POS]:    Orchestration layer - composes every component
[UPDATE]: When stage ordering or failure policy changes
*/

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::avatar::{AvatarLoader, HttpImageFetcher, ImageFetcher};
use crate::config::{AuthConfig, IssueSeverity};
use crate::error::{AuthError, AuthResult};
use crate::events::{AuthEvent, EventBus};
use crate::registry::{NameRegistry, NameResolver, RpcNameRegistry};
use crate::session::{FileSessionStore, SessionManager, SessionStore};
use crate::types::Profile;
use crate::wallet::{WalletConnector, WalletProvider};

/// External capabilities consumed by the pipeline.
pub struct PipelineDeps {
    pub wallet_provider: Option<Arc<dyn WalletProvider>>,
    /// Tried when the primary fails, if enabled in config
    pub fallback_provider: Option<Arc<dyn WalletProvider>>,
    pub registry: Arc<dyn NameRegistry>,
    pub image_fetcher: Arc<dyn ImageFetcher>,
    pub session_store: Arc<dyn SessionStore>,
}

/// The wallet-identity resolution pipeline.
///
/// `authenticate` drives connect -> resolve -> load avatar -> persist.
/// Only the first two stages are fatal: avatar failures substitute the
/// default image, and a persistence failure is reported without
/// invalidating the in-memory profile.
pub struct AuthPipeline {
    connector: WalletConnector,
    resolver: NameResolver,
    avatars: AvatarLoader,
    sessions: SessionManager,
    events: EventBus,
}

impl std::fmt::Debug for AuthPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthPipeline").finish_non_exhaustive()
    }
}

impl AuthPipeline {
    /// Build a pipeline after validating the configuration. Hard
    /// configuration errors abort construction; warnings are logged.
    pub fn new(config: &AuthConfig, deps: PipelineDeps) -> AuthResult<Self> {
        for issue in config.validate() {
            if issue.severity == IssueSeverity::Warning {
                warn!(issue = %issue.message, "configuration warning");
            }
        }
        config.ensure_valid()?;

        let events = EventBus::new();

        let fallback = if config.enable_web3auth_fallback {
            deps.fallback_provider
        } else {
            None
        };
        let connector = WalletConnector::new(
            deps.wallet_provider,
            fallback,
            Duration::from_secs(config.connect_timeout_secs),
            events.clone(),
        );
        let resolver = NameResolver::new(
            deps.registry,
            config.name_cache_hours,
            Duration::from_secs(config.resolve_timeout_secs),
            events.clone(),
        );
        let avatars = AvatarLoader::new(
            deps.image_fetcher,
            config.avatar_cache_hours,
            Duration::from_secs(config.avatar_timeout_secs),
            config.ipfs_gateway.clone(),
            AvatarLoader::default_from_path(config.default_avatar_path.as_deref()),
            events.clone(),
        );
        let sessions = SessionManager::new(deps.session_store, config.session_expiration_days);

        Ok(Self {
            connector,
            resolver,
            avatars,
            sessions,
            events,
        })
    }

    /// Build a pipeline wired to the production backends: JSON-RPC name
    /// registry, HTTP image fetcher and file-based session store.
    pub fn with_defaults(
        config: &AuthConfig,
        wallet_provider: Option<Arc<dyn WalletProvider>>,
        fallback_provider: Option<Arc<dyn WalletProvider>>,
    ) -> AuthResult<Self> {
        let registry = Arc::new(RpcNameRegistry::new(config)?);
        let image_fetcher = Arc::new(HttpImageFetcher::new(
            Duration::from_secs(config.avatar_timeout_secs),
            config.max_avatar_bytes,
        )?);
        let session_store = Arc::new(FileSessionStore::new(&config.session_dir));
        Self::new(
            config,
            PipelineDeps {
                wallet_provider,
                fallback_provider,
                registry,
                image_fetcher,
                session_store,
            },
        )
    }

    /// Run the full authentication flow.
    pub async fn authenticate(&self) -> AuthResult<Profile> {
        self.authenticate_with_cancellation(&CancellationToken::new())
            .await
    }

    /// Run the full authentication flow, stopping at the next stage
    /// boundary when `cancel` fires. Cancellation mid-stage reports a
    /// retryable Network error and writes no partial session.
    pub async fn authenticate_with_cancellation(
        &self,
        cancel: &CancellationToken,
    ) -> AuthResult<Profile> {
        // Step 1: connect wallet. Fatal on failure.
        let address = self.guarded(cancel, self.connector.connect()).await?;

        // Step 2: resolve name. Fatal on failure; a registry miss is a
        // success with the abbreviated address as the display name.
        let identity = self.guarded(cancel, self.resolver.resolve(&address)).await?;

        // Step 3: load avatar, best-effort.
        let avatar = match &identity.avatar_url {
            Some(url) => match self.guarded(cancel, self.avatars.load_avatar(url)).await {
                Ok(avatar) => avatar,
                Err(_) if cancel.is_cancelled() => return Err(cancelled_error()),
                Err(err) => {
                    debug!(error = %err, "substituting default avatar");
                    self.avatars.default_avatar()
                }
            },
            None => self.avatars.default_avatar(),
        };

        // Step 4: persist. Only runs once every prior stage has settled,
        // and never rolls back steps 1-3 on failure.
        if cancel.is_cancelled() {
            return Err(cancelled_error());
        }
        let avatar_ref = avatar.source_url().map(str::to_string);
        let profile = self.sessions.build_profile(identity, avatar_ref);
        if let Err(err) = self.sessions.persist(&profile).await {
            warn!(error = %err, "session persistence failed, profile stays in memory");
            self.events.emit(AuthEvent::SessionError(err.to_string()));
        }

        info!(
            address = %profile.identity.address,
            name = %profile.identity.label(),
            "authentication complete"
        );
        Ok(profile)
    }

    /// Return the stored profile if one exists and has not expired.
    pub async fn restore_session(&self) -> Option<Profile> {
        let profile = self.sessions.load_session().await?;
        if profile.is_expired() {
            debug!(address = %profile.identity.address, "stored session expired");
            return None;
        }
        Some(profile)
    }

    /// Disconnect the wallet and clear the persisted session.
    pub async fn logout(&self) -> AuthResult<()> {
        self.connector.disconnect().await;
        self.sessions.clear_session().await
    }

    /// Release the wallet connection without touching persisted state.
    pub async fn shutdown(&self) {
        self.connector.disconnect().await;
    }

    /// Subscribe to stage notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn connector(&self) -> &WalletConnector {
        &self.connector
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    pub fn avatar_loader(&self) -> &AvatarLoader {
        &self.avatars
    }

    pub fn session_manager(&self) -> &SessionManager {
        &self.sessions
    }

    async fn guarded<T>(
        &self,
        cancel: &CancellationToken,
        stage: impl Future<Output = AuthResult<T>>,
    ) -> AuthResult<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(cancelled_error()),
            result = stage => result,
        }
    }
}

fn cancelled_error() -> AuthError {
    AuthError::network("authentication cancelled")
}
