/*
[INPUT]:  Primary and fallback wallet providers
[OUTPUT]: Single wallet connection lifecycle with coalesced attempts
[POS]:    Wallet layer - connection state machine
[UPDATE]: When connection states, coalescing or fallback policy change
*/

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tracing::{debug, info, warn};

use crate::error::{AuthError, AuthResult};
use crate::events::{AuthEvent, EventBus};

use super::provider::WalletProvider;

type ConnectAttempt = Shared<BoxFuture<'static, AuthResult<String>>>;

/// Connection lifecycle: `Disconnected -> Connecting -> Connected`, with
/// `Connecting -> Disconnected` on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected(String),
}

struct ConnectorInner {
    state: ConnectionState,
    inflight: Option<ConnectAttempt>,
    /// Bumped by disconnect so a settling stale attempt cannot resurrect
    /// the connection or emit events.
    epoch: u64,
}

/// Manages a single wallet connection.
///
/// Only one connection attempt is ever in flight per connector; a
/// concurrent second `connect` observes the in-flight result through a
/// shared future instead of starting a new attempt. When the primary
/// provider fails with a retryable error, the fallback provider (if any)
/// is tried within the same attempt.
pub struct WalletConnector {
    primary: Option<Arc<dyn WalletProvider>>,
    fallback: Option<Arc<dyn WalletProvider>>,
    timeout: Duration,
    events: EventBus,
    inner: Arc<Mutex<ConnectorInner>>,
}

impl WalletConnector {
    pub fn new(
        primary: Option<Arc<dyn WalletProvider>>,
        fallback: Option<Arc<dyn WalletProvider>>,
        timeout: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            primary,
            fallback,
            timeout,
            events,
            inner: Arc::new(Mutex::new(ConnectorInner {
                state: ConnectionState::Disconnected,
                inflight: None,
                epoch: 0,
            })),
        }
    }

    /// Connect the wallet and return its lowercase address.
    ///
    /// Already connected: returns the stored address without touching the
    /// provider. Attempt in flight: awaits that attempt's result.
    pub async fn connect(&self) -> AuthResult<String> {
        let Some(primary) = self.primary.clone() else {
            let err = AuthError::configuration("no wallet provider configured");
            self.events.emit(AuthEvent::WalletError(err.to_string()));
            return Err(err);
        };

        let attempt = {
            let mut inner = self.inner.lock().unwrap();
            if let ConnectionState::Connected(address) = &inner.state {
                return Ok(address.clone());
            }
            match &inner.inflight {
                Some(attempt) => attempt.clone(),
                None => {
                    let attempt = Self::drive(
                        primary,
                        self.fallback.clone(),
                        self.timeout,
                        self.events.clone(),
                        Arc::clone(&self.inner),
                        inner.epoch,
                    )
                    .boxed()
                    .shared();
                    inner.state = ConnectionState::Connecting;
                    inner.inflight = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await
    }

    /// The single driving future behind every coalesced attempt. Settles
    /// state and emits exactly one terminal event.
    async fn drive(
        primary: Arc<dyn WalletProvider>,
        fallback: Option<Arc<dyn WalletProvider>>,
        timeout: Duration,
        events: EventBus,
        inner: Arc<Mutex<ConnectorInner>>,
        epoch: u64,
    ) -> AuthResult<String> {
        let mut result = Self::attempt_provider(primary.as_ref(), timeout).await;

        if let Err(err) = &result {
            if err.is_retryable() {
                if let Some(fallback) = &fallback {
                    warn!(
                        provider = primary.name(),
                        error = %err,
                        "primary wallet provider failed, trying fallback"
                    );
                    result = Self::attempt_provider(fallback.as_ref(), timeout).await;
                }
            }
        }

        let result = result.and_then(|address| canonicalize_address(&address));

        {
            let mut inner = inner.lock().unwrap();
            if inner.epoch != epoch {
                debug!("connect attempt settled after disconnect, discarding");
                return result;
            }
            inner.inflight = None;
            inner.state = match &result {
                Ok(address) => ConnectionState::Connected(address.clone()),
                Err(_) => ConnectionState::Disconnected,
            };
        }

        match &result {
            Ok(address) => {
                info!(address = %address, "wallet connected");
                events.emit(AuthEvent::WalletConnected(address.clone()));
            }
            Err(err) => {
                warn!(error = %err, "wallet connection failed");
                events.emit(AuthEvent::WalletError(err.to_string()));
            }
        }

        result
    }

    async fn attempt_provider(
        provider: &dyn WalletProvider,
        timeout: Duration,
    ) -> AuthResult<String> {
        match tokio::time::timeout(timeout, provider.request_connection()).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::wallet_connection(format!(
                "{} connection timed out after {}s",
                provider.name(),
                timeout.as_secs()
            ))),
        }
    }

    /// Idempotent: transitions to Disconnected regardless of current
    /// state and clears the stored address. Emits at most one
    /// disconnected event per actual transition.
    pub async fn disconnect(&self) {
        let had_connection = {
            let mut inner = self.inner.lock().unwrap();
            let had = inner.state != ConnectionState::Disconnected;
            inner.state = ConnectionState::Disconnected;
            inner.inflight = None;
            inner.epoch += 1;
            had
        };

        if !had_connection {
            return;
        }

        if let Some(provider) = &self.primary {
            provider.disconnect().await;
        }
        if let Some(provider) = &self.fallback {
            provider.disconnect().await;
        }

        info!("wallet disconnected");
        self.events.emit(AuthEvent::WalletDisconnected);
    }

    /// Pure read of current state, never blocks on I/O.
    pub fn is_connected(&self) -> bool {
        matches!(
            self.inner.lock().unwrap().state,
            ConnectionState::Connected(_)
        )
    }

    /// The connected address, if any. Pure read.
    pub fn connected_address(&self) -> Option<String> {
        match &self.inner.lock().unwrap().state {
            ConnectionState::Connected(address) => Some(address.clone()),
            _ => None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().unwrap().state.clone()
    }
}

/// Lowercase and validate a provider-supplied address. A malformed address
/// is a provider fault, so it keeps the WalletConnection kind.
fn canonicalize_address(address: &str) -> AuthResult<String> {
    let lower = address.trim().to_ascii_lowercase();
    let well_formed = lower
        .strip_prefix("0x")
        .is_some_and(|body| body.len() == 40 && body.bytes().all(|b| b.is_ascii_hexdigit()));
    if well_formed {
        Ok(lower)
    } else {
        Err(AuthError::wallet_connection("provider returned a malformed address")
            .with_details(address.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthErrorKind;
    use crate::wallet::provider::MockWalletProvider;
    use tokio::sync::broadcast::error::TryRecvError;

    const ADDRESS: &str = "0x1234567890AbCdEf1234567890aBcDeF12345678";
    const ADDRESS_LOWER: &str = "0x1234567890abcdef1234567890abcdef12345678";

    fn connector_with(
        primary: Option<Arc<dyn WalletProvider>>,
        fallback: Option<Arc<dyn WalletProvider>>,
    ) -> (WalletConnector, tokio::sync::broadcast::Receiver<AuthEvent>) {
        let events = EventBus::new();
        let rx = events.subscribe();
        let connector = WalletConnector::new(primary, fallback, Duration::from_secs(5), events);
        (connector, rx)
    }

    #[tokio::test]
    async fn test_connect_success_lowercases_address() {
        let provider = Arc::new(MockWalletProvider::returning(ADDRESS));
        let (connector, mut rx) = connector_with(Some(provider.clone()), None);

        let address = connector.connect().await.unwrap();
        assert_eq!(address, ADDRESS_LOWER);
        assert!(connector.is_connected());
        assert_eq!(connector.connected_address().as_deref(), Some(ADDRESS_LOWER));
        assert_eq!(
            rx.try_recv().unwrap(),
            AuthEvent::WalletConnected(ADDRESS_LOWER.to_string())
        );
    }

    #[tokio::test]
    async fn test_connect_when_connected_skips_provider() {
        let provider = Arc::new(MockWalletProvider::returning(ADDRESS));
        let (connector, _rx) = connector_with(Some(provider.clone()), None);

        connector.connect().await.unwrap();
        connector.connect().await.unwrap();
        assert_eq!(provider.connection_requests(), 1);
    }

    #[tokio::test]
    async fn test_connect_without_provider_is_configuration_error() {
        let (connector, mut rx) = connector_with(None, None);

        let err = connector.connect().await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::Configuration);
        assert!(!err.is_retryable());
        assert!(matches!(rx.try_recv().unwrap(), AuthEvent::WalletError(_)));
    }

    #[tokio::test]
    async fn test_rejection_returns_to_disconnected() {
        let provider = Arc::new(MockWalletProvider::failing(AuthError::wallet_connection(
            "user rejected",
        )));
        let (connector, mut rx) = connector_with(Some(provider), None);

        let err = connector.connect().await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::WalletConnection);
        assert!(err.is_retryable());
        assert_eq!(connector.state(), ConnectionState::Disconnected);
        assert!(matches!(rx.try_recv().unwrap(), AuthEvent::WalletError(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_timeout_is_retryable_wallet_error() {
        let provider =
            Arc::new(MockWalletProvider::returning(ADDRESS).with_delay(Duration::from_secs(30)));
        let events = EventBus::new();
        let connector = WalletConnector::new(
            Some(provider),
            None,
            Duration::from_secs(1),
            events,
        );

        let err = connector.connect().await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::WalletConnection);
        assert!(err.is_retryable());
        assert!(err.message().contains("timed out"));
    }

    #[tokio::test]
    async fn test_concurrent_connects_coalesce() {
        let provider = Arc::new(
            MockWalletProvider::returning(ADDRESS).with_delay(Duration::from_millis(50)),
        );
        let (connector, mut rx) = connector_with(Some(provider.clone()), None);

        let (a, b) = tokio::join!(connector.connect(), connector.connect());
        assert_eq!(a.unwrap(), ADDRESS_LOWER);
        assert_eq!(b.unwrap(), ADDRESS_LOWER);
        // Exactly one underlying provider request and one event
        assert_eq!(provider.connection_requests(), 1);
        assert!(rx.try_recv().is_ok());
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_disconnect_twice_emits_once() {
        let provider = Arc::new(MockWalletProvider::returning(ADDRESS));
        let (connector, mut rx) = connector_with(Some(provider.clone()), None);

        connector.connect().await.unwrap();
        let _ = rx.try_recv();

        connector.disconnect().await;
        connector.disconnect().await;

        assert!(!connector.is_connected());
        assert_eq!(connector.connected_address(), None);
        assert_eq!(provider.disconnect_calls(), 1);
        assert_eq!(rx.try_recv().unwrap(), AuthEvent::WalletDisconnected);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let primary = Arc::new(
            MockWalletProvider::failing(AuthError::wallet_connection("primary down"))
                .with_name("primary"),
        );
        let fallback =
            Arc::new(MockWalletProvider::returning(ADDRESS).with_name("fallback"));
        let (connector, mut rx) =
            connector_with(Some(primary.clone()), Some(fallback.clone()));

        let address = connector.connect().await.unwrap();
        assert_eq!(address, ADDRESS_LOWER);
        assert_eq!(primary.connection_requests(), 1);
        assert_eq!(fallback.connection_requests(), 1);
        assert!(matches!(rx.try_recv().unwrap(), AuthEvent::WalletConnected(_)));
    }

    #[tokio::test]
    async fn test_fallback_skipped_for_non_retryable_failure() {
        let primary = Arc::new(MockWalletProvider::failing(
            AuthError::wallet_connection("misconfigured provider").with_retryable(false),
        ));
        let fallback = Arc::new(MockWalletProvider::returning(ADDRESS));
        let (connector, _rx) = connector_with(Some(primary), Some(fallback.clone()));

        connector.connect().await.unwrap_err();
        assert_eq!(fallback.connection_requests(), 0);
    }

    #[tokio::test]
    async fn test_malformed_provider_address_fails() {
        let provider = Arc::new(MockWalletProvider::returning("definitely-not-hex"));
        let (connector, _rx) = connector_with(Some(provider), None);

        let err = connector.connect().await.unwrap_err();
        assert_eq!(err.kind(), AuthErrorKind::WalletConnection);
        assert!(err.details().is_some());
        assert_eq!(connector.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_during_inflight_attempt_wins() {
        let provider = Arc::new(
            MockWalletProvider::returning(ADDRESS).with_delay(Duration::from_millis(50)),
        );
        let (connector, mut rx) = connector_with(Some(provider), None);
        let connector = Arc::new(connector);

        let task = {
            let connector = Arc::clone(&connector);
            tokio::spawn(async move { connector.connect().await })
        };
        // Let the attempt start, then disconnect underneath it
        tokio::time::sleep(Duration::from_millis(10)).await;
        connector.disconnect().await;

        // The awaiting caller still receives the provider's result
        let result = task.await.unwrap();
        assert_eq!(result.unwrap(), ADDRESS_LOWER);
        // ...but the stale attempt does not resurrect the connection
        assert_eq!(connector.state(), ConnectionState::Disconnected);
        // Disconnecting a Connecting wallet is a transition; the stale
        // attempt itself emits nothing
        assert_eq!(rx.try_recv().unwrap(), AuthEvent::WalletDisconnected);
        assert_eq!(rx.try_recv().unwrap_err(), TryRecvError::Empty);
    }
}
