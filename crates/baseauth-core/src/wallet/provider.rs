/*
[INPUT]:  Connection requests from the connector
[OUTPUT]: Wallet addresses from an external provider
[POS]:    Wallet layer - provider integration abstraction
[UPDATE]: When adding new provider backends or changing the seam
*/

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AuthResult;

/// External wallet provider capability.
///
/// Implement this for your provider backend (WalletConnect, Web3Auth,
/// injected browser wallet, ...). The trait is async because a connection
/// request may prompt a human.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Short provider name used in logs and error details
    fn name(&self) -> &str;

    /// Request a connection and return the wallet address.
    async fn request_connection(&self) -> AuthResult<String>;

    /// Tear down the provider-side connection. Best-effort.
    async fn disconnect(&self);
}

/// Scripted wallet provider for tests and downstream development.
///
/// Returns queued results first, then the standing result. Counts calls so
/// tests can assert single-flight behavior.
pub struct MockWalletProvider {
    name: String,
    standing: AuthResult<String>,
    script: Mutex<VecDeque<AuthResult<String>>>,
    delay: Option<Duration>,
    connection_requests: AtomicUsize,
    disconnect_calls: AtomicUsize,
}

impl MockWalletProvider {
    pub fn new(standing: AuthResult<String>) -> Self {
        Self {
            name: "mock".to_string(),
            standing,
            script: Mutex::new(VecDeque::new()),
            delay: None,
            connection_requests: AtomicUsize::new(0),
            disconnect_calls: AtomicUsize::new(0),
        }
    }

    pub fn returning(address: &str) -> Self {
        Self::new(Ok(address.to_string()))
    }

    pub fn failing(error: crate::error::AuthError) -> Self {
        Self::new(Err(error))
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Delay every connection request, letting tests overlap concurrent
    /// calls deterministically.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a one-shot result consumed before the standing result.
    pub fn queue(&self, result: AuthResult<String>) {
        self.script.lock().unwrap().push_back(result);
    }

    pub fn connection_requests(&self) -> usize {
        self.connection_requests.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWalletProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn request_connection(&self) -> AuthResult<String> {
        self.connection_requests.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.standing.clone())
    }

    async fn disconnect(&self) {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;

    #[tokio::test]
    async fn test_mock_returns_standing_result() {
        let provider = MockWalletProvider::returning("0xABC");
        assert_eq!(provider.request_connection().await.unwrap(), "0xABC");
        assert_eq!(provider.request_connection().await.unwrap(), "0xABC");
        assert_eq!(provider.connection_requests(), 2);
    }

    #[tokio::test]
    async fn test_mock_script_takes_precedence() {
        let provider = MockWalletProvider::returning("0xABC");
        provider.queue(Err(AuthError::wallet_connection("user rejected")));

        let first = provider.request_connection().await;
        assert_eq!(first.unwrap_err().message(), "user rejected");

        let second = provider.request_connection().await;
        assert_eq!(second.unwrap(), "0xABC");
    }

    #[tokio::test]
    async fn test_mock_counts_disconnects() {
        let provider = MockWalletProvider::returning("0xABC");
        provider.disconnect().await;
        provider.disconnect().await;
        assert_eq!(provider.disconnect_calls(), 2);
    }
}
