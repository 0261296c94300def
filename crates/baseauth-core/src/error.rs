/*
[INPUT]:  Failure causes from every pipeline stage
[OUTPUT]: Typed error values with kind, flattened details and retry hints
[POS]:    Error handling layer - unified error type for entire crate
[UPDATE]: When adding new error kinds or changing retry defaults
*/

use thiserror::Error;

/// Categories of failure in the authentication pipeline.
///
/// The producing stage picks the kind; downstream code never reclassifies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    WalletConnection,
    NameResolution,
    AvatarLoading,
    SessionManagement,
    Network,
    Configuration,
    Validation,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuthErrorKind::WalletConnection => "WalletConnection",
            AuthErrorKind::NameResolution => "NameResolution",
            AuthErrorKind::AvatarLoading => "AvatarLoading",
            AuthErrorKind::SessionManagement => "SessionManagement",
            AuthErrorKind::Network => "Network",
            AuthErrorKind::Configuration => "Configuration",
            AuthErrorKind::Validation => "Validation",
        };
        f.write_str(name)
    }
}

/// Error type for all pipeline operations.
///
/// Causes are flattened into `details` rather than carried as a source
/// chain, so values stay `Clone` (coalesced connection attempts hand the
/// same result to every waiter) and portable across process boundaries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("[{kind}] {message}{}", fmt_details(.details))]
pub struct AuthError {
    kind: AuthErrorKind,
    message: String,
    details: Option<String>,
    retryable: bool,
}

fn fmt_details(details: &Option<String>) -> String {
    match details {
        Some(d) => format!(" - {d}"),
        None => String::new(),
    }
}

impl AuthError {
    pub fn new(kind: AuthErrorKind, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            retryable,
        }
    }

    /// Wallet provider rejected, timed out or misbehaved. Retryable.
    pub fn wallet_connection(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::WalletConnection, message, true)
    }

    /// Name registry query failed. Retryable.
    pub fn name_resolution(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::NameResolution, message, true)
    }

    /// Avatar fetch failed. Retryable, and always absorbed by the pipeline.
    pub fn avatar_loading(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::AvatarLoading, message, true)
    }

    /// Session storage I/O failed. Retryable.
    pub fn session(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::SessionManagement, message, true)
    }

    /// Transport-level failure or cancellation. Retryable.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Network, message, true)
    }

    /// Invalid or missing configuration. Not retryable.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Configuration, message, false)
    }

    /// Malformed caller input. Not retryable.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AuthErrorKind::Validation, message, false)
    }

    /// Attach debugging detail, flattening any lower-layer cause to a string.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Override the kind's default retry hint.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn kind(&self) -> AuthErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Whether re-invoking the same operation may succeed without any
    /// state change.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Result type alias for pipeline operations
pub type AuthResult<T> = std::result::Result<T, AuthError>;
