/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public wallet-identity pipeline crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod avatar;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod registry;
pub mod session;
pub mod types;
pub mod wallet;

// Re-export the pipeline entry points
pub use pipeline::{AuthPipeline, PipelineDeps};

// Re-export commonly used types from config
pub use config::{AuthConfig, ConfigIssue, IssueSeverity};

// Re-export commonly used types from error
pub use error::{AuthError, AuthErrorKind, AuthResult};

// Re-export commonly used types from events
pub use events::{AuthEvent, EventBus};

pub use types::{Avatar, AvatarSource, Identity, NameRecord, Profile};

pub use cache::TtlCache;

pub use wallet::{ConnectionState, MockWalletProvider, WalletConnector, WalletProvider};

pub use registry::{
    NameRegistry,
    NameResolver,
    RpcNameRegistry,
    StaticNameRegistry,
    canonical_address,
    format_address,
};

pub use avatar::{AvatarLoader, FetchedImage, HttpImageFetcher, ImageFetcher, MockImageFetcher};

pub use session::{FileSessionStore, MemorySessionStore, SessionManager, SessionStore};
