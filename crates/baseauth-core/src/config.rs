/*
[INPUT]:  YAML configuration file or caller-supplied struct
[OUTPUT]: Validated pipeline configuration with sane defaults
[POS]:    Configuration layer - replaces the engine's inspector asset
[UPDATE]: When adding new configuration knobs or validation rules
*/

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Severity of a configuration finding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    /// Pipeline cannot start
    Error,
    /// Degraded but usable
    Warning,
}

/// A single finding from [`AuthConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

impl ConfigIssue {
    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: IssueSeverity::Warning,
            message: message.into(),
        }
    }
}

/// Pipeline configuration.
///
/// Every knob has a serde default, so a partial YAML file (or
/// `AuthConfig::default()`) yields a working mainnet setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// RPC URL for the Base network
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// Chain ID for the Base network
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Name registry contract address on Base
    #[serde(default = "default_registry_address")]
    pub registry_address: String,
    /// WalletConnect project ID, recommended for wallet connections
    #[serde(default)]
    pub walletconnect_project_id: Option<String>,
    /// Web3Auth client ID for fallback authentication
    #[serde(default)]
    pub web3auth_client_id: Option<String>,
    /// Try the fallback provider when the primary connection fails
    #[serde(default = "default_true")]
    pub enable_web3auth_fallback: bool,
    /// Days before a persisted session expires (1-365)
    #[serde(default = "default_session_expiration_days")]
    pub session_expiration_days: i64,
    /// Hours before cached name records expire (1-168)
    #[serde(default = "default_name_cache_hours")]
    pub name_cache_hours: i64,
    /// Hours before cached avatars expire (1-72)
    #[serde(default = "default_avatar_cache_hours")]
    pub avatar_cache_hours: i64,
    /// Wallet prompt timeout; generous because a human may be involved
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_resolve_timeout_secs")]
    pub resolve_timeout_secs: u64,
    #[serde(default = "default_avatar_timeout_secs")]
    pub avatar_timeout_secs: u64,
    /// HTTP gateway used to rewrite ipfs:// avatar URLs
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,
    /// Upper bound on fetched avatar size
    #[serde(default = "default_max_avatar_bytes")]
    pub max_avatar_bytes: usize,
    /// Directory holding the persisted session file
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
    /// Optional image file used as the default avatar
    #[serde(default)]
    pub default_avatar_path: Option<PathBuf>,
}

fn default_rpc_url() -> String {
    "https://mainnet.base.org".to_string()
}

fn default_chain_id() -> u64 {
    8453
}

fn default_registry_address() -> String {
    "0x00000000000c2e074ec69a0dfb2997ba6c7d2e1e".to_string()
}

fn default_true() -> bool {
    true
}

fn default_session_expiration_days() -> i64 {
    30
}

fn default_name_cache_hours() -> i64 {
    24
}

fn default_avatar_cache_hours() -> i64 {
    6
}

fn default_connect_timeout_secs() -> u64 {
    120
}

fn default_resolve_timeout_secs() -> u64 {
    10
}

fn default_avatar_timeout_secs() -> u64 {
    15
}

fn default_ipfs_gateway() -> String {
    "https://ipfs.io/ipfs/".to_string()
}

fn default_max_avatar_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".baseauth")
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            registry_address: default_registry_address(),
            walletconnect_project_id: None,
            web3auth_client_id: None,
            enable_web3auth_fallback: true,
            session_expiration_days: default_session_expiration_days(),
            name_cache_hours: default_name_cache_hours(),
            avatar_cache_hours: default_avatar_cache_hours(),
            connect_timeout_secs: default_connect_timeout_secs(),
            resolve_timeout_secs: default_resolve_timeout_secs(),
            avatar_timeout_secs: default_avatar_timeout_secs(),
            ipfs_gateway: default_ipfs_gateway(),
            max_avatar_bytes: default_max_avatar_bytes(),
            session_dir: default_session_dir(),
            default_avatar_path: None,
        }
    }
}

impl AuthConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AuthError::configuration(format!("failed to read config file {}", path.display()))
                .with_details(e.to_string())
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            AuthError::configuration(format!("failed to parse config file {}", path.display()))
                .with_details(e.to_string())
        })
    }

    /// Pure validation pass over every knob.
    ///
    /// Missing RPC URL, bad chain id, malformed registry address and
    /// out-of-range cache/expiry knobs are hard errors; missing optional
    /// provider ids are warnings only.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.rpc_url.trim().is_empty() {
            issues.push(ConfigIssue::error("rpc_url is required"));
        }
        if self.chain_id == 0 {
            issues.push(ConfigIssue::error("chain_id must be positive"));
        }
        if !looks_like_address(&self.registry_address) {
            issues.push(ConfigIssue::error(format!(
                "registry_address {:?} is not a 0x-prefixed 20-byte hex address",
                self.registry_address
            )));
        }
        if !(1..=365).contains(&self.session_expiration_days) {
            issues.push(ConfigIssue::error(
                "session_expiration_days must be within 1-365",
            ));
        }
        if !(1..=168).contains(&self.name_cache_hours) {
            issues.push(ConfigIssue::error("name_cache_hours must be within 1-168"));
        }
        if !(1..=72).contains(&self.avatar_cache_hours) {
            issues.push(ConfigIssue::error("avatar_cache_hours must be within 1-72"));
        }
        if self.ipfs_gateway.trim().is_empty() {
            issues.push(ConfigIssue::error("ipfs_gateway is required"));
        }

        if self.walletconnect_project_id.is_none() {
            issues.push(ConfigIssue::warning(
                "walletconnect_project_id is recommended for wallet connections",
            ));
        }
        if self.enable_web3auth_fallback && self.web3auth_client_id.is_none() {
            issues.push(ConfigIssue::warning(
                "web3auth_client_id is required when fallback is enabled",
            ));
        }

        issues
    }

    /// Validate and fail on the first hard error, joining all error
    /// messages into one configuration error.
    pub fn ensure_valid(&self) -> AuthResult<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|issue| issue.severity == IssueSeverity::Error)
            .map(|issue| issue.message)
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AuthError::configuration("invalid configuration").with_details(errors.join("; ")))
        }
    }
}

fn looks_like_address(value: &str) -> bool {
    let Some(body) = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    else {
        return false;
    };
    body.len() == 40 && body.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errors_of(config: &AuthConfig) -> Vec<String> {
        config
            .validate()
            .into_iter()
            .filter(|i| i.severity == IssueSeverity::Error)
            .map(|i| i.message)
            .collect()
    }

    #[test]
    fn test_defaults_have_no_hard_errors() {
        let config = AuthConfig::default();
        assert!(errors_of(&config).is_empty());
        assert_eq!(config.chain_id, 8453);
        assert_eq!(config.name_cache_hours, 24);
        assert_eq!(config.avatar_cache_hours, 6);
        assert_eq!(config.session_expiration_days, 30);
    }

    #[test]
    fn test_defaults_warn_about_missing_provider_ids() {
        let config = AuthConfig::default();
        let warnings: Vec<_> = config
            .validate()
            .into_iter()
            .filter(|i| i.severity == IssueSeverity::Warning)
            .collect();
        // walletconnect id missing + fallback enabled without client id
        assert_eq!(warnings.len(), 2);
        assert!(config.ensure_valid().is_ok());
    }

    #[test]
    fn test_missing_rpc_url_is_an_error() {
        let config = AuthConfig {
            rpc_url: "".to_string(),
            ..AuthConfig::default()
        };
        assert!(errors_of(&config).iter().any(|m| m.contains("rpc_url")));
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_zero_chain_id_is_an_error() {
        let config = AuthConfig {
            chain_id: 0,
            ..AuthConfig::default()
        };
        assert!(errors_of(&config).iter().any(|m| m.contains("chain_id")));
    }

    #[test]
    fn test_out_of_range_knobs_are_errors() {
        let config = AuthConfig {
            session_expiration_days: 0,
            name_cache_hours: 200,
            avatar_cache_hours: 73,
            ..AuthConfig::default()
        };
        assert_eq!(errors_of(&config).len(), 3);
    }

    #[test]
    fn test_bad_registry_address_is_an_error() {
        let config = AuthConfig {
            registry_address: "not-an-address".to_string(),
            ..AuthConfig::default()
        };
        assert!(
            errors_of(&config)
                .iter()
                .any(|m| m.contains("registry_address"))
        );
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: AuthConfig =
            serde_yaml::from_str("rpc_url: https://sepolia.base.org\nchain_id: 84532\n").unwrap();
        assert_eq!(config.rpc_url, "https://sepolia.base.org");
        assert_eq!(config.chain_id, 84532);
        assert_eq!(config.name_cache_hours, 24);
        assert!(config.enable_web3auth_fallback);
    }
}
