/*
[INPUT]:  RPC endpoint, chain id and registry contract address
[OUTPUT]: Name and avatar lookups via JSON-RPC eth_call
[POS]:    Registry layer - production chain client
[UPDATE]: When registry contract methods or RPC handling change
*/

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};

use super::lookup::NameRegistry;

/// Selector for the registry's `nameForAddress(address)` reverse lookup
const NAME_FOR_ADDRESS_SELECTOR: &str = "0x21e5383a";

/// Selector for the registry's `avatarForName(string)` text-record lookup
const AVATAR_FOR_NAME_SELECTOR: &str = "0x3e9ce794";

/// JSON-RPC error code for contract execution reverts
const RPC_EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Name registry backed by JSON-RPC `eth_call` against the configured
/// registry contract.
///
/// The registry's convenience methods take and return plain strings, so
/// only minimal ABI plumbing is needed here; contract semantics beyond
/// that are out of scope.
#[derive(Debug, Clone)]
pub struct RpcNameRegistry {
    client: Client,
    rpc_url: Url,
    chain_id: u64,
    registry_address: String,
}

impl RpcNameRegistry {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let rpc_url = Url::parse(&config.rpc_url).map_err(|e| {
            AuthError::configuration(format!("invalid rpc_url {:?}", config.rpc_url))
                .with_details(e.to_string())
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.resolve_timeout_secs))
            .build()
            .map_err(|e| {
                AuthError::configuration("failed to build RPC client").with_details(e.to_string())
            })?;
        Ok(Self {
            client,
            rpc_url,
            chain_id: config.chain_id,
            registry_address: config.registry_address.to_ascii_lowercase(),
        })
    }

    /// Verify the node serves the configured chain. A mismatch means the
    /// RPC URL and chain id disagree, which is a configuration fault.
    pub async fn check_chain_id(&self) -> AuthResult<()> {
        let result = self.rpc("eth_chainId", serde_json::json!([])).await?;
        let Some(hex_id) = result else {
            return Err(AuthError::name_resolution("node returned no chain id"));
        };
        let reported = u64::from_str_radix(hex_id.trim_start_matches("0x"), 16).map_err(|e| {
            AuthError::name_resolution(format!("unparseable chain id {hex_id:?}"))
                .with_details(e.to_string())
        })?;
        if reported == self.chain_id {
            Ok(())
        } else {
            Err(AuthError::configuration(format!(
                "rpc endpoint serves chain {reported}, expected {}",
                self.chain_id
            )))
        }
    }

    /// One `eth_call` round trip. `Ok(None)` means the contract reverted,
    /// which the registry uses for "no record".
    async fn eth_call(&self, data: String) -> AuthResult<Option<String>> {
        let params = serde_json::json!([
            { "to": self.registry_address, "data": data },
            "latest"
        ]);
        self.rpc("eth_call", params).await
    }

    async fn rpc(&self, method: &str, params: serde_json::Value) -> AuthResult<Option<String>> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                AuthError::name_resolution(format!("{method} request failed"))
                    .with_details(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::name_resolution(format!(
                "{method} returned status {status}"
            ))
            .with_details(truncate(&body)));
        }

        let parsed: RpcResponse = response.json().await.map_err(|e| {
            AuthError::name_resolution(format!("invalid {method} response"))
                .with_details(e.to_string())
        })?;

        if let Some(error) = parsed.error {
            if error.code == RPC_EXECUTION_REVERTED {
                debug!(method, "registry call reverted, treating as no record");
                return Ok(None);
            }
            return Err(AuthError::name_resolution(format!(
                "{method} rpc error {}",
                error.code
            ))
            .with_details(error.message));
        }

        Ok(parsed.result)
    }
}

#[async_trait]
impl NameRegistry for RpcNameRegistry {
    async fn resolve_name(&self, address: &str) -> AuthResult<Option<String>> {
        let data = format!("{NAME_FOR_ADDRESS_SELECTOR}{}", encode_address(address)?);
        match self.eth_call(data).await? {
            Some(result) => decode_string_return(&result),
            None => Ok(None),
        }
    }

    async fn resolve_avatar_url(&self, name: &str) -> AuthResult<Option<String>> {
        let data = format!("{AVATAR_FOR_NAME_SELECTOR}{}", encode_string(name));
        match self.eth_call(data).await? {
            Some(result) => decode_string_return(&result),
            None => Ok(None),
        }
    }
}

/// ABI-encode an address argument: 12 zero bytes then the 20 address bytes.
fn encode_address(address: &str) -> AuthResult<String> {
    let body = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address)
        .to_ascii_lowercase();
    if body.len() != 40 || !body.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthError::validation(format!("malformed address {address:?}")));
    }
    Ok(format!("{:0>64}", body))
}

/// ABI-encode a single dynamic string argument: head offset, length, then
/// the utf-8 bytes padded to a 32-byte boundary.
fn encode_string(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut data = hex::encode(bytes);
    let padded_len = bytes.len().div_ceil(32) * 32;
    data.push_str(&"0".repeat((padded_len - bytes.len()) * 2));
    format!("{:064x}{:064x}{data}", 32, bytes.len())
}

/// Decode an ABI-encoded string return value. Empty call results and
/// empty strings both mean "no record".
fn decode_string_return(result: &str) -> AuthResult<Option<String>> {
    let trimmed = result.trim_start_matches("0x");
    if trimmed.is_empty() {
        return Ok(None);
    }
    let raw = hex::decode(trimmed).map_err(|e| {
        AuthError::name_resolution("registry returned non-hex data").with_details(e.to_string())
    })?;
    if raw.len() < 64 {
        return Err(AuthError::name_resolution(
            "registry return data too short for a string",
        ));
    }

    let offset = word_to_usize(&raw[..32])?;
    let len_end = offset
        .checked_add(32)
        .filter(|end| *end <= raw.len())
        .ok_or_else(|| AuthError::name_resolution("string offset out of bounds"))?;
    let len = word_to_usize(&raw[offset..len_end])?;
    if len == 0 {
        return Ok(None);
    }
    let data_end = len_end
        .checked_add(len)
        .filter(|end| *end <= raw.len())
        .ok_or_else(|| AuthError::name_resolution("string length out of bounds"))?;

    let value = String::from_utf8(raw[len_end..data_end].to_vec()).map_err(|e| {
        AuthError::name_resolution("registry returned non-utf8 string").with_details(e.to_string())
    })?;
    Ok(Some(value))
}

/// Cap an error body so provider HTML pages do not flood the logs.
fn truncate(body: &str) -> String {
    const MAX_DETAIL_CHARS: usize = 500;
    if body.chars().count() <= MAX_DETAIL_CHARS {
        body.to_string()
    } else {
        let head: String = body.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{head}...")
    }
}

fn word_to_usize(word: &[u8]) -> AuthResult<usize> {
    if word.len() != 32 || word[..24].iter().any(|b| *b != 0) {
        return Err(AuthError::name_resolution("oversized length word"));
    }
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&word[24..32]);
    Ok(u64::from_be_bytes(tail) as usize)
}
