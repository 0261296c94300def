/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for baseauth-core tests

use baseauth_core::AuthConfig;
use wiremock::MockServer;

/// Canonical lowercase test wallet address
#[allow(dead_code)]
pub const TEST_ADDRESS: &str = "0x1234567890abcdef1234567890abcdef12345678";

/// Setup a mock HTTP server for testing
#[allow(dead_code)]
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Configuration pointed at a mock server instead of a live node
#[allow(dead_code)]
pub fn config_for(server: &MockServer) -> AuthConfig {
    AuthConfig {
        rpc_url: server.uri(),
        ..AuthConfig::default()
    }
}

/// ABI-encode a string return value the way the registry contract would
#[allow(dead_code)]
pub fn abi_string(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut data = hex::encode(bytes);
    let padded_len = bytes.len().div_ceil(32) * 32;
    data.push_str(&"0".repeat((padded_len - bytes.len()) * 2));
    format!("0x{:064x}{:064x}{data}", 32, bytes.len())
}

/// Successful JSON-RPC envelope around a result payload
#[allow(dead_code)]
pub fn rpc_result(result: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": result,
    })
}

/// JSON-RPC error envelope
#[allow(dead_code)]
pub fn rpc_error(code: i64, message: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": { "code": code, "message": message },
    })
}
