//! JSON-RPC 2.0 envelope for `eth_call`

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::address::Address;
use crate::error::RpcError;

/// Outbound `eth_call` request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

impl JsonRpcRequest {
    /// `eth_call` against the latest block
    pub fn eth_call(id: u64, to: &Address, data: &[u8]) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: "eth_call",
            params: json!([
                {
                    "to": to.to_string(),
                    "data": format!("0x{}", hex::encode(data)),
                },
                "latest"
            ]),
        }
    }
}

/// Inbound response; exactly one of `result` / `error` is expected
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

impl JsonRpcResponse {
    /// Extract the raw bytes of a `"0x..."` result, mapping every envelope
    /// problem to an [`RpcError`]
    pub fn into_bytes(self) -> Result<Vec<u8>, RpcError> {
        if let Some(err) = self.error {
            return Err(RpcError::JsonRpc {
                code: err.code,
                message: err.message,
            });
        }

        let result = match self.result {
            Some(Value::String(s)) => s,
            Some(other) => {
                return Err(RpcError::Envelope(format!(
                    "result is not a hex string: {other}"
                )))
            }
            None => return Err(RpcError::Envelope("missing result".to_string())),
        };

        let hex_part = result
            .strip_prefix("0x")
            .ok_or_else(|| RpcError::Envelope("result lacks 0x prefix".to_string()))?;

        hex::decode(hex_part).map_err(|e| RpcError::Envelope(format!("result is not hex: {e}")))
    }
}
