//! Error types for chain access

use std::time::Duration;
use thiserror::Error;

/// Errors produced while talking to an EVM chain
#[derive(Debug, Error)]
pub enum ChainError {
    /// Malformed address or call parameter; never reaches the network
    #[error("validation error: {0}")]
    Validation(String),

    /// Call addressed to a chain this provider is not configured for
    #[error("unsupported chain id {requested} (provider serves chain {configured})")]
    UnsupportedChain { requested: u64, configured: u64 },

    /// Both endpoints failed; carries the last failure observed
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    /// Well-formed response that cannot be parsed into the expected type
    #[error("decode error: {0}")]
    Decode(String),
}

/// Failure of a single JSON-RPC endpoint attempt
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RpcError {
    /// Connection refused, reset, DNS failure, ...
    #[error("transport failure: {0}")]
    Transport(String),

    /// Endpoint answered with a non-success HTTP status
    #[error("http status {0}")]
    HttpStatus(u16),

    /// Response body is not a usable JSON-RPC envelope
    #[error("malformed json-rpc envelope: {0}")]
    Envelope(String),

    /// Envelope carried an `error` object
    #[error("json-rpc error {code}: {message}")]
    JsonRpc { code: i64, message: String },

    /// Attempt exceeded its deadline
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Caller cancelled the request context
    #[error("request cancelled")]
    Cancelled,
}

/// Result type for chain operations
pub type Result<T> = std::result::Result<T, ChainError>;
