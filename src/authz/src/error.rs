//! Error types for the authorization engine

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokengate_chain::{ChainError, RpcError};

/// Authorization engine errors
///
/// Every variant reaching a rule is converted into a denial; none of them is
/// ever a reason to allow or to retry.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed address or rule parameter
    #[error("validation error: {0}")]
    Validation(String),

    /// RPC failure on every configured endpoint
    #[error("rpc error: {0}")]
    Rpc(#[source] RpcError),

    /// On-chain answer that could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// Allowlist collaborator failure
    #[error("allowlist lookup failed: {0}")]
    AllowlistLookup(String),

    /// Invalid policy definition
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    /// Invalid engine configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal invariant violation
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthzError {
    /// Category recorded on failed rule results
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthzError::Validation(_) => ErrorKind::Validation,
            AuthzError::Rpc(_) => ErrorKind::Rpc,
            AuthzError::Decode(_) => ErrorKind::Decode,
            AuthzError::AllowlistLookup(_) => ErrorKind::AllowlistLookup,
            AuthzError::InvalidPolicy(_) => ErrorKind::InvalidPolicy,
            AuthzError::Config(_) => ErrorKind::Config,
            AuthzError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<ChainError> for AuthzError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Validation(msg) => AuthzError::Validation(msg),
            unsupported @ ChainError::UnsupportedChain { .. } => {
                AuthzError::Validation(unsupported.to_string())
            }
            ChainError::Rpc(rpc) => AuthzError::Rpc(rpc),
            ChainError::Decode(msg) => AuthzError::Decode(msg),
        }
    }
}

/// Stable error classification recorded in decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Rpc,
    Decode,
    AllowlistLookup,
    InvalidPolicy,
    Config,
    Internal,
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
