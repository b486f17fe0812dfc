//! Blockchain provider: `eth_call` against a primary endpoint with one fallback

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use num_bigint::BigUint;
use reqwest::Url;
use tracing::{debug, warn};

use crate::abi;
use crate::address::Address;
use crate::context::RequestContext;
use crate::error::{ChainError, Result, RpcError};
use crate::jsonrpc::{JsonRpcRequest, JsonRpcResponse};

/// Default per-attempt RPC timeout
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only access to contract state
///
/// Implementations must honour the request context: a cancelled or expired
/// context makes the call fail rather than hang.
#[async_trait]
pub trait BlockchainProvider: Send + Sync {
    /// Chain this provider serves, `None` when it accepts any chain id
    fn chain_id(&self) -> Option<u64> {
        None
    }

    /// Execute `eth_call` and return the raw return data
    async fn call(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &str,
        call_data: &[u8],
    ) -> Result<Vec<u8>>;

    /// `balanceOf(holder)`, valid for both ERC20 and ERC721 contracts
    async fn balance_of(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &Address,
        holder: &Address,
    ) -> Result<BigUint> {
        let data = abi::encode_balance_of(holder);
        let raw = self.call(ctx, chain_id, &contract.to_string(), &data).await?;
        abi::decode_uint256(&raw)
    }

    /// ERC721 `ownerOf(token_id)`; the zero address is returned as-is
    async fn owner_of(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &Address,
        token_id: &BigUint,
    ) -> Result<Address> {
        let data = abi::encode_owner_of(token_id)?;
        let raw = self.call(ctx, chain_id, &contract.to_string(), &data).await?;
        abi::decode_address(&raw)
    }
}

/// Provider configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// Chain served by the endpoints
    pub chain_id: u64,

    /// Primary JSON-RPC URL
    pub primary_url: String,

    /// Fallback JSON-RPC URL, tried once when the primary fails
    pub fallback_url: Option<String>,

    /// Budget for each endpoint attempt
    pub timeout: Duration,
}

impl RpcConfig {
    /// Config with no fallback and the default timeout
    pub fn new(chain_id: u64, primary_url: impl Into<String>) -> Self {
        Self {
            chain_id,
            primary_url: primary_url.into(),
            fallback_url: None,
            timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    /// Set the fallback endpoint
    pub fn with_fallback(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = Some(url.into());
        self
    }

    /// Set the per-attempt timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Primary,
    Fallback,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Primary => f.write_str("primary"),
            Endpoint::Fallback => f.write_str("fallback"),
        }
    }
}

/// HTTP JSON-RPC provider
///
/// Each call makes at most two HTTP requests: one to the primary endpoint
/// and, only if that fails, one to the fallback. There is no backoff or
/// further retry.
pub struct RpcProvider {
    client: reqwest::Client,
    chain_id: u64,
    primary: Url,
    fallback: Option<Url>,
    timeout: Duration,
    next_id: AtomicU64,
}

impl RpcProvider {
    /// Create a provider, validating the endpoint URLs
    pub fn new(config: RpcConfig) -> Result<Self> {
        let primary = parse_url(&config.primary_url, Endpoint::Primary)?;
        let fallback = config
            .fallback_url
            .as_deref()
            .map(|url| parse_url(url, Endpoint::Fallback))
            .transpose()?;

        Ok(Self {
            client: reqwest::Client::new(),
            chain_id: config.chain_id,
            primary,
            fallback,
            timeout: config.timeout,
            next_id: AtomicU64::new(1),
        })
    }

    async fn attempt(
        &self,
        ctx: &RequestContext,
        endpoint: Endpoint,
        url: &Url,
        request: &JsonRpcRequest,
    ) -> std::result::Result<Vec<u8>, RpcError> {
        if ctx.is_cancelled() {
            return Err(RpcError::Cancelled);
        }

        let budget = ctx.budget(self.timeout);
        if budget.is_zero() {
            return Err(RpcError::Timeout(budget));
        }

        debug!(%endpoint, id = request.id, "sending eth_call");

        let exchange = async {
            let response = self
                .client
                .post(url.clone())
                .json(request)
                .send()
                .await
                .map_err(|e| RpcError::Transport(e.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(RpcError::HttpStatus(status.as_u16()));
            }

            let envelope: JsonRpcResponse = response
                .json()
                .await
                .map_err(|e| RpcError::Envelope(e.without_url().to_string()))?;

            envelope.into_bytes()
        };

        tokio::select! {
            _ = ctx.cancelled() => Err(RpcError::Cancelled),
            outcome = tokio::time::timeout(budget, exchange) => match outcome {
                Ok(result) => result,
                Err(_) => Err(RpcError::Timeout(budget)),
            },
        }
    }
}

#[async_trait]
impl BlockchainProvider for RpcProvider {
    fn chain_id(&self) -> Option<u64> {
        Some(self.chain_id)
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &str,
        call_data: &[u8],
    ) -> Result<Vec<u8>> {
        let to = Address::parse(contract)?;

        if chain_id != self.chain_id {
            return Err(ChainError::UnsupportedChain {
                requested: chain_id,
                configured: self.chain_id,
            });
        }

        let request = JsonRpcRequest::eth_call(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            &to,
            call_data,
        );

        let primary_err = match self.attempt(ctx, Endpoint::Primary, &self.primary, &request).await {
            Ok(raw) => return Ok(raw),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            warn!(error = %primary_err, "primary rpc endpoint failed, no fallback configured");
            return Err(ChainError::Rpc(primary_err));
        };

        warn!(error = %primary_err, "primary rpc endpoint failed, trying fallback");

        match self.attempt(ctx, Endpoint::Fallback, fallback, &request).await {
            Ok(raw) => Ok(raw),
            Err(fallback_err) => {
                warn!(error = %fallback_err, "fallback rpc endpoint failed");
                Err(ChainError::Rpc(fallback_err))
            }
        }
    }
}

fn parse_url(raw: &str, endpoint: Endpoint) -> Result<Url> {
    Url::parse(raw).map_err(|e| ChainError::Validation(format!("invalid {endpoint} rpc url: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_urls() {
        let bad_primary = RpcProvider::new(RpcConfig::new(1, "not a url"));
        assert!(matches!(bad_primary, Err(ChainError::Validation(_))));

        let bad_fallback =
            RpcProvider::new(RpcConfig::new(1, "http://127.0.0.1:8545").with_fallback("::"));
        assert!(matches!(bad_fallback, Err(ChainError::Validation(_))));
    }

    #[test]
    fn test_config_defaults() {
        let config = RpcConfig::new(1, "http://127.0.0.1:8545");
        assert_eq!(config.timeout, DEFAULT_RPC_TIMEOUT);
        assert!(config.fallback_url.is_none());
    }

    #[tokio::test]
    async fn test_invalid_contract_never_hits_network() {
        // Port 9 (discard) would fail anyway; validation must come first.
        let provider = RpcProvider::new(RpcConfig::new(1, "http://127.0.0.1:9")).unwrap();
        let ctx = RequestContext::new();

        let result = provider.call(&ctx, 1, "0x1234", &[]).await;
        assert!(matches!(result, Err(ChainError::Validation(_))));
    }

    #[test]
    fn test_reports_served_chain() {
        let provider = RpcProvider::new(RpcConfig::new(137, "http://127.0.0.1:9")).unwrap();
        assert_eq!(BlockchainProvider::chain_id(&provider), Some(137));
    }

    #[tokio::test]
    async fn test_wrong_chain_rejected() {
        let provider = RpcProvider::new(RpcConfig::new(1, "http://127.0.0.1:9")).unwrap();
        let ctx = RequestContext::new();
        let contract = Address::from_bytes([0x22; 20]).to_string();

        let result = provider.call(&ctx, 137, &contract, &[]).await;
        assert!(matches!(
            result,
            Err(ChainError::UnsupportedChain { requested: 137, configured: 1 })
        ));
    }
}
