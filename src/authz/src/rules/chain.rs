use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use tokengate_chain::{Address, BlockchainProvider, RequestContext};
use tracing::debug;

use crate::cache::{cache_key, CachedValue, ResultCache};
use crate::error::{AuthzError, Result};
use crate::rules::RuleKind;

/// Cache namespace for ERC721 `balanceOf` lookups
const ERC721_BALANCE: &str = "erc721_balance";

/// Provider and cache shared by every blockchain-backed rule
///
/// Lookups check the cache first; on a miss the provider is called and the
/// decoded value is stored before the rule compares it, so a cached result
/// survives regardless of the rule's verdict.
#[derive(Clone)]
pub struct ChainBinding {
    provider: Arc<dyn BlockchainProvider>,
    cache: Arc<ResultCache<CachedValue>>,
    ttl: Duration,
}

impl ChainBinding {
    /// Bind `provider` to `cache`, reusing the cache TTL
    pub fn new(provider: Arc<dyn BlockchainProvider>, cache: Arc<ResultCache<CachedValue>>) -> Self {
        let ttl = cache.default_ttl();
        Self { provider, cache, ttl }
    }

    /// Reject `chain_id` when the provider serves a different chain
    pub fn ensure_chain(&self, chain_id: u64) -> Result<()> {
        match self.provider.chain_id() {
            Some(served) if served != chain_id => Err(AuthzError::Validation(format!(
                "chainId {chain_id} is not served by the configured provider (chain {served})"
            ))),
            _ => Ok(()),
        }
    }

    /// Shared result cache
    pub fn cache(&self) -> &Arc<ResultCache<CachedValue>> {
        &self.cache
    }

    /// ERC20 `balanceOf(holder)`, keyed by holder
    pub async fn erc20_balance(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &Address,
        holder: &Address,
    ) -> Result<BigUint> {
        let key = cache_key(RuleKind::Erc20MinBalance.as_str(), chain_id, contract, &holder.to_string());
        self.balance(ctx, key, chain_id, contract, holder).await
    }

    /// ERC721 `balanceOf(holder)`, keyed by holder
    pub async fn erc721_balance(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &Address,
        holder: &Address,
    ) -> Result<BigUint> {
        let key = cache_key(ERC721_BALANCE, chain_id, contract, &holder.to_string());
        self.balance(ctx, key, chain_id, contract, holder).await
    }

    /// ERC721 `ownerOf(token_id)`, keyed by token so every caller shares it
    pub async fn erc721_owner(
        &self,
        ctx: &RequestContext,
        chain_id: u64,
        contract: &Address,
        token_id: &BigUint,
    ) -> Result<Address> {
        let key = cache_key(RuleKind::Erc721Owner.as_str(), chain_id, contract, &token_id.to_string());

        if let Some(CachedValue::Owner(owner)) = self.cache.get(&key) {
            debug!(%key, "chain cache hit");
            return Ok(owner);
        }

        let owner = self.provider.owner_of(ctx, chain_id, contract, token_id).await?;
        self.cache.set(key, CachedValue::Owner(owner), self.ttl);
        Ok(owner)
    }

    async fn balance(
        &self,
        ctx: &RequestContext,
        key: String,
        chain_id: u64,
        contract: &Address,
        holder: &Address,
    ) -> Result<BigUint> {
        if let Some(CachedValue::Balance(balance)) = self.cache.get(&key) {
            debug!(%key, "chain cache hit");
            return Ok(balance);
        }

        let balance = self.provider.balance_of(ctx, chain_id, contract, holder).await?;
        self.cache.set(key, CachedValue::Balance(balance.clone()), self.ttl);
        Ok(balance)
    }
}

impl fmt::Debug for ChainBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainBinding")
            .field("cache", &self.cache)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
