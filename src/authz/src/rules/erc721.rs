use num_bigint::BigUint;
use num_traits::Zero;
use tokengate_chain::{abi, Address, RequestContext};
use tracing::debug;

use super::chain::ChainBinding;
use super::subject_address;
use crate::error::{AuthzError, Result};
use crate::types::Claims;

/// What an [`Erc721OwnerRule`] checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Erc721Target {
    /// `ownerOf(token_id)` must be the holder
    Token(BigUint),
    /// `balanceOf(holder)` must be non-zero
    AnyToken,
}

/// Allows when the holder owns a specific NFT, or any NFT of the collection
#[derive(Debug, Clone)]
pub struct Erc721OwnerRule {
    contract: Address,
    chain_id: u64,
    target: Erc721Target,
    chain: ChainBinding,
}

impl Erc721OwnerRule {
    /// Build from the raw configuration fields
    ///
    /// Exactly one of `token_id` or `any_token` must be given, and a token ID
    /// must fit in a uint256.
    pub fn new(
        contract: Address,
        chain_id: u64,
        token_id: Option<BigUint>,
        any_token: bool,
        chain: ChainBinding,
    ) -> Result<Self> {
        let target = match (token_id, any_token) {
            (Some(_), true) => {
                return Err(AuthzError::Validation(
                    "erc721_owner: tokenId and anyToken are mutually exclusive".to_string(),
                ))
            }
            (None, false) => {
                return Err(AuthzError::Validation(
                    "erc721_owner: either tokenId or anyToken=true is required".to_string(),
                ))
            }
            (Some(id), false) => {
                abi::uint256_word(&id)?;
                Erc721Target::Token(id)
            }
            (None, true) => Erc721Target::AnyToken,
        };

        Ok(Self {
            contract,
            chain_id,
            target,
            chain,
        })
    }

    /// Collection contract queried
    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Chain the collection lives on
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Specific token or any token of the collection
    pub fn target(&self) -> &Erc721Target {
        &self.target
    }

    /// Allow on ownership of the token, or any balance for `anyToken`
    pub async fn evaluate(&self, ctx: &RequestContext, claims: &Claims) -> Result<bool> {
        let holder = subject_address(claims)?;

        match &self.target {
            Erc721Target::Token(token_id) => {
                let owner = self
                    .chain
                    .erc721_owner(ctx, self.chain_id, &self.contract, token_id)
                    .await?;

                if owner.is_zero() {
                    debug!(token = %self.contract, %token_id, "token burned or unminted");
                    return Ok(false);
                }

                let allowed = owner == holder;
                debug!(%holder, %owner, %token_id, allowed, "erc721 ownership check");
                Ok(allowed)
            }
            Erc721Target::AnyToken => {
                let balance = self
                    .chain
                    .erc721_balance(ctx, self.chain_id, &self.contract, &holder)
                    .await?;

                let allowed = !balance.is_zero();
                debug!(%holder, token = %self.contract, %balance, allowed, "erc721 collection check");
                Ok(allowed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, CachedValue, ResultCache};
    use std::sync::Arc;
    use tokengate_chain::testing::MockProvider;

    const BAYC: &str = "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D";
    const ALICE: &str = "0x00000000000000000000000000000000000a11ce";
    const BOB: &str = "0x0000000000000000000000000000000000000b0b";

    fn bayc() -> Address {
        Address::parse(BAYC).unwrap()
    }

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn binding(provider: Arc<MockProvider>) -> ChainBinding {
        let cache = Arc::new(ResultCache::<CachedValue>::new(CacheConfig::default()));
        ChainBinding::new(provider, cache)
    }

    fn claims(address: &str) -> Claims {
        Claims::new(address, Vec::<String>::new())
    }

    #[test]
    fn test_target_must_be_exactly_one() {
        let chain = binding(Arc::new(MockProvider::new()));

        let both = Erc721OwnerRule::new(bayc(), 1, Some(BigUint::from(1u8)), true, chain.clone());
        assert!(matches!(both, Err(AuthzError::Validation(_))));

        let neither = Erc721OwnerRule::new(bayc(), 1, None, false, chain.clone());
        assert!(matches!(neither, Err(AuthzError::Validation(_))));

        let oversized = Erc721OwnerRule::new(bayc(), 1, Some(BigUint::from(1u8) << 256), false, chain);
        assert!(matches!(oversized, Err(AuthzError::Validation(_))));
    }

    #[tokio::test]
    async fn test_owner_allowed_other_denied() {
        let provider = Arc::new(MockProvider::new().with_owner(bayc(), 1234u32, addr(ALICE)));
        let rule =
            Erc721OwnerRule::new(bayc(), 1, Some(BigUint::from(1234u32)), false, binding(provider.clone()))
                .unwrap();
        let ctx = RequestContext::new();

        assert!(rule.evaluate(&ctx, &claims(ALICE)).await.unwrap());
        assert!(!rule.evaluate(&ctx, &claims(BOB)).await.unwrap());

        // Keyed by token, so the second user reused the first lookup
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_burned_token_denied() {
        let provider = Arc::new(MockProvider::new().with_owner(bayc(), 7u8, Address::ZERO));
        let rule =
            Erc721OwnerRule::new(bayc(), 1, Some(BigUint::from(7u8)), false, binding(provider)).unwrap();
        let ctx = RequestContext::new();

        assert!(!rule.evaluate(&ctx, &claims(ALICE)).await.unwrap());

        let zero_caller = rule
            .evaluate(&ctx, &claims("0x0000000000000000000000000000000000000000"))
            .await;
        assert!(matches!(zero_caller, Err(AuthzError::Validation(_))));
    }

    #[tokio::test]
    async fn test_any_token_uses_balance_of() {
        let provider = Arc::new(
            MockProvider::new()
                .with_balance(bayc(), addr(ALICE), 1u8)
                .with_balance(bayc(), addr(BOB), 0u8),
        );
        let rule = Erc721OwnerRule::new(bayc(), 1, None, true, binding(provider.clone())).unwrap();
        let ctx = RequestContext::new();

        assert!(rule.evaluate(&ctx, &claims(ALICE)).await.unwrap());
        assert!(!rule.evaluate(&ctx, &claims(BOB)).await.unwrap());
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_nonexistent_token_reverts_to_error() {
        // Unscripted calls revert, as ownerOf does for unminted tokens
        let provider = Arc::new(MockProvider::new());
        let rule =
            Erc721OwnerRule::new(bayc(), 1, Some(BigUint::from(99u8)), false, binding(provider)).unwrap();

        let err = rule.evaluate(&RequestContext::new(), &claims(ALICE)).await.unwrap_err();
        assert!(matches!(err, AuthzError::Rpc(_)));
    }
}
