use num_bigint::BigUint;
use tokengate_chain::{Address, RequestContext};
use tracing::debug;

use super::chain::ChainBinding;
use super::subject_address;
use crate::error::Result;
use crate::types::Claims;

/// Allows when the holder's ERC20 balance is at least `minimum`
#[derive(Debug, Clone)]
pub struct Erc20MinBalanceRule {
    contract: Address,
    chain_id: u64,
    minimum: BigUint,
    chain: ChainBinding,
}

impl Erc20MinBalanceRule {
    /// Create a rule over a validated contract and threshold
    pub fn new(contract: Address, chain_id: u64, minimum: BigUint, chain: ChainBinding) -> Self {
        Self {
            contract,
            chain_id,
            minimum,
            chain,
        }
    }

    /// Token contract queried
    pub fn contract(&self) -> &Address {
        &self.contract
    }

    /// Chain the contract lives on
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Smallest balance that allows, in base units
    pub fn minimum(&self) -> &BigUint {
        &self.minimum
    }

    /// Allow when `balanceOf(subject) >= minimum`
    pub async fn evaluate(&self, ctx: &RequestContext, claims: &Claims) -> Result<bool> {
        let holder = subject_address(claims)?;
        let balance = self
            .chain
            .erc20_balance(ctx, self.chain_id, &self.contract, &holder)
            .await?;

        let allowed = balance >= self.minimum;
        debug!(
            %holder,
            token = %self.contract,
            %balance,
            minimum = %self.minimum,
            allowed,
            "erc20 balance check"
        );
        Ok(allowed)
    }
}
