//! Rule configuration and the factory that turns it into [`Rule`]s
//!
//! The configuration enum is tagged by `type` with parameters under
//! `params`:
//!
//! ```json
//! {"type": "erc20_min_balance",
//!  "params": {"token": "0xA0b8...eB48", "chainId": 1, "minimum": "1000000000"}}
//! ```
//!
//! Serde resolves the `type` string to exactly one variant, and
//! [`RuleFactory::build`] matches exhaustively on it, so adding a rule type
//! is a compile error until every site handles it.

use std::fmt;
use std::sync::Arc;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tokengate_chain::{Address, BlockchainProvider};

use super::{AllowlistRule, ChainBinding, Erc20MinBalanceRule, Erc721OwnerRule, Rule, RuleKind, ScopeRule};
use crate::allowlist::AllowlistStore;
use crate::cache::{CachedValue, ResultCache};
use crate::error::{AuthzError, Result};

/// Serialized form of a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "snake_case")]
pub enum RuleConfig {
    HasScope {
        scope: String,
    },
    InAllowlist {
        #[serde(rename = "allowlistId")]
        allowlist_id: String,
    },
    Erc20MinBalance {
        token: String,
        #[serde(rename = "chainId", default, skip_serializing_if = "Option::is_none")]
        chain_id: Option<u64>,
        /// Decimal string, arbitrary precision
        minimum: String,
    },
    Erc721Owner {
        token: String,
        #[serde(rename = "chainId", default, skip_serializing_if = "Option::is_none")]
        chain_id: Option<u64>,
        #[serde(rename = "tokenId", default, skip_serializing_if = "Option::is_none")]
        token_id: Option<String>,
        #[serde(rename = "anyToken", default)]
        any_token: bool,
    },
}

impl RuleConfig {
    /// Rule type named by `type`
    pub fn kind(&self) -> RuleKind {
        match self {
            RuleConfig::HasScope { .. } => RuleKind::HasScope,
            RuleConfig::InAllowlist { .. } => RuleKind::InAllowlist,
            RuleConfig::Erc20MinBalance { .. } => RuleKind::Erc20MinBalance,
            RuleConfig::Erc721Owner { .. } => RuleKind::Erc721Owner,
        }
    }
}

/// Builds validated rules with their collaborators injected
///
/// Blockchain rules need [`RuleFactory::with_chain`]; allowlist rules need
/// [`RuleFactory::with_allowlists`]. Building a rule whose collaborator is
/// missing is a policy error, reported at load time.
#[derive(Clone)]
pub struct RuleFactory {
    default_chain_id: u64,
    chain: Option<ChainBinding>,
    allowlists: Option<Arc<dyn AllowlistStore>>,
}

impl RuleFactory {
    /// Factory for rules without a `chainId` on `default_chain_id`
    pub fn new(default_chain_id: u64) -> Self {
        Self {
            default_chain_id,
            chain: None,
            allowlists: None,
        }
    }

    /// Enable blockchain rules
    pub fn with_chain(
        mut self,
        provider: Arc<dyn BlockchainProvider>,
        cache: Arc<ResultCache<CachedValue>>,
    ) -> Self {
        self.chain = Some(ChainBinding::new(provider, cache));
        self
    }

    /// Enable allowlist rules
    pub fn with_allowlists(mut self, store: Arc<dyn AllowlistStore>) -> Self {
        self.allowlists = Some(store);
        self
    }

    /// Chain assumed when a rule omits `chainId`
    pub fn default_chain_id(&self) -> u64 {
        self.default_chain_id
    }

    /// Shared result cache, when blockchain rules are enabled
    pub fn cache(&self) -> Option<&Arc<ResultCache<CachedValue>>> {
        self.chain.as_ref().map(ChainBinding::cache)
    }

    /// Validate `config` and build the rule
    pub fn build(&self, config: &RuleConfig) -> Result<Rule> {
        match config {
            RuleConfig::HasScope { scope } => Ok(Rule::Scope(ScopeRule::new(scope.clone())?)),

            RuleConfig::InAllowlist { allowlist_id } => {
                let store = self.allowlists.clone().ok_or_else(|| {
                    AuthzError::InvalidPolicy("in_allowlist rule requires an allowlist store".to_string())
                })?;
                Ok(Rule::Allowlist(AllowlistRule::new(allowlist_id.clone(), store)?))
            }

            RuleConfig::Erc20MinBalance {
                token,
                chain_id,
                minimum,
            } => {
                let chain = self.chain_binding(RuleKind::Erc20MinBalance)?;
                let chain_id = chain_id.unwrap_or(self.default_chain_id);
                chain.ensure_chain(chain_id)?;
                let contract = Address::parse(token)?;
                let minimum = parse_decimal("minimum", minimum)?;
                Ok(Rule::Erc20MinBalance(Erc20MinBalanceRule::new(
                    contract,
                    chain_id,
                    minimum,
                    chain,
                )))
            }

            RuleConfig::Erc721Owner {
                token,
                chain_id,
                token_id,
                any_token,
            } => {
                let chain = self.chain_binding(RuleKind::Erc721Owner)?;
                let chain_id = chain_id.unwrap_or(self.default_chain_id);
                chain.ensure_chain(chain_id)?;
                let contract = Address::parse(token)?;
                let token_id = token_id
                    .as_deref()
                    .map(|raw| parse_decimal("tokenId", raw))
                    .transpose()?;
                Ok(Rule::Erc721Owner(Erc721OwnerRule::new(
                    contract,
                    chain_id,
                    token_id,
                    *any_token,
                    chain,
                )?))
            }
        }
    }

    fn chain_binding(&self, kind: RuleKind) -> Result<ChainBinding> {
        self.chain.clone().ok_or_else(|| {
            AuthzError::InvalidPolicy(format!("{kind} rule requires a blockchain provider"))
        })
    }
}

impl fmt::Debug for RuleFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleFactory")
            .field("default_chain_id", &self.default_chain_id)
            .field("chain", &self.chain)
            .field("allowlists", &self.allowlists.is_some())
            .finish()
    }
}

/// Parse a plain base-10 unsigned integer (digits only, no sign or separators)
fn parse_decimal(field: &str, raw: &str) -> Result<BigUint> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AuthzError::Validation(format!(
            "{field} must be a non-negative decimal string, got {raw:?}"
        )));
    }
    BigUint::parse_bytes(raw.as_bytes(), 10)
        .ok_or_else(|| AuthzError::Validation(format!("{field} is not a valid decimal: {raw:?}")))
}
