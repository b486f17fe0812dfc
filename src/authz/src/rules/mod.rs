//! Access rules
//!
//! A [`Rule`] is a closed set of variants, one per rule type. Every variant
//! is evaluated through [`Rule::evaluate`], which routes the variant's raw
//! `Result<bool>` through [`fail_closed`]: an error always becomes a denial
//! with the error attached for the audit trail.
//!
//! Rules are built once, from configuration, by the
//! [`RuleFactory`](registry::RuleFactory); parameters are validated there and
//! never re-checked per request.

mod allowlist;
mod chain;
mod erc20;
mod erc721;
pub mod registry;
mod scope;

pub use allowlist::AllowlistRule;
pub use chain::ChainBinding;
pub use erc20::Erc20MinBalanceRule;
pub use erc721::{Erc721OwnerRule, Erc721Target};
pub use registry::{RuleConfig, RuleFactory};
pub use scope::ScopeRule;

use serde::{Deserialize, Serialize};
use std::fmt;
use tokengate_chain::{Address, RequestContext};
use tracing::{debug, warn};

use crate::error::{AuthzError, ErrorKind, Result};
use crate::types::Claims;

/// Rule type tag, matching the `type` field of rule configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    HasScope,
    InAllowlist,
    Erc20MinBalance,
    Erc721Owner,
}

impl RuleKind {
    /// Wire name used in policy documents
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::HasScope => "has_scope",
            RuleKind::InAllowlist => "in_allowlist",
            RuleKind::Erc20MinBalance => "erc20_min_balance",
            RuleKind::Erc721Owner => "erc721_owner",
        }
    }

    /// Whether evaluating this rule may perform network I/O
    pub fn is_blockchain(&self) -> bool {
        matches!(self, RuleKind::Erc20MinBalance | RuleKind::Erc721Owner)
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable identification of a rule for decisions and logs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub kind: RuleKind,
    /// e.g. `has_scope(admin)`
    pub summary: String,
}

/// Error attached to a failed rule evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AuthzError> for RuleError {
    fn from(err: &AuthzError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Outcome of one rule evaluation
///
/// `error` set implies `allowed == false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub allowed: bool,
    pub error: Option<RuleError>,
}

impl RuleOutcome {
    /// Successful allow
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            error: None,
        }
    }

    /// Successful deny
    pub fn denied() -> Self {
        Self {
            allowed: false,
            error: None,
        }
    }

    /// Fail-closed deny carrying `error`
    pub fn failed(error: &AuthzError) -> Self {
        Self {
            allowed: false,
            error: Some(error.into()),
        }
    }
}

/// Convert a raw rule result into an outcome; errors deny
pub fn fail_closed(rule: &RuleDescriptor, result: Result<bool>) -> RuleOutcome {
    match result {
        Ok(true) => RuleOutcome::allowed(),
        Ok(false) => {
            debug!(rule = %rule.summary, "rule denied");
            RuleOutcome::denied()
        }
        Err(error) => {
            warn!(
                rule = %rule.summary,
                kind = ?error.kind(),
                error = %error,
                "rule evaluation failed, denying"
            );
            RuleOutcome::failed(&error)
        }
    }
}

/// A configured access rule
#[derive(Debug, Clone)]
pub enum Rule {
    Scope(ScopeRule),
    Allowlist(AllowlistRule),
    Erc20MinBalance(Erc20MinBalanceRule),
    Erc721Owner(Erc721OwnerRule),
}

impl Rule {
    pub fn kind(&self) -> RuleKind {
        match self {
            Rule::Scope(_) => RuleKind::HasScope,
            Rule::Allowlist(_) => RuleKind::InAllowlist,
            Rule::Erc20MinBalance(_) => RuleKind::Erc20MinBalance,
            Rule::Erc721Owner(_) => RuleKind::Erc721Owner,
        }
    }

    /// Kind and parameter summary for logs and results
    pub fn descriptor(&self) -> RuleDescriptor {
        let summary = match self {
            Rule::Scope(rule) => format!("has_scope({})", rule.required_scope()),
            Rule::Allowlist(rule) => format!("in_allowlist({})", rule.allowlist_id()),
            Rule::Erc20MinBalance(rule) => format!(
                "erc20_min_balance(chain={}, token={}, minimum={})",
                rule.chain_id(),
                rule.contract(),
                rule.minimum()
            ),
            Rule::Erc721Owner(rule) => match rule.target() {
                Erc721Target::Token(id) => format!(
                    "erc721_owner(chain={}, token={}, tokenId={})",
                    rule.chain_id(),
                    rule.contract(),
                    id
                ),
                Erc721Target::AnyToken => format!(
                    "erc721_owner(chain={}, token={}, anyToken)",
                    rule.chain_id(),
                    rule.contract()
                ),
            },
        };

        RuleDescriptor {
            kind: self.kind(),
            summary,
        }
    }

    /// Evaluate against the request's claims; never returns an error
    pub async fn evaluate(&self, ctx: &RequestContext, claims: &Claims) -> RuleOutcome {
        let result = match self {
            Rule::Scope(rule) => rule.evaluate(claims),
            Rule::Allowlist(rule) => rule.evaluate(ctx, claims).await,
            Rule::Erc20MinBalance(rule) => rule.evaluate(ctx, claims).await,
            Rule::Erc721Owner(rule) => rule.evaluate(ctx, claims).await,
        };

        fail_closed(&self.descriptor(), result)
    }
}

/// Parse the claims address for an on-chain lookup
///
/// The zero address can never hold or own anything and is rejected.
pub(crate) fn subject_address(claims: &Claims) -> Result<Address> {
    let address = Address::parse(&claims.address)?;
    if address.is_zero() {
        return Err(AuthzError::Validation(
            "zero address cannot be a token holder".to_string(),
        ));
    }
    Ok(address)
}
