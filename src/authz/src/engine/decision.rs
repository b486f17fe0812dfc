//! Authorization decision types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AuthzError;
use crate::rules::{RuleDescriptor, RuleError, RuleOutcome};

/// Allow or deny, used for the no-match fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyEffect {
    Allow,
    #[default]
    Deny,
}

impl PolicyEffect {
    /// Whether this effect grants access
    pub fn is_allow(&self) -> bool {
        matches!(self, PolicyEffect::Allow)
    }
}

impl fmt::Display for PolicyEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyEffect::Allow => f.write_str("allow"),
            PolicyEffect::Deny => f.write_str("deny"),
        }
    }
}

impl FromStr for PolicyEffect {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(PolicyEffect::Allow),
            "deny" => Ok(PolicyEffect::Deny),
            other => Err(AuthzError::Config(format!(
                "expected \"allow\" or \"deny\", got {other:?}"
            ))),
        }
    }
}

/// Result of one evaluated rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    /// Name of the policy the rule belongs to, e.g. `GET /api/vip`
    pub policy: String,
    /// Position of the rule in the policy's declared list
    pub index: usize,
    pub rule: RuleDescriptor,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RuleError>,
}

impl RuleResult {
    /// Record `outcome` for rule `index` of `policy`
    pub fn new(policy: impl Into<String>, index: usize, rule: RuleDescriptor, outcome: RuleOutcome) -> Self {
        Self {
            policy: policy.into(),
            index,
            rule,
            allowed: outcome.allowed,
            error: outcome.error,
        }
    }
}

/// Final authorization decision, returned to the caller for audit logging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision ID
    pub id: Uuid,

    pub allowed: bool,

    /// Human-readable reason; never contains raw error text
    pub reason: String,

    /// Names of every policy that matched the route, in declared order
    pub matched_policies: Vec<String>,

    /// Evaluated rules, ordered by policy then declared index
    pub rule_results: Vec<RuleResult>,

    pub evaluated_at: DateTime<Utc>,
}

impl Decision {
    /// Allowing decision stamped now
    pub fn allow(reason: impl Into<String>) -> Self {
        Self::new(true, reason)
    }

    /// Denying decision stamped now
    pub fn deny(reason: impl Into<String>) -> Self {
        Self::new(false, reason)
    }

    fn new(allowed: bool, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            allowed,
            reason: reason.into(),
            matched_policies: Vec::new(),
            rule_results: Vec::new(),
            evaluated_at: Utc::now(),
        }
    }

    /// Names of the policies that matched the route
    pub fn with_matched_policies(mut self, policies: Vec<String>) -> Self {
        self.matched_policies = policies;
        self
    }

    /// Per-rule results in evaluation order
    pub fn with_rule_results(mut self, results: Vec<RuleResult>) -> Self {
        self.rule_results = results;
        self
    }

    /// Rule results that carry an error
    pub fn errors(&self) -> impl Iterator<Item = &RuleResult> {
        self.rule_results.iter().filter(|r| r.error.is_some())
    }

    /// Whether any rule failed
    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }
}
