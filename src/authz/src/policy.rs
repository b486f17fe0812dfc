//! Policy definition, route matching, and loading

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AuthzError, Result};
use crate::rules::{Rule, RuleConfig, RuleFactory};

/// How a policy combines its rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    /// Every rule must allow
    #[serde(alias = "and")]
    And,
    /// At least one rule must allow
    #[serde(alias = "or")]
    Or,
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::And => f.write_str("AND"),
            Logic::Or => f.write_str("OR"),
        }
    }
}

/// Request path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `*`: every path
    Any,
    /// Literal path
    Exact(String),
    /// `prefix*`: every path starting with `prefix`
    Prefix(String),
}

impl PathPattern {
    /// Parse `*`, an exact path, or a `prefix*` pattern
    pub fn parse(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(AuthzError::InvalidPolicy("path pattern is empty".to_string()));
        }
        if pattern == "*" {
            return Ok(PathPattern::Any);
        }

        match pattern.strip_suffix('*') {
            Some(prefix) if !prefix.contains('*') => Ok(PathPattern::Prefix(prefix.to_string())),
            Some(_) => Err(AuthzError::InvalidPolicy(format!(
                "path pattern {pattern:?}: '*' is only allowed as the last character"
            ))),
            None if pattern.contains('*') => Err(AuthzError::InvalidPolicy(format!(
                "path pattern {pattern:?}: '*' is only allowed as the last character"
            ))),
            None => Ok(PathPattern::Exact(pattern.to_string())),
        }
    }

    /// Whether `path` falls under this pattern
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Exact(exact) => exact == path,
            PathPattern::Prefix(prefix) => path.starts_with(prefix.as_str()),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Any => f.write_str("*"),
            PathPattern::Exact(exact) => f.write_str(exact),
            PathPattern::Prefix(prefix) => write!(f, "{prefix}*"),
        }
    }
}

/// A loaded, validated policy
#[derive(Debug, Clone)]
pub struct Policy {
    path: PathPattern,
    /// Uppercase method, or `*`
    method: String,
    logic: Logic,
    rules: Vec<Rule>,
    description: Option<String>,
}

impl Policy {
    /// Build a policy; the method is uppercased and `rules` must not be empty
    pub fn new(path: &str, method: &str, logic: Logic, rules: Vec<Rule>) -> Result<Self> {
        let path = PathPattern::parse(path)?;
        let method = method.trim().to_uppercase();

        if method.is_empty() {
            return Err(AuthzError::InvalidPolicy(format!("policy for {path}: method is empty")));
        }
        if rules.is_empty() {
            return Err(AuthzError::InvalidPolicy(format!(
                "policy {method} {path}: at least one rule is required"
            )));
        }

        Ok(Self {
            path,
            method,
            logic,
            rules,
            description: None,
        })
    }

    /// Attach a free-form description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Build from configuration, constructing every rule through `factory`
    pub fn from_config(config: &PolicyConfig, factory: &RuleFactory) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                factory.build(rule).map_err(|e| {
                    AuthzError::InvalidPolicy(format!(
                        "policy {} {}: rule #{index} ({}): {e}",
                        config.method,
                        config.path,
                        rule.kind()
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let policy = Policy::new(&config.path, &config.method, config.logic, rules)?;
        Ok(match &config.description {
            Some(description) => policy.with_description(description.clone()),
            None => policy,
        })
    }

    /// Whether this policy applies to the request route
    pub fn matches(&self, path: &str, method: &str) -> bool {
        (self.method == "*" || self.method.eq_ignore_ascii_case(method)) && self.path.matches(path)
    }

    /// `METHOD path`, used to identify the policy in decisions
    pub fn name(&self) -> String {
        format!("{} {}", self.method, self.path)
    }

    /// Route pattern
    pub fn path(&self) -> &PathPattern {
        &self.path
    }

    /// Uppercased method, or `*`
    pub fn method(&self) -> &str {
        &self.method
    }

    /// How rule outcomes combine
    pub fn logic(&self) -> Logic {
        self.logic
    }

    /// Rules in declared order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Serialized form of a policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub path: String,
    pub method: String,
    pub logic: Logic,
    pub rules: Vec<RuleConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Accepts `{"policies": [...]}` or a bare array
#[derive(Deserialize)]
#[serde(untagged)]
enum PolicyDocument {
    Wrapped { policies: Vec<PolicyConfig> },
    List(Vec<PolicyConfig>),
}

/// Ordered, immutable collection of policies
#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    policies: Vec<Policy>,
}

impl PolicySet {
    /// Wrap policies, keeping their declared order
    pub fn new(policies: Vec<Policy>) -> Self {
        Self { policies }
    }

    /// Set with no policies
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build every policy from its configuration
    pub fn from_configs(configs: &[PolicyConfig], factory: &RuleFactory) -> Result<Self> {
        let policies = configs
            .iter()
            .map(|config| Policy::from_config(config, factory))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(policies))
    }

    /// Parse a JSON policy document and build every rule
    pub fn from_json(json: &str, factory: &RuleFactory) -> Result<Self> {
        let document: PolicyDocument = serde_json::from_str(json)
            .map_err(|e| AuthzError::InvalidPolicy(format!("policy document: {e}")))?;

        let configs = match document {
            PolicyDocument::Wrapped { policies } => policies,
            PolicyDocument::List(policies) => policies,
        };
        Self::from_configs(&configs, factory)
    }

    /// Policies applying to the route, in declared order
    pub fn matching<'a>(&'a self, path: &'a str, method: &'a str) -> impl Iterator<Item = &'a Policy> + 'a {
        self.policies.iter().filter(move |policy| policy.matches(path, method))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Policy> {
        self.policies.iter()
    }

    /// Number of policies
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
