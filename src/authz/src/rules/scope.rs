use crate::error::{AuthzError, Result};
use crate::types::Claims;

/// Allows when the claims carry an exact scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRule {
    required_scope: String,
}

impl ScopeRule {
    /// Create a rule over a non-empty scope
    pub fn new(required_scope: impl Into<String>) -> Result<Self> {
        let required_scope = required_scope.into();
        if required_scope.is_empty() {
            return Err(AuthzError::Validation("has_scope requires a non-empty scope".to_string()));
        }
        Ok(Self { required_scope })
    }

    /// Scope the subject must hold
    pub fn required_scope(&self) -> &str {
        &self.required_scope
    }

    /// Pure membership check; no I/O
    pub fn evaluate(&self, claims: &Claims) -> Result<bool> {
        Ok(claims.has_scope(&self.required_scope))
    }
}
