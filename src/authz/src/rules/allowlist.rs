use std::fmt;
use std::sync::Arc;

use tokengate_chain::RequestContext;

use crate::allowlist::AllowlistStore;
use crate::error::{AuthzError, Result};
use crate::types::Claims;

/// Allows when the claims address is on an external allowlist
#[derive(Clone)]
pub struct AllowlistRule {
    allowlist_id: String,
    store: Arc<dyn AllowlistStore>,
}

impl AllowlistRule {
    /// Create a rule over a non-empty allowlist id
    pub fn new(allowlist_id: impl Into<String>, store: Arc<dyn AllowlistStore>) -> Result<Self> {
        let allowlist_id = allowlist_id.into();
        if allowlist_id.is_empty() {
            return Err(AuthzError::Validation(
                "in_allowlist requires a non-empty allowlistId".to_string(),
            ));
        }
        Ok(Self { allowlist_id, store })
    }

    /// Allowlist consulted
    pub fn allowlist_id(&self) -> &str {
        &self.allowlist_id
    }

    /// Allow when the subject is a member
    pub async fn evaluate(&self, ctx: &RequestContext, claims: &Claims) -> Result<bool> {
        if claims.address.is_empty() {
            return Ok(false);
        }

        self.store
            .check_address(ctx, &self.allowlist_id, &claims.address)
            .await
            .map_err(|e| AuthzError::AllowlistLookup(format!("{e:#}")))
    }
}

impl fmt::Debug for AllowlistRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllowlistRule")
            .field("allowlist_id", &self.allowlist_id)
            .finish_non_exhaustive()
    }
}
