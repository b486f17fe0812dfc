//! Core request types

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Verified identity claims for one request
///
/// Produced by the identity layer and consumed read-only. The address is
/// normalized to lowercase on construction; it is *not* validated here, each
/// rule that needs an address validates it itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Lowercase hex address (e.g., "0xabc...")
    pub address: String,

    /// Granted scopes, matched exactly and case-sensitively
    #[serde(default)]
    pub scopes: HashSet<String>,
}

impl Claims {
    /// Normalize `address` and collect `scopes`
    pub fn new<I, S>(address: impl AsRef<str>, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            address: address.as_ref().trim().to_lowercase(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// Claims with no address and no scopes; every rule denies them
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Exact, case-sensitive scope membership
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }
}
