//! Allowlist lookup contract consumed by `in_allowlist` rules

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use tokengate_chain::RequestContext;

/// Membership lookup against externally managed address allowlists
///
/// Errors are opaque to the engine: any `Err` is recorded and the rule
/// denies.
#[async_trait]
pub trait AllowlistStore: Send + Sync {
    /// Whether `address` (lowercase hex) is a member of `allowlist_id`
    async fn check_address(
        &self,
        ctx: &RequestContext,
        allowlist_id: &str,
        address: &str,
    ) -> anyhow::Result<bool>;
}

/// In-memory allowlist store
///
/// Unknown allowlists report "not a member" rather than an error.
#[derive(Debug, Default)]
pub struct InMemoryAllowlistStore {
    lists: RwLock<HashMap<String, HashSet<String>>>,
}

impl InMemoryAllowlistStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address to a list, creating the list if needed
    pub fn insert(&self, allowlist_id: impl Into<String>, address: impl AsRef<str>) {
        self.lists
            .write()
            .entry(allowlist_id.into())
            .or_default()
            .insert(address.as_ref().to_lowercase());
    }

    /// Remove an address; returns whether it was present
    pub fn remove(&self, allowlist_id: &str, address: &str) -> bool {
        self.lists
            .write()
            .get_mut(allowlist_id)
            .map(|members| members.remove(&address.to_lowercase()))
            .unwrap_or(false)
    }

    /// Number of members in `allowlist_id`
    pub fn len(&self, allowlist_id: &str) -> usize {
        self.lists
            .read()
            .get(allowlist_id)
            .map(HashSet::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl AllowlistStore for InMemoryAllowlistStore {
    async fn check_address(
        &self,
        _ctx: &RequestContext,
        allowlist_id: &str,
        address: &str,
    ) -> anyhow::Result<bool> {
        let lists = self.lists.read();
        Ok(lists
            .get(allowlist_id)
            .map(|members| members.contains(&address.to_lowercase()))
            .unwrap_or(false))
    }
}
