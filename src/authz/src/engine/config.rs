//! Engine configuration
//!
//! Environment variables:
//! - `TOKENGATE_RPC_URL` - primary JSON-RPC endpoint (required)
//! - `TOKENGATE_RPC_FALLBACK_URL` - fallback endpoint
//! - `TOKENGATE_CHAIN_ID` - chain served by the endpoints (default: 1)
//! - `TOKENGATE_RPC_TIMEOUT_MS` - per-attempt timeout (default: 5000)
//! - `TOKENGATE_CACHE_TTL_SECS` - chain result TTL (default: 60)
//! - `TOKENGATE_CACHE_MAX_ENTRIES` - cache bound (default: 10000)
//! - `TOKENGATE_CACHE_SWEEP_SECS` - background sweep period (default: off)
//! - `TOKENGATE_DEFAULT_DECISION` - `allow` or `deny` when no policy matches (default: deny)

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokengate_chain::{RpcConfig, RpcProvider};
use tracing::{debug, info};

use super::decision::PolicyEffect;
use crate::allowlist::AllowlistStore;
use crate::cache::{CacheConfig, CachedValue, ResultCache};
use crate::error::{AuthzError, Result};
use crate::rules::RuleFactory;

const DEFAULT_CHAIN_ID: u64 = 1;

/// Policy engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub rpc: RpcConfig,

    pub cache: CacheConfig,

    /// Decision when no policy matches the route
    pub default_decision: PolicyEffect,
}

impl EngineConfig {
    /// Defaults for everything but the RPC endpoints
    pub fn new(rpc: RpcConfig) -> Self {
        Self {
            rpc,
            cache: CacheConfig::default(),
            default_decision: PolicyEffect::Deny,
        }
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which returns the value of a variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let primary_url = get("TOKENGATE_RPC_URL")
            .ok_or_else(|| AuthzError::Config("TOKENGATE_RPC_URL is required".to_string()))?;
        let chain_id = parse_var(&get, "TOKENGATE_CHAIN_ID")?.unwrap_or(DEFAULT_CHAIN_ID);

        let mut rpc = RpcConfig::new(chain_id, primary_url);
        if let Some(fallback) = get("TOKENGATE_RPC_FALLBACK_URL") {
            rpc = rpc.with_fallback(fallback);
        }
        if let Some(ms) = parse_var::<u64>(&get, "TOKENGATE_RPC_TIMEOUT_MS")? {
            rpc = rpc.with_timeout(Duration::from_millis(ms));
        }

        let mut cache = CacheConfig::default();
        if let Some(secs) = parse_var::<u64>(&get, "TOKENGATE_CACHE_TTL_SECS")? {
            cache.ttl = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var(&get, "TOKENGATE_CACHE_MAX_ENTRIES")? {
            cache.max_entries = max;
        }
        cache.sweep_interval = parse_var::<u64>(&get, "TOKENGATE_CACHE_SWEEP_SECS")?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let default_decision = parse_var(&get, "TOKENGATE_DEFAULT_DECISION")?.unwrap_or_default();

        let config = Self {
            rpc,
            cache,
            default_decision,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject zero timeouts, TTLs and capacities
    pub fn validate(&self) -> Result<()> {
        if self.rpc.timeout.is_zero() {
            return Err(AuthzError::Config("rpc timeout must be greater than zero".to_string()));
        }
        if self.cache.ttl.is_zero() {
            return Err(AuthzError::Config("cache ttl must be greater than zero".to_string()));
        }
        if self.cache.max_entries == 0 {
            return Err(AuthzError::Config("cache max entries must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Build the RPC provider and shared cache, and wire them into a rule factory
    ///
    /// Starts the cache sweeper when a sweep interval is configured and a
    /// Tokio runtime is available.
    pub fn rule_factory(&self, allowlists: Option<Arc<dyn AllowlistStore>>) -> Result<RuleFactory> {
        self.validate()?;

        let provider = RpcProvider::new(self.rpc.clone())
            .map_err(|e| AuthzError::Config(format!("rpc provider: {e}")))?;
        let cache = Arc::new(ResultCache::<CachedValue>::new(self.cache.clone()));

        if let Some(interval) = self.cache.sweep_interval {
            if tokio::runtime::Handle::try_current().is_ok() {
                cache.spawn_sweeper(interval);
                debug!(?interval, "started cache sweeper");
            }
        }

        info!(
            chain_id = self.rpc.chain_id,
            fallback = self.rpc.fallback_url.is_some(),
            timeout_ms = self.rpc.timeout.as_millis() as u64,
            cache_ttl_secs = self.cache.ttl.as_secs(),
            "configured blockchain rules"
        );

        let factory = RuleFactory::new(self.rpc.chain_id).with_chain(Arc::new(provider), cache);
        Ok(match allowlists {
            Some(store) => factory.with_allowlists(store),
            None => factory,
        })
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| AuthzError::Config(format!("{key}={raw:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[("TOKENGATE_RPC_URL", "http://localhost:8545")])).unwrap();

        assert_eq!(config.rpc.chain_id, 1);
        assert_eq!(config.rpc.timeout, Duration::from_secs(5));
        assert!(config.rpc.fallback_url.is_none());
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.max_entries, 10_000);
        assert!(config.cache.sweep_interval.is_none());
        assert_eq!(config.default_decision, PolicyEffect::Deny);
    }

    #[test]
    fn test_all_variables() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("TOKENGATE_RPC_URL", "http://primary:8545"),
            ("TOKENGATE_RPC_FALLBACK_URL", "http://fallback:8545"),
            ("TOKENGATE_CHAIN_ID", "137"),
            ("TOKENGATE_RPC_TIMEOUT_MS", "250"),
            ("TOKENGATE_CACHE_TTL_SECS", "30"),
            ("TOKENGATE_CACHE_MAX_ENTRIES", "500"),
            ("TOKENGATE_CACHE_SWEEP_SECS", "10"),
            ("TOKENGATE_DEFAULT_DECISION", "allow"),
        ]))
        .unwrap();

        assert_eq!(config.rpc.chain_id, 137);
        assert_eq!(config.rpc.fallback_url.as_deref(), Some("http://fallback:8545"));
        assert_eq!(config.rpc.timeout, Duration::from_millis(250));
        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.cache.sweep_interval, Some(Duration::from_secs(10)));
        assert_eq!(config.default_decision, PolicyEffect::Allow);
    }

    #[test]
    fn test_missing_url() {
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[])),
            Err(AuthzError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("TOKENGATE_RPC_URL", "  ")])),
            Err(AuthzError::Config(_))
        ));
    }

    #[test]
    fn test_unparsable_values() {
        for (key, value) in [
            ("TOKENGATE_CHAIN_ID", "mainnet"),
            ("TOKENGATE_RPC_TIMEOUT_MS", "-1"),
            ("TOKENGATE_CACHE_MAX_ENTRIES", "lots"),
            ("TOKENGATE_DEFAULT_DECISION", "maybe"),
            ("TOKENGATE_CACHE_TTL_SECS", "0"),
        ] {
            let result = EngineConfig::from_lookup(lookup(&[
                ("TOKENGATE_RPC_URL", "http://localhost:8545"),
                (key, value),
            ]));
            assert!(matches!(result, Err(AuthzError::Config(_))), "{key}={value}");
        }
    }

    #[test]
    fn test_rule_factory_rejects_bad_url() {
        let config = EngineConfig::new(RpcConfig::new(1, "not a url"));
        assert!(matches!(config.rule_factory(None), Err(AuthzError::Config(_))));
    }

    #[tokio::test]
    async fn test_rule_factory_wires_cache() {
        let mut config = EngineConfig::new(RpcConfig::new(5, "http://localhost:8545"));
        config.cache.sweep_interval = Some(Duration::from_secs(60));

        let factory = config.rule_factory(None).unwrap();
        assert_eq!(factory.default_chain_id(), 5);
        assert!(factory.cache().is_some());
    }
}
