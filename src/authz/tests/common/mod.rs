//! Shared fixtures for authorization integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use tokengate_authz::{
    CacheConfig, CachedValue, InMemoryAllowlistStore, PolicySet, ResultCache, RuleFactory,
};
use tokengate_chain::testing::MockProvider;
use tokengate_chain::{Address, BlockchainProvider};

pub const USDC: &str = "0xA0b86991c6218b36c1d19d4a2e9eB0cE3606eB48";
pub const BAYC: &str = "0xBC4CA0EdA7647A8aB7C2061c2E118A18a936f13D";
pub const ALICE: &str = "0xabcdef0000000000000000000000000000000001";
pub const BOB: &str = "0x0000000000000000000000000000000000000b0b";

static INIT: Once = Once::new();

/// Route engine logs to the test writer; `RUST_LOG` controls the level
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

pub fn scopes(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn new_cache() -> Arc<ResultCache<CachedValue>> {
    Arc::new(ResultCache::<CachedValue>::new(CacheConfig::default()))
}

/// Factory wired to `provider`, a fresh cache, and `allowlists`
pub fn factory_with(
    provider: Arc<dyn BlockchainProvider>,
    allowlists: Arc<InMemoryAllowlistStore>,
) -> RuleFactory {
    RuleFactory::new(1)
        .with_chain(provider, new_cache())
        .with_allowlists(allowlists)
}

pub fn factory(provider: Arc<MockProvider>) -> RuleFactory {
    factory_with(provider, Arc::new(InMemoryAllowlistStore::new()))
}

/// The `/api/vip` policy: `admin` scope AND at least 1000 USDC (6 decimals)
pub fn vip_policy_json() -> String {
    format!(
        r#"{{"policies": [{{
            "path": "/api/vip",
            "method": "GET",
            "logic": "AND",
            "rules": [
                {{"type": "has_scope", "params": {{"scope": "admin"}}}},
                {{"type": "erc20_min_balance",
                  "params": {{"token": "{USDC}", "chainId": 1, "minimum": "1000000000"}}}}
            ]
        }}]}}"#
    )
}

pub fn vip_policies(factory: &RuleFactory) -> PolicySet {
    PolicySet::from_json(&vip_policy_json(), factory).unwrap()
}
