//! # Tokengate Authorization Engine
//!
//! Route-level authorization policies composed of access rules, some of
//! which verify on-chain token holdings.
//!
//! ## Features
//!
//! - **Policies** matched by path pattern and HTTP method, combining their
//!   rules with `AND` or `OR`
//! - **Rules**: required scope, allowlist membership, ERC20 minimum balance,
//!   ERC721 ownership
//! - **Fail-closed**: every rule error is a denial, recorded in the decision
//! - **Concurrent evaluation** with short-circuit and cancellation
//! - **TTL cache** shared by all blockchain rules
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tokengate_authz::{EngineConfig, PolicyManager, PolicySet, RequestContext};
//!
//! # async fn run() -> tokengate_authz::Result<()> {
//! let config = EngineConfig::from_env()?;
//! let factory = config.rule_factory(None)?;
//!
//! let policies = PolicySet::from_json(
//!     r#"{"policies": [{
//!         "path": "/api/vip", "method": "GET", "logic": "AND",
//!         "rules": [
//!             {"type": "has_scope", "params": {"scope": "admin"}},
//!             {"type": "erc20_min_balance", "params": {
//!                 "token": "0xA0b86991c6218b36c1d19d4a2e9eB0cE3606eB48",
//!                 "minimum": "1000000000"}}
//!         ]
//!     }]}"#,
//!     &factory,
//! )?;
//!
//! let manager = Arc::new(PolicyManager::from_config(&config, policies));
//! let decision = manager
//!     .evaluate(
//!         &RequestContext::new(),
//!         "/api/vip",
//!         "GET",
//!         "0xabcdef0000000000000000000000000000000001",
//!         &["admin".to_string()],
//!     )
//!     .await;
//!
//! if decision.allowed {
//!     println!("Access granted!");
//! }
//! # Ok(())
//! # }
//! ```

pub mod allowlist;
pub mod cache;
pub mod engine;
pub mod error;
pub mod policy;
pub mod rules;
pub mod types;

pub use allowlist::{AllowlistStore, InMemoryAllowlistStore};
pub use cache::{CacheConfig, CacheStats, CachedValue, ResultCache};
pub use engine::{Decision, EngineConfig, EngineMetrics, PolicyEffect, PolicyManager, RuleResult};
pub use error::{AuthzError, ErrorKind, Result};
pub use policy::{Logic, PathPattern, Policy, PolicyConfig, PolicySet};
pub use rules::{Rule, RuleConfig, RuleDescriptor, RuleFactory, RuleKind};
pub use types::Claims;

pub use tokengate_chain::{BlockchainProvider, RequestContext, RpcConfig};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
