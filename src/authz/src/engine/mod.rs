//! Policy manager
//!
//! Matches a request route against the loaded policies and evaluates each
//! matching policy's rules under its AND/OR logic.
//!
//! ```text
//! (path, method) → PolicySet::matching → per policy: rules (concurrent) → AND/OR
//!                                                       ↓                      ↓
//!                                               [ResultCache]           Decision + Metrics
//! ```
//!
//! Rules of one policy run concurrently. As soon as the policy's outcome is
//! determined (a denial under AND, an allow under OR) the remaining
//! evaluations are dropped and their context is cancelled. The boolean
//! result is always the one sequential evaluation would produce; cache writes
//! already made by dropped evaluations are kept.

pub mod config;
pub mod decision;
pub mod metrics;

pub use config::EngineConfig;
pub use decision::{Decision, PolicyEffect, RuleResult};
pub use metrics::{EngineMetrics, MetricsCollector};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use parking_lot::RwLock;
use tokengate_chain::RequestContext;
use tracing::{debug, info, warn};

use crate::error::AuthzError;
use crate::policy::{Logic, Policy, PolicySet};
use crate::rules::fail_closed;
use crate::types::Claims;

/// Outcome of one policy
#[derive(Debug)]
struct PolicyVerdict {
    allowed: bool,
    results: Vec<RuleResult>,
    /// Rules dropped by short-circuit
    skipped: usize,
}

/// Owns the loaded policies and produces decisions
pub struct PolicyManager {
    /// Current snapshot; replaced wholesale on reload
    policies: RwLock<Arc<PolicySet>>,

    default_decision: PolicyEffect,

    metrics: Arc<MetricsCollector>,
}

impl PolicyManager {
    /// Manager denying unmatched routes
    pub fn new(policies: PolicySet) -> Self {
        Self {
            policies: RwLock::new(Arc::new(policies)),
            default_decision: PolicyEffect::Deny,
            metrics: Arc::new(MetricsCollector::new()),
        }
    }

    /// Decision applied when no policy matches
    pub fn with_default_decision(mut self, effect: PolicyEffect) -> Self {
        self.default_decision = effect;
        self
    }

    /// Manager using the configured default decision
    pub fn from_config(config: &EngineConfig, policies: PolicySet) -> Self {
        Self::new(policies).with_default_decision(config.default_decision)
    }

    /// Replace the policy set
    ///
    /// Evaluations already running keep the snapshot they started with.
    pub fn reload(&self, policies: PolicySet) {
        let count = policies.len();
        *self.policies.write() = Arc::new(policies);
        info!(policies = count, "policy set reloaded");
    }

    /// Current policy snapshot
    pub fn policies(&self) -> Arc<PolicySet> {
        self.policies.read().clone()
    }

    /// Decision for unmatched routes
    pub fn default_decision(&self) -> PolicyEffect {
        self.default_decision
    }

    /// Current metrics snapshot
    pub fn metrics(&self) -> EngineMetrics {
        self.metrics.snapshot()
    }

    /// Shared collector, for exporters
    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// Evaluate a request for `address` holding `scopes`
    pub async fn evaluate(
        &self,
        ctx: &RequestContext,
        path: &str,
        method: &str,
        address: &str,
        scopes: &[String],
    ) -> Decision {
        let claims = Claims::new(address, scopes.iter().cloned());
        self.evaluate_claims(ctx, path, method, &claims).await
    }

    /// Evaluate a request with already-built claims
    ///
    /// Every matching policy must allow, in declared order; the first denying
    /// policy ends the evaluation. With no matching policy the default
    /// decision applies.
    pub async fn evaluate_claims(
        &self,
        ctx: &RequestContext,
        path: &str,
        method: &str,
        claims: &Claims,
    ) -> Decision {
        let started = Instant::now();
        let snapshot = self.policies();
        let matched: Vec<&Policy> = snapshot.matching(path, method).collect();

        if matched.is_empty() {
            let reason = format!("no policy matches {method} {path}; default {}", self.default_decision);
            let decision = if self.default_decision.is_allow() {
                Decision::allow(reason)
            } else {
                Decision::deny(reason)
            };
            debug!(path, method, allowed = decision.allowed, "default decision applied");
            self.metrics.record_decision(decision.allowed, true, 0, started.elapsed());
            return decision;
        }

        let matched_names: Vec<String> = matched.iter().map(|p| p.name()).collect();
        let mut rule_results = Vec::new();
        let mut denial: Option<String> = None;

        for policy in &matched {
            let verdict = self.evaluate_policy(ctx, policy, claims).await;
            let failed = verdict.results.iter().any(|r| r.error.is_some());
            rule_results.extend(verdict.results);

            debug!(
                policy = %policy.name(),
                logic = %policy.logic(),
                allowed = verdict.allowed,
                skipped = verdict.skipped,
                "policy evaluated"
            );

            if !verdict.allowed {
                denial = Some(if failed {
                    format!("policy {} denied: rule evaluation failed", policy.name())
                } else {
                    format!("policy {} denied", policy.name())
                });
                break;
            }
        }

        let rule_errors = rule_results.iter().filter(|r| r.error.is_some()).count();
        let decision = match denial {
            Some(reason) => Decision::deny(reason),
            None => Decision::allow(format!("all {} matching policies allowed", matched.len())),
        }
        .with_matched_policies(matched_names)
        .with_rule_results(rule_results);

        let elapsed = started.elapsed();
        self.metrics.record_decision(decision.allowed, false, rule_errors, elapsed);

        info!(
            decision_id = %decision.id,
            path,
            method,
            allowed = decision.allowed,
            rule_errors,
            latency_us = elapsed.as_micros() as u64,
            "authorization decision"
        );
        decision
    }

    async fn evaluate_policy(&self, ctx: &RequestContext, policy: &Policy, claims: &Claims) -> PolicyVerdict {
        let name = policy.name();
        let logic = policy.logic();

        if policy.rules().is_empty() {
            warn!(policy = %name, "policy has no rules, denying");
            return PolicyVerdict {
                allowed: false,
                results: Vec::new(),
                skipped: 0,
            };
        }

        let child = ctx.child();
        let mut pending: FuturesUnordered<_> = policy
            .rules()
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let child = &child;
                async move {
                    let descriptor = rule.descriptor();
                    let outcome = match AssertUnwindSafe(rule.evaluate(child, claims)).catch_unwind().await {
                        Ok(outcome) => outcome,
                        Err(_) => fail_closed(
                            &descriptor,
                            Err(AuthzError::Internal("rule evaluation panicked".to_string())),
                        ),
                    };
                    (index, descriptor, outcome)
                }
            })
            .collect();

        // AND starts allowed and looks for a denial; OR the reverse
        let mut allowed = logic == Logic::And;
        let mut results = Vec::with_capacity(pending.len());

        while let Some((index, descriptor, outcome)) = pending.next().await {
            let rule_allowed = outcome.allowed;
            results.push(RuleResult::new(name.as_str(), index, descriptor, outcome));

            match logic {
                Logic::And if !rule_allowed => {
                    allowed = false;
                    break;
                }
                Logic::Or if rule_allowed => {
                    allowed = true;
                    break;
                }
                _ => {}
            }
        }

        let skipped = pending.len();
        drop(pending);
        child.cancel();

        if skipped > 0 {
            debug!(policy = %name, skipped, "short-circuited remaining rules");
        }

        results.sort_by_key(|r| r.index);
        PolicyVerdict {
            allowed,
            results,
            skipped,
        }
    }
}

impl std::fmt::Debug for PolicyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyManager")
            .field("policies", &self.policies.read().len())
            .field("default_decision", &self.default_decision)
            .finish()
    }
}
