//! Prometheus-style metrics for the policy manager

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Engine metrics snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineMetrics {
    /// Total number of evaluations
    pub total_requests: u64,

    pub allowed_decisions: u64,

    pub denied_decisions: u64,

    /// Evaluations that matched no policy
    pub default_decisions: u64,

    /// Rule evaluations that ended in an error
    pub rule_errors: u64,

    /// Latency percentiles over the retained samples
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,

    pub avg_latency_ms: f64,
}

impl EngineMetrics {
    /// Fraction of decisions that allowed
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    metrics: EngineMetrics,
    latency_samples: VecDeque<f64>,
}

/// Thread-safe metrics collector
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

impl MetricsCollector {
    /// Collector with no recorded decisions
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished evaluation
    pub fn record_decision(&self, allowed: bool, default_applied: bool, rule_errors: usize, latency: Duration) {
        let mut inner = self.inner.lock();
        let metrics = &mut inner.metrics;

        metrics.total_requests += 1;
        if allowed {
            metrics.allowed_decisions += 1;
        } else {
            metrics.denied_decisions += 1;
        }
        if default_applied {
            metrics.default_decisions += 1;
        }
        metrics.rule_errors += rule_errors as u64;

        inner.latency_samples.push_back(latency.as_secs_f64() * 1000.0);
        if inner.latency_samples.len() > MAX_LATENCY_SAMPLES {
            inner.latency_samples.pop_front();
        }
    }

    /// Current snapshot with latency statistics computed
    pub fn snapshot(&self) -> EngineMetrics {
        let inner = self.inner.lock();
        let mut metrics = inner.metrics.clone();

        if !inner.latency_samples.is_empty() {
            let mut sorted: Vec<f64> = inner.latency_samples.iter().copied().collect();
            sorted.sort_by(f64::total_cmp);

            metrics.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
            metrics.latency_p50_ms = percentile(&sorted, 0.50);
            metrics.latency_p99_ms = percentile(&sorted, 0.99);
        }
        metrics
    }

    /// Clear all counters and latency samples
    pub fn reset(&self) {
        *self.inner.lock() = Inner::default();
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let metrics = self.snapshot();

        format!(
            r#"# HELP tokengate_requests_total Total number of authorization evaluations
# TYPE tokengate_requests_total counter
tokengate_requests_total {}

# HELP tokengate_allowed_total Number of allowed decisions
# TYPE tokengate_allowed_total counter
tokengate_allowed_total {}

# HELP tokengate_denied_total Number of denied decisions
# TYPE tokengate_denied_total counter
tokengate_denied_total {}

# HELP tokengate_default_decisions_total Evaluations with no matching policy
# TYPE tokengate_default_decisions_total counter
tokengate_default_decisions_total {}

# HELP tokengate_rule_errors_total Rule evaluations that failed closed
# TYPE tokengate_rule_errors_total counter
tokengate_rule_errors_total {}

# HELP tokengate_latency_seconds Evaluation latency percentiles
# TYPE tokengate_latency_seconds summary
tokengate_latency_seconds{{quantile="0.5"}} {}
tokengate_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.total_requests,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.default_decisions,
            metrics.rule_errors,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * p) as usize;
    sorted[idx.min(sorted.len() - 1)]
}
