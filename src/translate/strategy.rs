//! Self-tuning choice of batching strategy per language pair.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStrategy {
    /// Join texts with a sentinel, one remote call, split the result
    Delimiter,
    /// One remote call per unique text
    Individual,
    /// Serve from cache only, never call the provider
    CachedOnly,
}

impl BatchStrategy {
    /// Score used before any attempt has been recorded for a language pair.
    pub fn prior_score(self) -> f64 {
        match self {
            Self::Delimiter => 0.6,
            Self::Individual => 0.9,
            Self::CachedOnly => 0.0,
        }
    }
}

impl fmt::Display for BatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delimiter => write!(f, "delimiter"),
            Self::Individual => write!(f, "individual"),
            Self::CachedOnly => write!(f, "cached_only"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
    pub mismatch_count: u64,
    /// Cumulative average, in seconds
    pub avg_latency: f64,
}

impl StrategyMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        self.successes as f64 / self.attempts as f64
    }

    pub fn reliability_score(&self) -> f64 {
        let mismatch_penalty = (self.mismatch_count as f64 * 0.1).min(0.3);
        let latency_penalty = (self.avg_latency / 30.0).min(0.2);
        (self.success_rate() - mismatch_penalty - latency_penalty).max(0.0)
    }

    fn record(&mut self, success: bool, latency: Duration, had_mismatch: bool) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        if had_mismatch {
            self.mismatch_count += 1;
        }
        let n = self.attempts as f64;
        self.avg_latency = (self.avg_latency * (n - 1.0) + latency.as_secs_f64()) / n;
    }
}

/// Flattened view of one metrics entry for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyReport {
    pub source_lang: String,
    pub target_lang: String,
    pub strategy: BatchStrategy,
    #[serde(flatten)]
    pub metrics: StrategyMetrics,
    pub success_rate: f64,
    pub reliability_score: f64,
}

type MetricsKey = (String, String, BatchStrategy);

#[derive(Default)]
pub struct StrategySelector {
    metrics: Mutex<HashMap<MetricsKey, StrategyMetrics>>,
}

impl StrategySelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_attempt(
        &self,
        source: &str,
        target: &str,
        strategy: BatchStrategy,
        success: bool,
        latency: Duration,
        had_mismatch: bool,
    ) {
        let key = (source.to_string(), target.to_string(), strategy);
        self.metrics
            .lock()
            .entry(key)
            .or_default()
            .record(success, latency, had_mismatch);
    }

    pub fn get_best_strategy(&self, source: &str, target: &str, unique_count: usize) -> BatchStrategy {
        if unique_count == 1 {
            return BatchStrategy::Individual;
        }

        let candidates = [BatchStrategy::Delimiter, BatchStrategy::Individual];

        let metrics = self.metrics.lock();
        let mut best = candidates[0];
        let mut best_score = f64::MIN;
        let mut scores = Vec::with_capacity(candidates.len());

        for strategy in candidates {
            let key = (source.to_string(), target.to_string(), strategy);
            let score = metrics
                .get(&key)
                .map_or_else(|| strategy.prior_score(), StrategyMetrics::reliability_score);
            scores.push((strategy, score));
            if score > best_score {
                best = strategy;
                best_score = score;
            }
        }

        debug!(
            "Strategy selection for {}->{} ({} segments): {} (scores: {:?})",
            source, target, unique_count, best, scores
        );

        best
    }

    pub fn metrics_for(&self, source: &str, target: &str, strategy: BatchStrategy) -> Option<StrategyMetrics> {
        let key = (source.to_string(), target.to_string(), strategy);
        self.metrics.lock().get(&key).cloned()
    }

    pub fn reports(&self) -> Vec<StrategyReport> {
        let metrics = self.metrics.lock();
        let mut reports: Vec<StrategyReport> = metrics
            .iter()
            .map(|((source, target, strategy), m)| StrategyReport {
                source_lang: source.clone(),
                target_lang: target.clone(),
                strategy: *strategy,
                metrics: m.clone(),
                success_rate: m.success_rate(),
                reliability_score: m.reliability_score(),
            })
            .collect();
        reports.sort_by(|a, b| {
            (&a.source_lang, &a.target_lang, a.strategy.to_string())
                .cmp(&(&b.source_lang, &b.target_lang, b.strategy.to_string()))
        });
        reports
    }
}
