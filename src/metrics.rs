//! Evaluation metrics and history
//!
//! Passive observer of every evaluation. Counters are atomics and may
//! undercount under a rare race; that is tolerated. History is a
//! per-flag FIFO ring.

use crate::engine::{EvaluationResult, EvaluationSource};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Usage metrics for one flag, or aggregated across all flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagMetrics {
    /// Total evaluations observed
    pub total_evaluations: u64,

    /// Evaluation counts keyed by result source
    pub by_source: HashMap<String, u64>,

    /// Evaluation counts keyed by context environment
    pub by_environment: HashMap<String, u64>,

    /// Mean evaluation latency in microseconds
    pub avg_latency_us: f64,

    /// Lower-bound count of distinct requester identities seen
    pub distinct_identities: u64,
}

struct FlagStats {
    total: AtomicU64,
    by_source: DashMap<EvaluationSource, AtomicU64>,
    by_environment: DashMap<String, AtomicU64>,
    total_latency_us: AtomicU64,
    identities: RwLock<HashSet<String>>,
    history: RwLock<VecDeque<EvaluationResult>>,
}

impl FlagStats {
    fn new(history_capacity: usize) -> Self {
        Self {
            total: AtomicU64::new(0),
            by_source: DashMap::new(),
            by_environment: DashMap::new(),
            total_latency_us: AtomicU64::new(0),
            identities: RwLock::new(HashSet::new()),
            history: RwLock::new(VecDeque::with_capacity(history_capacity)),
        }
    }

    fn snapshot(&self) -> FlagMetrics {
        let total = self.total.load(Ordering::Relaxed);
        let by_source = self
            .by_source
            .iter()
            .map(|entry| (entry.key().as_str().to_string(), entry.value().load(Ordering::Relaxed)))
            .collect();
        let by_environment = self
            .by_environment
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();

        FlagMetrics {
            total_evaluations: total,
            by_source,
            by_environment,
            avg_latency_us: if total > 0 {
                self.total_latency_us.load(Ordering::Relaxed) as f64 / total as f64
            } else {
                0.0
            },
            distinct_identities: self.identities.read().len() as u64,
        }
    }
}

/// Collector observing every evaluation the engine performs
pub struct EvaluationCollector {
    stats: DashMap<String, Arc<FlagStats>>,
    history_capacity: usize,
    max_tracked_identities: usize,
}

impl EvaluationCollector {
    pub fn new(history_capacity: usize, max_tracked_identities: usize) -> Self {
        Self {
            stats: DashMap::new(),
            history_capacity,
            max_tracked_identities,
        }
    }

    /// Record one evaluation result and its measured latency.
    pub fn record(&self, result: &EvaluationResult, latency: Duration) {
        let stats = self
            .stats
            .entry(result.flag_key.clone())
            .or_insert_with(|| Arc::new(FlagStats::new(self.history_capacity)))
            .clone();

        stats.total.fetch_add(1, Ordering::Relaxed);
        stats
            .by_source
            .entry(result.source)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        stats
            .by_environment
            .entry(result.context.environment.clone())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
        stats
            .total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);

        if let Some(user_id) = &result.context.user_id {
            let mut identities = stats.identities.write();
            // bounded set: counts beyond the cap become a lower bound
            if identities.len() < self.max_tracked_identities || identities.contains(user_id) {
                identities.insert(user_id.clone());
            }
        }

        let mut history = stats.history.write();
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(result.clone());
    }

    /// Metrics for one flag, `None` when nothing has been recorded.
    pub fn metrics(&self, flag_key: &str) -> Option<FlagMetrics> {
        self.stats.get(flag_key).map(|entry| entry.value().snapshot())
    }

    /// Aggregate metrics across every flag: counts summed, breakdowns
    /// merged, latency mean weighted by count. Distinct identities are
    /// summed per flag, so the aggregate is an estimate rather than a
    /// true union count.
    pub fn aggregate(&self) -> FlagMetrics {
        let mut merged = FlagMetrics::default();
        let mut latency_sum = 0.0;

        for entry in self.stats.iter() {
            let snapshot = entry.value().snapshot();
            latency_sum += snapshot.avg_latency_us * snapshot.total_evaluations as f64;
            merged.total_evaluations += snapshot.total_evaluations;
            merged.distinct_identities += snapshot.distinct_identities;
            for (source, count) in snapshot.by_source {
                *merged.by_source.entry(source).or_insert(0) += count;
            }
            for (environment, count) in snapshot.by_environment {
                *merged.by_environment.entry(environment).or_insert(0) += count;
            }
        }

        if merged.total_evaluations > 0 {
            merged.avg_latency_us = latency_sum / merged.total_evaluations as f64;
        }
        merged
    }

    /// The most recent `limit` results for a flag, oldest first.
    pub fn history(&self, flag_key: &str, limit: usize) -> Vec<EvaluationResult> {
        let Some(entry) = self.stats.get(flag_key) else {
            return Vec::new();
        };
        let history = entry.value().history.read();
        let skip = history.len().saturating_sub(limit);
        history.iter().skip(skip).cloned().collect()
    }

    /// Drop all metrics and history for a flag (unregister path).
    pub fn remove(&self, flag_key: &str) {
        self.stats.remove(flag_key);
    }

    pub fn clear(&self) {
        self.stats.clear();
    }
}
