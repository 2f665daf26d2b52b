//! In-memory [`MetricsProvider`] (C12, SPEC_FULL ambient stack): a
//! `DashMap` of atomic counters. No export format, no histogram —
//! just enough to answer "is this process doing anything" from a
//! health endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use gridbase_domain::ports::metrics::MetricsProvider;

#[derive(Default)]
pub struct InMemoryMetricsProvider {
    counters: DashMap<String, AtomicU64>,
}

impl InMemoryMetricsProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsProvider for InMemoryMetricsProvider {
    fn increment(&self, counter: &str) {
        self.counters
            .entry(counter.to_owned())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    async fn snapshot(&self) -> Vec<(String, u64)> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn increment_accumulates_per_counter() {
        let metrics = InMemoryMetricsProvider::new();
        metrics.increment("ops_applied");
        metrics.increment("ops_applied");
        metrics.increment("connections_opened");

        let snapshot = metrics.snapshot().await;
        let ops = snapshot
            .iter()
            .find(|(name, _)| name == "ops_applied")
            .map(|(_, count)| *count);
        assert_eq!(ops, Some(2));
    }
}
