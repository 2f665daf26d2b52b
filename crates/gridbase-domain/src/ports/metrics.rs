//! C12 — Metrics/Health port (SPEC_FULL ambient stack addition): thin
//! counters and a liveness snapshot, optional and never consulted by
//! any correctness-bearing path. A deployment with no implementation
//! wired still gets a correct system; it just can't see inside it.

use async_trait::async_trait;

/// Named counters this system increments at its few interesting edges
/// (records written, ops fanned out, connections opened). Intentionally
/// small and open-ended rather than an exhaustive enum, since new
/// counters are cheap to add and nothing downstream matches on the name.
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    /// Increment the named counter by one.
    fn increment(&self, counter: &str);

    /// Point-in-time snapshot of every counter touched so far, for a
    /// health/metrics endpoint to render.
    async fn snapshot(&self) -> Vec<(String, u64)>;
}
