//! Ambient cache port backing metadata and field lookups (SPEC_FULL
//! ambient stack; concrete impl is moka-based in `gridbase-infrastructure`).

use async_trait::async_trait;

use crate::error::Result;

/// A generic async key/value cache with TTL, used for catalog lookups
/// (Base/Table/Field/View) so hot paths avoid round-tripping to
/// Postgres on every record write. Stores pre-serialized JSON so the
/// trait stays object-safe; callers serialize/deserialize at the call
/// site.
#[async_trait]
pub trait CacheProvider: Send + Sync {
    async fn get_json(&self, key: &str) -> Result<Option<String>>;

    async fn set_json(&self, key: &str, value: &str, ttl: std::time::Duration) -> Result<()>;

    /// Remove `key`, called whenever the metadata store mutates the
    /// row the key was cached from (spec §4.2's cache invalidation
    /// rule).
    async fn invalidate(&self, key: &str) -> Result<()>;

    /// Remove every key starting with `prefix`, used when an entire
    /// table's fields are invalidated at once (e.g. after a batch
    /// field reorder).
    async fn invalidate_prefix(&self, prefix: &str) -> Result<()>;
}
