//! Moka-backed [`CacheProvider`] used for Base/Table/Field/View
//! catalog lookups (spec §4.2's cache invalidation rule).

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use gridbase_domain::error::Result;
use gridbase_domain::ports::cache::CacheProvider;

/// Wraps a single `moka::future::Cache<String, String>` keyed by the
/// caller-chosen cache key, storing pre-serialized JSON so the trait
/// stays type-erased and object-safe.
pub struct MokaCacheProvider {
    inner: Cache<String, String>,
}

impl MokaCacheProvider {
    #[must_use]
    pub fn new(max_capacity: u64, default_ttl: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(default_ttl)
            .build();
        Self { inner }
    }
}

#[async_trait]
impl CacheProvider for MokaCacheProvider {
    async fn get_json(&self, key: &str) -> Result<Option<String>> {
        Ok(self.inner.get(key).await)
    }

    async fn set_json(&self, key: &str, value: &str, _ttl: Duration) -> Result<()> {
        // moka's per-entry TTL requires an expiry policy configured at
        // builder time; this cache uses one uniform TTL set in `new`,
        // so a per-call `ttl` narrower than that is not honored.
        self.inner.insert(key.to_owned(), value.to_owned()).await;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.inner.invalidate(key).await;
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        let prefix = prefix.to_owned();
        self.inner.invalidate_entries_if(move |k, _v| k.starts_with(&prefix))
            .map_err(|err| gridbase_domain::error::Error::Cache {
                message: format!("failed to schedule prefix invalidation: {err}"),
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = MokaCacheProvider::new(100, Duration::from_secs(60));
        cache.set_json("field:1", "{\"name\":\"Title\"}", Duration::from_secs(60)).await.unwrap();
        assert_eq!(
            cache.get_json("field:1").await.unwrap(),
            Some("{\"name\":\"Title\"}".to_owned())
        );
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = MokaCacheProvider::new(100, Duration::from_secs(60));
        cache.set_json("k", "v", Duration::from_secs(60)).await.unwrap();
        cache.invalidate("k").await.unwrap();
        assert_eq!(cache.get_json("k").await.unwrap(), None);
    }
}
