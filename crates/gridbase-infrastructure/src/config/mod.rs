//! Layered configuration: `config/{env}.toml` plus `GRIDBASE_`-prefixed
//! environment variable overrides, resolved with `figment` the way the
//! teacher's `ConfigLoader` resolves its YAML files (spec §2's ambient
//! Configuration addition).

use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use gridbase_domain::error::{Error, Result};

/// Postgres connection and pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "defaults::db_max_connections")]
    pub max_connections: u32,
    #[serde(default = "defaults::db_min_connections")]
    pub min_connections: u32,
    #[serde(default = "defaults::db_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Redis connection used by the pub/sub broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// In-process cache sizing (spec §2's ambient caching addition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "defaults::cache_max_capacity")]
    pub max_capacity: u64,
    #[serde(default = "defaults::cache_ttl_secs")]
    pub ttl_secs: u64,
}

/// WebSocket server bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::server_bind_addr")]
    pub bind_addr: String,
}

/// Sizing for the calculation engine's `spawn_blocking`-backed worker
/// pool (SPEC_FULL §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationConfig {
    #[serde(default = "defaults::calculation_max_concurrency")]
    pub max_concurrency: usize,
}

/// Link Engine deployment policy: whether a VARCHAR overflow on a link
/// title auto-widens the column to TEXT (SPEC_FULL §4.5's resolved Open
/// Question).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEngineConfig {
    #[serde(default = "defaults::auto_widen_varchar")]
    pub auto_widen_varchar: bool,
}

/// Root application configuration, assembled by [`load`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub calculation: CalculationConfig,
    #[serde(default)]
    pub link_engine: LinkEngineConfig,
}

mod defaults {
    pub fn db_max_connections() -> u32 {
        20
    }
    pub fn db_min_connections() -> u32 {
        2
    }
    pub fn db_connect_timeout_secs() -> u64 {
        10
    }
    pub fn cache_max_capacity() -> u64 {
        50_000
    }
    pub fn cache_ttl_secs() -> u64 {
        300
    }
    pub fn server_bind_addr() -> String {
        "0.0.0.0:8080".to_owned()
    }
    pub fn calculation_max_concurrency() -> usize {
        std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
    }
    pub fn auto_widen_varchar() -> bool {
        true
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: defaults::cache_max_capacity(),
            ttl_secs: defaults::cache_ttl_secs(),
        }
    }
}

impl Default for CalculationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::calculation_max_concurrency(),
        }
    }
}

impl Default for LinkEngineConfig {
    fn default() -> Self {
        Self {
            auto_widen_varchar: defaults::auto_widen_varchar(),
        }
    }
}

/// Resolve `GRIDBASE_ENV` (default `development`), then layer
/// `config/default.toml` < `config/{env}.toml` < `GRIDBASE_`-prefixed
/// environment variables, highest priority last.
///
/// # Errors
///
/// Returns [`Error::Config`] if no layer supplies a required field or a
/// value fails to parse into its target type.
pub fn load() -> Result<AppConfig> {
    let env_name = std::env::var("GRIDBASE_ENV").unwrap_or_else(|_| "development".to_owned());

    let figment = Figment::new()
        .merge(Toml::file("config/default.toml"))
        .merge(Toml::file(format!("config/{env_name}.toml")))
        .merge(Env::prefixed("GRIDBASE_").split("__"));

    let config: AppConfig = figment
        .extract()
        .map_err(|err| Error::Config { message: err.to_string() })?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.database.url.is_empty() {
        return Err(Error::Config { message: "database.url must not be empty".into() });
    }
    if config.database.min_connections > config.database.max_connections {
        return Err(Error::Config {
            message: "database.min_connections must not exceed max_connections".into(),
        });
    }
    if config.cache.ttl_secs == 0 {
        return Err(Error::Config { message: "cache.ttl_secs must be positive".into() });
    }
    if config.calculation.max_concurrency == 0 {
        return Err(Error::Config {
            message: "calculation.max_concurrency must be positive".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn loads_from_toml_with_defaults() {
        Jail::expect_with(|jail| {
            jail.create_dir("config")?;
            jail.create_file(
                "config/development.toml",
                r#"
                [server]
                bind_addr = "127.0.0.1:9000"

                [database]
                url = "postgres://localhost/gridbase_dev"

                [redis]
                url = "redis://localhost:6379"
                "#,
            )?;
            let config = load().expect("config should load");
            assert_eq!(config.server.bind_addr, "127.0.0.1:9000");
            assert_eq!(config.cache.ttl_secs, defaults::cache_ttl_secs());
            Ok(())
        });
    }

    #[test]
    fn rejects_empty_database_url() {
        let config = AppConfig {
            server: ServerConfig { bind_addr: "0.0.0.0:8080".into() },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_secs: 5,
            },
            redis: RedisConfig { url: "redis://localhost".into() },
            cache: CacheConfig::default(),
            calculation: CalculationConfig::default(),
            link_engine: LinkEngineConfig::default(),
        };
        assert!(validate(&config).is_err());
    }
}
