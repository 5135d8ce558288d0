use confique::Config;
use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;

/// Specifies which cache store implementation to use
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStore {
    InMemory,
    Redis,
}

#[derive(Debug, Error)]
#[error("unknown cache store '{0}', expected 'in-memory' or 'redis'")]
pub struct UnknownCacheStore(String);

impl FromStr for CacheStore {
    type Err = UnknownCacheStore;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "in-memory" => Ok(Self::InMemory),
            "redis" => Ok(Self::Redis),
            other => Err(UnknownCacheStore(other.to_string())),
        }
    }
}

fn parse_cache_store(value: &str) -> Result<CacheStore, UnknownCacheStore> {
    value.parse()
}

/// Configuration for the state and credentials store
#[derive(Debug, Config, Clone)]
pub struct CacheConfig {
    /// Cache store type: "in-memory" (default) or "redis"
    #[config(
        env = "CONNECTOR_CACHE_STORE",
        parse_env = parse_cache_store,
        default = "in-memory"
    )]
    pub store: CacheStore,

    /// In-memory cache capacity in MiB (default: 64 MiB)
    #[config(env = "CONNECTOR_CACHE_MEMORY_CAPACITY", default = 64)]
    pub memory_capacity: usize,

    /// Redis connection string, required when the store is "redis"
    #[config(env = "CONNECTOR_CACHE_REDIS_URL", default = "")]
    pub redis_url: String,
}
