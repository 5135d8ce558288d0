use super::{CacheBackend, CacheError};
use async_trait::async_trait;
use log::error;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use std::time::Duration;

/// Redis-backed store shared by every replica of the service
#[derive(Clone)]
pub struct RedisCache {
    conn_manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis and verify the connection with a `PING`
    pub async fn new(redis_url: &str) -> Result<Self, String> {
        let client =
            Client::open(redis_url).map_err(|err| format!("Invalid Redis URL: {err}"))?;
        let conn_manager = ConnectionManager::new(client)
            .await
            .map_err(|err| format!("Failed to create Redis connection manager: {err}"))?;

        let cache = Self { conn_manager };
        cache
            .ping()
            .await
            .map_err(|err| format!("Failed to ping Redis: {err}"))?;
        Ok(cache)
    }

    async fn ping(&self) -> redis::RedisResult<String> {
        let mut conn = self.conn_manager.clone();
        redis::cmd("PING").query_async(&mut conn).await
    }
}

/// Log a failed command and convert it into a [`CacheError`]
fn command_failed(command: &str, key: &str, err: RedisError) -> CacheError {
    error!("Redis {} failed for key {}: {}", command, key, err);
    CacheError::Redis(err.to_string())
}

#[async_trait]
impl CacheBackend for RedisCache {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        // SET EX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, ttl_secs)
            .await
            .map_err(|err| command_failed("SET", key, err))
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn_manager.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|err| command_failed("GET", key, err))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn_manager.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|err| command_failed("DEL", key, err))
    }

    async fn health_check(&self) -> Result<(), String> {
        self.ping()
            .await
            .map(|_| ())
            .map_err(|err| format!("Redis health check failed: {err}"))
    }
}
