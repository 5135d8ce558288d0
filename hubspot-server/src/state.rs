use crate::{
    api::hubspot::{hubspot_client::HubSpotClient, session_manager::SessionManager},
    cache::{Cache, CacheBackend},
    config::ServerConfig,
};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub cache: Arc<Cache>,
    pub hubspot_client: HubSpotClient,
}

impl AppState {
    fn create_http_client(timeout: u64) -> Result<Client, reqwest::Error> {
        Client::builder()
            .timeout(Duration::from_secs(timeout))
            .connect_timeout(Duration::from_secs(5))
            // Configure connection pool
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
    }

    /// Build the application state around an already initialized cache
    pub fn with_existing_cache(config: &ServerConfig, cache: Cache) -> Result<Self, reqwest::Error> {
        let http_client = Self::create_http_client(config.hubspot.request_timeout)?;
        Ok(Self {
            config: Arc::new(config.clone()),
            cache: Arc::new(cache),
            hubspot_client: HubSpotClient::new(http_client, Arc::new(config.hubspot.clone())),
        })
    }

    /// A session manager sharing this state's cache and HTTP client
    pub fn session_manager(&self) -> SessionManager {
        SessionManager::new(self.cache.as_ref().clone(), self.hubspot_client.clone())
    }

    /// Check if all components are healthy
    pub async fn health_check(&self) -> Result<(), String> {
        self.cache.health_check().await
    }

    #[cfg(test)]
    pub fn for_testing(config: &ServerConfig) -> Self {
        let cache = crate::cache::memory::InMemoryCache::new(config.cache.memory_capacity)
            .expect("Failed to create test cache");
        Self::with_existing_cache(config, Cache::InMemory(cache))
            .expect("Failed to create test state")
    }
}
