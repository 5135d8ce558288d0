pub(crate) use crate::config::cache::{CacheConfig, CacheStore};
pub(crate) use crate::config::hubspot::HubSpotConfig;
use confique::Config;

pub mod cache;
pub mod hubspot;

/// Optional configuration file, read from the working directory when present
const CONFIG_FILE: &str = "hubspot-server.toml";

/// Main configuration structure for the HubSpot integration server
#[derive(Debug, Config, Clone)]
pub struct ServerConfig {
    /// The port the server will listen to (default: 8000)
    #[config(env = "CONNECTOR_PORT", default = 8000)]
    pub port: u16,

    /// Cache configuration
    #[config(nested)]
    pub cache: CacheConfig,

    /// HubSpot OAuth application and API configuration
    #[config(nested)]
    pub hubspot: HubSpotConfig,
}

impl ServerConfig {
    /// Loads the configuration from environment variables, then the optional
    /// config file, then the built-in defaults
    pub fn new() -> Result<Self, confique::Error> {
        Self::builder().env().file(CONFIG_FILE).load()
    }

    #[cfg(test)]
    pub fn for_test_with_mocks(hubspot_mock: &wiremock::MockServer) -> Self {
        Self {
            port: 0, // Let the OS choose a port
            cache: CacheConfig {
                store: CacheStore::InMemory,
                memory_capacity: 16,
                redis_url: String::new(),
            },
            hubspot: HubSpotConfig::for_test_with_mock(hubspot_mock),
        }
    }
}
