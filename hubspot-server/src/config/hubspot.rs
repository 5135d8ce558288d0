//! HubSpot OAuth application and API configuration

use confique::Config;
use std::time::Duration;

/// Client id used when `HUBSPOT_CLIENT_ID` is unset. Local development only.
pub const PLACEHOLDER_CLIENT_ID: &str = "local-dev-client-id";
/// Client secret used when `HUBSPOT_CLIENT_SECRET` is unset. Local development only.
pub const PLACEHOLDER_CLIENT_SECRET: &str = "local-dev-client-secret";

/// HubSpot OAuth 2.0 configuration
#[derive(Debug, Config, Clone)]
pub struct HubSpotConfig {
    /// OAuth application client id
    #[config(env = "HUBSPOT_CLIENT_ID", default = "local-dev-client-id")]
    pub client_id: String,

    /// OAuth application client secret
    #[config(env = "HUBSPOT_CLIENT_SECRET", default = "local-dev-client-secret")]
    pub client_secret: String,

    /// Redirect URI registered with the HubSpot application
    #[config(
        env = "HUBSPOT_REDIRECT_URI",
        default = "http://localhost:8000/integrations/hubspot/oauth2callback"
    )]
    pub redirect_uri: String,

    /// HubSpot consent page (default: https://app.hubspot.com/oauth/authorize)
    #[config(
        env = "HUBSPOT_AUTHORIZE_URL",
        default = "https://app.hubspot.com/oauth/authorize"
    )]
    pub authorize_url: String,

    /// Base URL for the token and CRM endpoints (default: https://api.hubapi.com)
    #[config(env = "HUBSPOT_API_URL", default = "https://api.hubapi.com")]
    pub api_url: String,

    /// Timeout for every HubSpot request in seconds (default: 30)
    #[config(env = "HUBSPOT_REQUEST_TIMEOUT", default = 30)]
    pub request_timeout: u64,

    /// Lifetime of a pending authorization state in seconds (default: 15 minutes)
    #[config(env = "HUBSPOT_STATE_TTL", default = 900)]
    pub state_ttl: u64,

    /// Lifetime of stored credentials in seconds (default: 30 days)
    #[config(env = "HUBSPOT_CREDENTIALS_TTL", default = 2592000)]
    pub credentials_ttl: u64,

    /// Upper bound of records fetched per object type (default: 100)
    #[config(env = "HUBSPOT_MAX_ITEMS_PER_TYPE", default = 100)]
    pub max_items_per_type: usize,
}

impl HubSpotConfig {
    /// Token endpoint for both the authorization code and refresh token grants
    pub fn token_url(&self) -> String {
        self.api_url_for("/oauth/v1/token")
    }

    /// CRM v3 list endpoint for the given object type (e.g. "contacts")
    pub fn objects_url(&self, object: &str) -> String {
        self.api_url_for(format!("/crm/v3/objects/{object}"))
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl)
    }

    pub fn credentials_ttl(&self) -> Duration {
        Duration::from_secs(self.credentials_ttl)
    }

    /// Whether the built-in development credentials are still in use
    pub fn uses_placeholder_credentials(&self) -> bool {
        self.client_id == PLACEHOLDER_CLIENT_ID || self.client_secret == PLACEHOLDER_CLIENT_SECRET
    }

    fn api_url_for<S: Into<String>>(&self, path: S) -> String {
        let path = path.into();
        let base = self.api_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    #[cfg(test)]
    pub fn for_test_with_mock(hubspot_mock: &wiremock::MockServer) -> Self {
        Self {
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            redirect_uri: "http://localhost:8000/integrations/hubspot/oauth2callback".to_string(),
            authorize_url: format!("{}/oauth/authorize", hubspot_mock.uri()),
            api_url: hubspot_mock.uri(),
            request_timeout: 5,
            state_ttl: 900,
            credentials_ttl: 3600,
            max_items_per_type: 100,
        }
    }
}
