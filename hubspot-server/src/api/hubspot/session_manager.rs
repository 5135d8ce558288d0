//! Authorization state and credential lifecycle on top of the shared cache

use crate::api::hubspot::{
    errors::HubSpotError,
    hubspot_client::HubSpotClient,
    models::{credentials_key, state_key, unix_now, AuthorizationState, CallbackParams, Credentials},
};
use crate::cache::{Cache, CacheBackend};
use log::{error, info, warn};

/// Drives the authorize, callback and credential refresh phases.
///
/// Holds no state of its own: the cache is the only shared mutable resource,
/// so one instance per request is fine.
#[derive(Clone)]
pub struct SessionManager {
    cache: Cache,
    client: HubSpotClient,
}

impl SessionManager {
    pub fn new(cache: Cache, client: HubSpotClient) -> Self {
        Self { cache, client }
    }

    pub fn client(&self) -> &HubSpotClient {
        &self.client
    }

    /// Issue a fresh state for the user, replacing any pending one, and
    /// return the consent page URL carrying it.
    pub async fn begin_authorization(
        &self,
        user_id: &str,
        org_id: &str,
    ) -> Result<String, HubSpotError> {
        if user_id.is_empty() || org_id.is_empty() {
            return Err(HubSpotError::InvalidRequest(
                "user_id and org_id are required".to_string(),
            ));
        }

        let encoded = AuthorizationState::new(user_id, org_id).encode()?;
        self.cache
            .set(
                &state_key(org_id, user_id),
                &encoded,
                self.client.config().state_ttl(),
            )
            .await?;

        let url = self
            .client
            .authorization_url(&encoded)
            .map_err(|e| HubSpotError::Serialization(format!("authorization URL: {e}")))?;

        info!(
            "Started HubSpot authorization for user {} in org {}",
            user_id, org_id
        );
        Ok(url.into())
    }

    /// Verify the callback state, exchange the code and persist the
    /// credentials. The pending state is deleted only after the credentials
    /// were written, and is kept when the exchange fails.
    pub async fn complete_authorization(
        &self,
        params: &CallbackParams,
    ) -> Result<AuthorizationState, HubSpotError> {
        if let Some(error) = params.error.as_deref().filter(|e| !e.is_empty()) {
            let description = params.error_description.as_deref().unwrap_or(error);
            warn!("HubSpot reported an authorization error: {}", error);
            return Err(HubSpotError::InvalidRequest(description.to_string()));
        }

        let (code, encoded) = match (params.code.as_deref(), params.state.as_deref()) {
            (Some(code), Some(state)) if !code.is_empty() && !state.is_empty() => (code, state),
            _ => {
                warn!("Rejected HubSpot callback without code or state");
                return Err(HubSpotError::InvalidRequest(
                    "Missing code or state.".to_string(),
                ));
            }
        };

        let state = AuthorizationState::decode(encoded)?;
        let key = state_key(&state.org_id, &state.user_id);

        match self.cache.get(&key).await? {
            None => {
                warn!(
                    "No pending HubSpot authorization for user {} in org {}",
                    state.user_id, state.org_id
                );
                return Err(HubSpotError::StateExpired);
            }
            Some(stored) if stored != encoded => {
                warn!(
                    "HubSpot state mismatch for user {} in org {}",
                    state.user_id, state.org_id
                );
                return Err(HubSpotError::StateMismatch);
            }
            Some(_) => {}
        }

        let credentials = self.client.exchange_code(code).await?;
        self.save_credentials(&credentials_key(&state.org_id, &state.user_id), credentials)
            .await?;

        // Credentials are already safe, a leftover state just expires
        if let Err(e) = self.cache.delete(&key).await {
            warn!("Failed to delete consumed HubSpot state: {}", e);
        }

        info!(
            "Connected HubSpot for user {} in org {}",
            state.user_id, state.org_id
        );
        Ok(state)
    }

    /// Stamp the absolute expiry and store the credentials with the long TTL
    pub async fn save_credentials(
        &self,
        key: &str,
        mut credentials: Credentials,
    ) -> Result<Credentials, HubSpotError> {
        credentials.stamp_expiry(unix_now());
        self.store(key, &credentials).await?;
        Ok(credentials)
    }

    /// Load the stored credentials of a user, refreshing them first when they
    /// are about to expire.
    pub async fn load_credentials(
        &self,
        user_id: &str,
        org_id: &str,
    ) -> Result<Credentials, HubSpotError> {
        let key = credentials_key(org_id, user_id);
        let raw = self
            .cache
            .get(&key)
            .await?
            .ok_or(HubSpotError::NotConnected)?;

        let credentials: Credentials = serde_json::from_str(&raw).map_err(|e| {
            error!("Stored HubSpot credentials under {} are unreadable: {}", key, e);
            HubSpotError::CorruptedCredentials(e.to_string())
        })?;

        self.refresh_if_needed(&key, credentials).await
    }

    /// Refresh the access token when it is unknown or within the refresh
    /// margin, then write the merged credentials back.
    ///
    /// A failed refresh leaves the stored credentials untouched.
    pub async fn refresh_if_needed(
        &self,
        key: &str,
        mut credentials: Credentials,
    ) -> Result<Credentials, HubSpotError> {
        let now = unix_now();
        if !credentials.needs_refresh(now) {
            return Ok(credentials);
        }

        let refresh_token = credentials
            .refresh_token()
            .ok_or(HubSpotError::ReauthRequired)?
            .to_string();

        let refreshed = self.client.refresh_token(&refresh_token).await?;
        credentials.overlay(refreshed, unix_now());
        self.store(key, &credentials).await?;

        info!("Refreshed HubSpot access token for {}", key);
        Ok(credentials)
    }

    async fn store(&self, key: &str, credentials: &Credentials) -> Result<(), HubSpotError> {
        let payload = serde_json::to_string(credentials)
            .map_err(|e| HubSpotError::Serialization(format!("credentials: {e}")))?;
        self.cache
            .set(key, &payload, self.client.config().credentials_ttl())
            .await
            .map_err(|e| {
                error!("Failed to store HubSpot credentials: {}", e);
                HubSpotError::from(e)
            })
    }
}
