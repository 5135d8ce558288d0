use crate::cache::CacheError;
use crate::errors::ApiError;
use http::StatusCode;
use thiserror::Error;

/// Failures of the HubSpot OAuth flow and CRM fetch
#[derive(Debug, Error)]
pub enum HubSpotError {
    /// Callback arrived with a vendor error or without code/state
    #[error("{0}")]
    InvalidRequest(String),
    #[error("Invalid state payload: {0}")]
    InvalidState(String),
    #[error("State not found or expired. Please restart authorization.")]
    StateExpired,
    #[error("State does not match.")]
    StateMismatch,
    #[error("Token exchange failed: {body}")]
    TokenExchangeFailed { status: StatusCode, body: String },
    #[error("Refresh token failed: {body}")]
    TokenRefreshFailed { status: StatusCode, body: String },
    #[error("No credentials found. Please connect HubSpot first.")]
    NotConnected,
    #[error("No refresh_token available, re-auth required.")]
    ReauthRequired,
    #[error("Stored credentials are corrupted: {0}")]
    CorruptedCredentials(String),
    #[error("Error fetching {url}: {detail}")]
    UpstreamFetchFailed { url: String, detail: String },
    #[error("Missing access_token in credentials.")]
    MissingAccessToken,
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("HubSpot request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid HubSpot response: {0}")]
    InvalidVendorResponse(String),
    #[error("Failed to serialize {0}")]
    Serialization(String),
}

impl From<HubSpotError> for ApiError {
    fn from(err: HubSpotError) -> Self {
        let detail = err.to_string();
        match err {
            HubSpotError::InvalidRequest(_)
            | HubSpotError::InvalidState(_)
            | HubSpotError::StateExpired
            | HubSpotError::StateMismatch
            | HubSpotError::NotConnected
            | HubSpotError::MissingAccessToken => ApiError::bad_request(detail),
            HubSpotError::ReauthRequired => ApiError::unauthorized(detail),
            HubSpotError::TokenExchangeFailed { status, .. }
            | HubSpotError::TokenRefreshFailed { status, .. } => ApiError::upstream(detail, status),
            HubSpotError::Transport(_) | HubSpotError::InvalidVendorResponse(_) => {
                ApiError::bad_gateway(detail)
            }
            HubSpotError::CorruptedCredentials(_)
            | HubSpotError::UpstreamFetchFailed { .. }
            | HubSpotError::Cache(_)
            | HubSpotError::Serialization(_) => ApiError::internal(detail),
        }
    }
}
