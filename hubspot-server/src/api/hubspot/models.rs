//! HubSpot integration data models and request/response structures

use crate::api::hubspot::errors::HubSpotError;
use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use utoipa::{IntoParams, ToSchema};

/// Credentials are refreshed this many seconds before they actually expire
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Entropy of the anti-CSRF nonce, in bytes (256 bits)
const NONCE_BYTES: usize = 32;

/// URL-safe base64 that never emits padding but tolerates it when decoding
const STATE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Current UNIX time in seconds
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Cache key of the pending authorization state of a user in an organization
pub fn state_key(org_id: &str, user_id: &str) -> String {
    format!("state:{org_id}:{user_id}")
}

/// Cache key of the stored credentials of a user in an organization
pub fn credentials_key(org_id: &str, user_id: &str) -> String {
    format!("credentials:{org_id}:{user_id}")
}

/// Anti-CSRF state carried through the HubSpot consent redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationState {
    /// Random nonce, URL-safe base64 of 32 bytes
    pub nonce: String,
    pub user_id: String,
    pub org_id: String,
}

/// Lenient mirror of [`AuthorizationState`] so that missing fields can be
/// reported as an invalid state instead of a parse failure
#[derive(Deserialize)]
struct RawAuthorizationState {
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    org_id: Option<String>,
}

impl AuthorizationState {
    /// Create a state bound to the given user and organization with a fresh nonce
    pub fn new(user_id: &str, org_id: &str) -> Self {
        let mut nonce = [0u8; NONCE_BYTES];
        rand::thread_rng().fill(&mut nonce[..]);

        Self {
            nonce: STATE_ENGINE.encode(nonce),
            user_id: user_id.to_string(),
            org_id: org_id.to_string(),
        }
    }

    /// Encode as URL-safe base64 (no padding) of the JSON payload
    pub fn encode(&self) -> Result<String, HubSpotError> {
        let payload = serde_json::to_vec(self)
            .map_err(|e| HubSpotError::Serialization(format!("authorization state: {e}")))?;
        Ok(STATE_ENGINE.encode(payload))
    }

    /// Decode a state received in the callback query string
    pub fn decode(encoded: &str) -> Result<Self, HubSpotError> {
        let payload = STATE_ENGINE
            .decode(encoded.trim())
            .map_err(|e| HubSpotError::InvalidState(format!("not valid base64: {e}")))?;
        let raw: RawAuthorizationState = serde_json::from_slice(&payload)
            .map_err(|e| HubSpotError::InvalidState(format!("not valid JSON: {e}")))?;

        match (
            non_empty(raw.nonce),
            non_empty(raw.user_id),
            non_empty(raw.org_id),
        ) {
            (Some(nonce), Some(user_id), Some(org_id)) => Ok(Self {
                nonce,
                user_id,
                org_id,
            }),
            _ => Err(HubSpotError::InvalidState("Incomplete state.".to_string())),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Token bundle returned by the HubSpot token endpoint and stored per user.
///
/// Fields HubSpot returns beyond the ones modelled here are kept in `extra`
/// and written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token in seconds, as reported by HubSpot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    /// Absolute expiry (UNIX seconds) derived from `expires_in`, `None` when unknown
    #[serde(default)]
    pub expires_at: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Credentials {
    /// Recompute `expires_at` from `expires_in` relative to `now`
    pub fn stamp_expiry(&mut self, now: i64) {
        self.expires_at = expiry_from(self.expires_in, now);
    }

    /// Whether the access token must be refreshed before use.
    ///
    /// An unknown expiry always triggers a refresh attempt.
    pub fn needs_refresh(&self, now: i64) -> bool {
        match self.expires_at {
            None => true,
            Some(expires_at) => now + REFRESH_MARGIN_SECS >= expires_at,
        }
    }

    /// Overlay the fields of a refresh response, keeping any field the
    /// response omits, and recompute the expiry from the response
    pub fn overlay(&mut self, refreshed: Credentials, now: i64) {
        if refreshed.access_token.is_some() {
            self.access_token = refreshed.access_token;
        }
        if refreshed.refresh_token.is_some() {
            self.refresh_token = refreshed.refresh_token;
        }
        if refreshed.expires_in.is_some() {
            self.expires_in = refreshed.expires_in;
        }
        self.extra.extend(refreshed.extra);
        self.expires_at = expiry_from(refreshed.expires_in, now);
    }

    /// The access token, if present and non-empty
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|t| !t.is_empty())
    }

    /// The refresh token, if present and non-empty
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }
}

fn expiry_from(expires_in: Option<i64>, now: i64) -> Option<i64> {
    match expires_in {
        Some(seconds) if seconds > 0 => Some(now.saturating_add(seconds)),
        _ => None,
    }
}

/// HubSpot CRM object kind of a normalized item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Contact,
    Company,
    Deal,
    Other,
}

/// A HubSpot record in the common integration item shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NormalizedItem {
    /// HubSpot record id
    pub id: String,
    /// Record kind
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Display name derived from the record properties
    pub name: String,
    /// Creation timestamp as supplied by HubSpot
    pub creation_time: Option<String>,
    /// Last modification timestamp as supplied by HubSpot
    pub last_modified_time: Option<String>,
    /// Always null: HubSpot CRM records are fetched flat
    pub parent_id: Option<String>,
    /// Raw HubSpot properties of the record
    pub raw_properties: BTreeMap<String, String>,
}

/// One page of a CRM v3 list endpoint
#[derive(Debug, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub results: Option<Vec<Value>>,
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub next: Option<PagingNext>,
}

#[derive(Debug, Deserialize)]
pub struct PagingNext {
    #[serde(default)]
    pub link: Option<String>,
}

impl ListPage {
    /// Link to the next page, used verbatim
    pub fn next_link(&self) -> Option<&str> {
        self.paging
            .as_ref()
            .and_then(|paging| paging.next.as_ref())
            .and_then(|next| next.link.as_deref())
            .filter(|link| !link.is_empty())
    }
}

/// Query identifying the user and organization a connection belongs to
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ConnectionQuery {
    /// User identifier
    pub user_id: String,
    /// Organization identifier
    pub org_id: String,
}

/// Response of the authorize endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizeResponse {
    /// HubSpot consent page URL to open in a popup
    pub authorize_url: String,
}

/// Query parameters HubSpot appends to the redirect URI
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    /// Authorization code
    pub code: Option<String>,
    /// Encoded state issued by the authorize endpoint
    pub state: Option<String>,
    /// Error code reported by HubSpot when consent failed
    pub error: Option<String>,
    /// Human-readable error reported by HubSpot
    pub error_description: Option<String>,
}

/// Response of the items endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ItemsResponse {
    pub items: Vec<NormalizedItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_round_trip() {
        let state = AuthorizationState::new("user-1", "org-1");
        let encoded = state.encode().unwrap();
        assert!(!encoded.contains('='));
        assert!(!encoded.contains('+') && !encoded.contains('/'));
        assert_eq!(AuthorizationState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn test_state_round_trip_with_unicode_ids() {
        let state = AuthorizationState {
            nonce: "n".to_string(),
            user_id: "usuário ✓".to_string(),
            org_id: "org/with?chars&".to_string(),
        };
        let encoded = state.encode().unwrap();
        assert_eq!(AuthorizationState::decode(&encoded).unwrap(), state);
    }

    #[test]
    fn test_nonce_has_256_bits() {
        let state = AuthorizationState::new("u", "o");
        let bytes = STATE_ENGINE.decode(&state.nonce).unwrap();
        assert_eq!(bytes.len(), 32);
        assert_ne!(state.nonce, AuthorizationState::new("u", "o").nonce);
    }

    #[test]
    fn test_decode_accepts_padded_state() {
        let payload = br#"{"nonce":"abc","user_id":"u","org_id":"o"}"#;
        let padded = base64::engine::general_purpose::URL_SAFE.encode(payload);
        let state = AuthorizationState::decode(&padded).unwrap();
        assert_eq!(state.user_id, "u");
        assert_eq!(state.org_id, "o");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            AuthorizationState::decode("%%%not-base64%%%"),
            Err(HubSpotError::InvalidState(_))
        ));
        let not_json = STATE_ENGINE.encode(b"plain text");
        assert!(matches!(
            AuthorizationState::decode(&not_json),
            Err(HubSpotError::InvalidState(_))
        ));
    }

    #[test]
    fn test_decode_rejects_incomplete_state() {
        let missing_org = STATE_ENGINE.encode(br#"{"nonce":"abc","user_id":"u"}"#);
        assert!(matches!(
            AuthorizationState::decode(&missing_org),
            Err(HubSpotError::InvalidState(_))
        ));
        let empty_nonce = STATE_ENGINE.encode(br#"{"nonce":"","user_id":"u","org_id":"o"}"#);
        assert!(matches!(
            AuthorizationState::decode(&empty_nonce),
            Err(HubSpotError::InvalidState(_))
        ));
    }

    #[test]
    fn test_stamp_expiry() {
        let mut credentials = Credentials {
            access_token: Some("a".to_string()),
            expires_in: Some(1800),
            ..Default::default()
        };
        credentials.stamp_expiry(1_000);
        assert_eq!(credentials.expires_at, Some(2_800));

        credentials.expires_in = Some(0);
        credentials.stamp_expiry(1_000);
        assert_eq!(credentials.expires_at, None);

        credentials.expires_in = None;
        credentials.stamp_expiry(1_000);
        assert_eq!(credentials.expires_at, None);
    }

    #[test]
    fn test_needs_refresh() {
        let now = 10_000;
        let mut credentials = Credentials::default();
        assert!(credentials.needs_refresh(now), "unknown expiry refreshes");

        credentials.expires_at = Some(now - 1);
        assert!(credentials.needs_refresh(now));

        credentials.expires_at = Some(now + REFRESH_MARGIN_SECS);
        assert!(credentials.needs_refresh(now), "margin is inclusive");

        credentials.expires_at = Some(now + REFRESH_MARGIN_SECS + 1);
        assert!(!credentials.needs_refresh(now));

        credentials.expires_at = Some(now + 3600);
        assert!(!credentials.needs_refresh(now));
    }

    #[test]
    fn test_overlay_keeps_absent_fields() {
        let mut credentials: Credentials = serde_json::from_value(json!({
            "access_token": "old-access",
            "refresh_token": "old-refresh",
            "expires_in": 1800,
            "expires_at": 100,
            "token_type": "bearer",
            "hub_id": 42
        }))
        .unwrap();
        let refreshed: Credentials = serde_json::from_value(json!({
            "access_token": "new-access",
            "expires_in": 3600,
            "token_type": "Bearer"
        }))
        .unwrap();

        credentials.overlay(refreshed, 5_000);

        assert_eq!(credentials.access_token(), Some("new-access"));
        assert_eq!(credentials.refresh_token(), Some("old-refresh"));
        assert_eq!(credentials.expires_in, Some(3600));
        assert_eq!(credentials.expires_at, Some(8_600));
        assert_eq!(credentials.extra["token_type"], json!("Bearer"));
        assert_eq!(credentials.extra["hub_id"], json!(42));
    }

    #[test]
    fn test_huge_expires_in_saturates() {
        let mut credentials = Credentials {
            access_token: Some("a".to_string()),
            expires_in: Some(i64::MAX),
            ..Default::default()
        };
        credentials.stamp_expiry(unix_now());
        assert_eq!(credentials.expires_at, Some(i64::MAX));
        assert!(!credentials.needs_refresh(unix_now()));
    }

    #[test]
    fn test_overlay_without_expires_in_clears_expiry() {
        let mut credentials = Credentials {
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
            expires_in: Some(1800),
            expires_at: Some(9_999),
            ..Default::default()
        };
        credentials.overlay(
            Credentials {
                access_token: Some("b".to_string()),
                ..Default::default()
            },
            1_000,
        );
        assert_eq!(credentials.expires_at, None);
        assert_eq!(credentials.refresh_token(), Some("r"));
    }

    #[test]
    fn test_credentials_preserve_vendor_fields() {
        let raw = json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 1800,
            "expires_at": 123,
            "token_type": "bearer"
        });
        let credentials: Credentials = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&credentials).unwrap(), raw);
    }

    #[test]
    fn test_null_expires_at_is_serialized() {
        let credentials = Credentials {
            access_token: Some("a".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&credentials).unwrap();
        assert_eq!(value, json!({"access_token": "a", "expires_at": null}));
    }

    #[test]
    fn test_list_page_next_link() {
        let page: ListPage = serde_json::from_value(json!({
            "results": [{"id": "1"}],
            "paging": {"next": {"after": "1", "link": "https://api.hubapi.com/next"}}
        }))
        .unwrap();
        assert_eq!(page.next_link(), Some("https://api.hubapi.com/next"));

        let last: ListPage = serde_json::from_value(json!({"results": null})).unwrap();
        assert!(last.results.is_none());
        assert_eq!(last.next_link(), None);
    }

    #[test]
    fn test_item_serialization() {
        let item = NormalizedItem {
            id: "7".to_string(),
            item_type: ItemType::Deal,
            name: "Big deal".to_string(),
            creation_time: Some("2024-01-01T00:00:00Z".to_string()),
            last_modified_time: None,
            parent_id: None,
            raw_properties: BTreeMap::from([("dealname".to_string(), "Big deal".to_string())]),
        };
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "id": "7",
                "type": "deal",
                "name": "Big deal",
                "creation_time": "2024-01-01T00:00:00Z",
                "last_modified_time": null,
                "parent_id": null,
                "raw_properties": {"dealname": "Big deal"}
            })
        );
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(state_key("org", "user"), "state:org:user");
        assert_eq!(credentials_key("org", "user"), "credentials:org:user");
    }
}
