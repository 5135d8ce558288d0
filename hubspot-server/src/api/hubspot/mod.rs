//! HubSpot CRM integration
//!
//! Implements the OAuth 2.0 authorization-code flow on behalf of a
//! (user, organization) pair and exposes the connected account's contacts,
//! companies and deals as normalized items.
//!
//! ## Flow
//! 1. `GET /authorize` issues a random state, stores it in the cache for a
//!    short time and returns the HubSpot consent page URL.
//! 2. `GET /oauth2callback` verifies the state against the cache, exchanges
//!    the code for tokens and stores the credentials for a long time.
//! 3. `GET /items` loads the credentials, refreshes them when they are about
//!    to expire and fetches the CRM objects page by page.

pub mod errors;
pub mod handlers;
pub mod hubspot_client;
pub mod models;
pub mod normalize;
pub mod session_manager;

use crate::state::AppState;
use utoipa_axum::{router::OpenApiRouter, routes};

/// Creates the HubSpot integration routes
pub fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(handlers::authorize))
        .routes(routes!(handlers::oauth2callback))
        .routes(routes!(handlers::items))
}
