use crate::api::hubspot::{
    errors::HubSpotError,
    models::{AuthorizeResponse, CallbackParams, ConnectionQuery, ItemsResponse},
};
use crate::errors::{ApiError, ErrorDetail};
use crate::openapi::HUBSPOT_TAG;
use crate::state::AppState;
use axum::{
    extract::{Query, State},
    response::{Html, IntoResponse, Response},
    Json,
};
use http::header::CACHE_CONTROL;
use http::{HeaderValue, StatusCode};
use log::{error, info};

const CLOSE_WINDOW_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>HubSpot connected</title></head>
<body>
<p>HubSpot is connected. You can close this window.</p>
<script>window.close();</script>
</body>
</html>"#;

fn no_store(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Start the OAuth flow for a user and return the HubSpot consent page URL
#[utoipa::path(
    get,
    path = "/authorize",
    tag = HUBSPOT_TAG,
    params(ConnectionQuery),
    responses(
        (status = 200, description = "Consent page URL to open in a popup", body = AuthorizeResponse),
        (status = 400, description = "Missing user or organization", body = ErrorDetail),
        (status = 500, description = "Authorization could not be started", body = ErrorDetail)
    )
)]
pub async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<ConnectionQuery>,
) -> Response {
    match state
        .session_manager()
        .begin_authorization(&query.user_id, &query.org_id)
        .await
    {
        Ok(authorize_url) => (StatusCode::OK, Json(AuthorizeResponse { authorize_url })).into_response(),
        Err(err @ HubSpotError::InvalidRequest(_)) => ApiError::from(err).into_response(),
        Err(err) => {
            error!("Failed to start HubSpot authorization: {}", err);
            ApiError::internal(format!("Failed to start authorization: {err}")).into_response()
        }
    }
}

/// Redirect target of the HubSpot consent page
#[utoipa::path(
    get,
    path = "/oauth2callback",
    tag = HUBSPOT_TAG,
    params(CallbackParams),
    responses(
        (status = 200, description = "Connected, the popup can be closed", content_type = "text/html"),
        (status = 400, description = "Invalid, expired or mismatched state", body = ErrorDetail),
        (status = 502, description = "HubSpot could not be reached", body = ErrorDetail)
    )
)]
pub async fn oauth2callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match state.session_manager().complete_authorization(&params).await {
        Ok(_) => no_store(Html(CLOSE_WINDOW_PAGE).into_response()),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// Fetch the user's contacts, companies and deals as normalized items
#[utoipa::path(
    get,
    path = "/items",
    tag = HUBSPOT_TAG,
    params(ConnectionQuery),
    responses(
        (status = 200, description = "Normalized CRM items", body = ItemsResponse),
        (status = 400, description = "HubSpot is not connected", body = ErrorDetail),
        (status = 401, description = "Re-authorization required", body = ErrorDetail),
        (status = 500, description = "Fetching from HubSpot failed", body = ErrorDetail)
    )
)]
pub async fn items(
    State(state): State<AppState>,
    Query(query): Query<ConnectionQuery>,
) -> Response {
    let manager = state.session_manager();
    let result = async {
        let credentials = manager
            .load_credentials(&query.user_id, &query.org_id)
            .await?;
        manager
            .client()
            .get_items(&credentials, state.config.hubspot.max_items_per_type)
            .await
    }
    .await;

    match result {
        Ok(items) => {
            info!(
                "Returning {} HubSpot items for user {} in org {}",
                items.len(),
                query.user_id,
                query.org_id
            );
            no_store((StatusCode::OK, Json(ItemsResponse { items })).into_response())
        }
        Err(err) => {
            error!("Failed to fetch HubSpot items: {}", err);
            ApiError::from(err).into_response()
        }
    }
}
