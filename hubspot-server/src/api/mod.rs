pub(crate) mod health;
pub(crate) mod hubspot;

use crate::state::AppState;
use utoipa_axum::router::OpenApiRouter;

/// Combines all API routes into a single router
pub(super) fn router() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .merge(health::router())
        .nest("/integrations/hubspot", hubspot::router())
}
