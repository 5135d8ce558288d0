use utoipa::OpenApi;

pub(crate) const HEALTH_TAG: &str = "Health API";
pub(crate) const HUBSPOT_TAG: &str = "HubSpot Integration API";

#[derive(OpenApi)]
#[openapi(
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = HUBSPOT_TAG, description = "HubSpot OAuth connection and CRM items"),
    ),
    info(
        title = "HubSpot Integration API",
        description = "OAuth connector and CRM item fetcher for HubSpot",
        version = "0.1.0"
    )
)]
pub(crate) struct ApiDoc;
