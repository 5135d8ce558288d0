//! HubSpot OAuth token grants and CRM v3 list API client

use crate::api::hubspot::{
    errors::HubSpotError,
    models::{Credentials, ItemType, ListPage, NormalizedItem},
    normalize::normalize,
};
use crate::config::HubSpotConfig;
use http::header::{ACCEPT, AUTHORIZATION};
use http::{HeaderMap, HeaderValue};
use log::{debug, error, info};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// Scopes requested on the consent page
pub const SCOPES: [&str; 4] = [
    "crm.objects.contacts.read",
    "crm.objects.companies.read",
    "crm.objects.contacts.write",
    "crm.objects.deals.read",
];

/// Page size requested from the list endpoints
const PAGE_LIMIT: u32 = 100;

/// A CRM object type fetched by [`HubSpotClient::get_items`]
struct ObjectSpec {
    item_type: ItemType,
    object: &'static str,
    properties: &'static str,
}

/// Fetched in this order
const OBJECT_SPECS: [ObjectSpec; 3] = [
    ObjectSpec {
        item_type: ItemType::Contact,
        object: "contacts",
        properties: "firstname,lastname,email,phone,createdate,hs_lastmodifieddate",
    },
    ObjectSpec {
        item_type: ItemType::Company,
        object: "companies",
        properties: "name,domain,phone,createdate,hs_lastmodifieddate",
    },
    ObjectSpec {
        item_type: ItemType::Deal,
        object: "deals",
        properties: "dealname,amount,dealstage,createdate,hs_lastmodifieddate",
    },
];

/// HubSpot API client
#[derive(Clone)]
pub struct HubSpotClient {
    client: Client,
    config: Arc<HubSpotConfig>,
}

impl HubSpotClient {
    /// Create a new HubSpot client on top of a shared HTTP client
    pub fn new(client: Client, config: Arc<HubSpotConfig>) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &HubSpotConfig {
        &self.config
    }

    /// Consent page URL carrying the client id, scopes, redirect URI and state
    pub fn authorization_url(&self, encoded_state: &str) -> Result<Url, url::ParseError> {
        Url::parse_with_params(
            &self.config.authorize_url,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", SCOPES.join(" ").as_str()),
                ("state", encoded_state),
            ],
        )
    }

    /// Exchange an authorization code for tokens. Codes are single-use, so
    /// this is never retried.
    pub async fn exchange_code(&self, code: &str) -> Result<Credentials, HubSpotError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        match self.post_token_grant(&form).await? {
            Ok(credentials) => Ok(credentials),
            Err((status, body)) => {
                error!("HubSpot token exchange failed with status {}", status);
                Err(HubSpotError::TokenExchangeFailed { status, body })
            }
        }
    }

    /// Obtain a new access token with the refresh token grant
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<Credentials, HubSpotError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        match self.post_token_grant(&form).await? {
            Ok(credentials) => Ok(credentials),
            Err((status, body)) => {
                error!("HubSpot token refresh failed with status {}", status);
                Err(HubSpotError::TokenRefreshFailed { status, body })
            }
        }
    }

    /// POST a form-encoded grant to the token endpoint.
    ///
    /// The outer result carries transport and parse failures, the inner one a
    /// non-2xx vendor answer as status and body.
    async fn post_token_grant(
        &self,
        form: &[(&str, &str)],
    ) -> Result<Result<Credentials, (http::StatusCode, String)>, HubSpotError> {
        let response = self
            .client
            .post(self.config.token_url())
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Ok(Err((status, body)));
        }

        let credentials = response
            .json::<Credentials>()
            .await
            .map_err(|e| HubSpotError::InvalidVendorResponse(format!("token response: {e}")))?;
        Ok(Ok(credentials))
    }

    /// Fetch the records of a list endpoint, following `paging.next.link`
    /// verbatim, and stop as soon as `max_items` records were collected.
    ///
    /// Any failing page aborts the whole fetch.
    pub async fn fetch_all_pages(
        &self,
        url: &str,
        headers: &HeaderMap,
        params: &[(&str, String)],
        max_items: usize,
    ) -> Result<Vec<Value>, HubSpotError> {
        let mut collected = Vec::new();
        if max_items == 0 {
            return Ok(collected);
        }

        let mut page_url = url.to_string();
        let mut query = Some(params);
        let mut page_number = 1;

        loop {
            let mut request = self.client.get(&page_url).headers(headers.clone());
            // The next link already embeds the query
            if let Some(params) = query.take() {
                request = request.query(params);
            }

            let response = request
                .send()
                .await
                .map_err(|e| upstream_failure(&page_url, e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                error!("HubSpot list request to {} failed with status {}", page_url, status);
                return Err(upstream_failure(&page_url, format!("HTTP {status}: {body}")));
            }

            let page: ListPage = response
                .json()
                .await
                .map_err(|e| upstream_failure(&page_url, format!("invalid page: {e}")))?;

            let next_link = page.next_link().map(str::to_string);
            let results = page.results.unwrap_or_default();
            debug!(
                "Fetched page {} of {} with {} records",
                page_number,
                url,
                results.len()
            );
            collected.extend(results);

            if collected.len() >= max_items {
                collected.truncate(max_items);
                return Ok(collected);
            }

            match next_link {
                Some(link) => page_url = link,
                None => return Ok(collected),
            }
            page_number += 1;
        }
    }

    /// Fetch contacts, then companies, then deals, each bounded by
    /// `max_items_per_type`, and normalize every record.
    pub async fn get_items(
        &self,
        credentials: &Credentials,
        max_items_per_type: usize,
    ) -> Result<Vec<NormalizedItem>, HubSpotError> {
        let access_token = credentials
            .access_token()
            .ok_or(HubSpotError::MissingAccessToken)?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {access_token}")).map_err(|_| {
                HubSpotError::CorruptedCredentials("access_token is not a valid header".to_string())
            })?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let mut items = Vec::new();
        for spec in &OBJECT_SPECS {
            let params = [
                ("limit", PAGE_LIMIT.to_string()),
                ("properties", spec.properties.to_string()),
            ];
            let records = self
                .fetch_all_pages(
                    &self.config.objects_url(spec.object),
                    &headers,
                    &params,
                    max_items_per_type,
                )
                .await?;

            info!("Fetched {} HubSpot {}", records.len(), spec.object);
            items.extend(
                records
                    .iter()
                    .map(|record| normalize(record, spec.item_type)),
            );
        }

        Ok(items)
    }
}

fn upstream_failure(url: &str, detail: String) -> HubSpotError {
    HubSpotError::UpstreamFetchFailed {
        url: url.to_string(),
        detail,
    }
}
