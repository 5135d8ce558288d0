use crate::api::hubspot::models::credentials_key;
use crate::cache::CacheBackend;
use crate::config::ServerConfig;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;

/// Test fixture for setting up a complete test environment with a mocked HubSpot.
///
/// The TestFixture starts a mock server standing in for both the HubSpot OAuth
/// and CRM APIs, configures the application against it and provides helper
/// methods for making requests and seeding the cache.
///
/// # Examples
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///
///     // Seed a connected user and the CRM pages
///     fixture
///         .store_credentials("u1", "o1", json!({"access_token": "test-token", "expires_at": unix_now() + 3600}))
///         .await;
///     fixture.mount_crm_objects().await;
///
///     let response = fixture.get("/integrations/hubspot/items?user_id=u1&org_id=o1").await;
///     response.assert_ok();
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Configuration settings
    pub config: ServerConfig,
    /// State shared with the router, for direct access to the cache
    pub state: AppState,
    /// Mock server for the HubSpot OAuth and CRM APIs
    pub hubspot_mock: MockServer,
}

impl TestFixture {
    /// Creates a new test fixture with an in-memory cache and a HubSpot mock server.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Creates a test fixture whose mock-based configuration is adjusted by
    /// `customize` before the application is built.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let fixture = TestFixture::with_config(|config| {
    ///     config.hubspot.api_url = unreachable_url();
    /// })
    /// .await;
    /// ```
    pub async fn with_config(customize: impl FnOnce(&mut ServerConfig)) -> Self {
        Self::setup_logger(LevelFilter::Debug);

        let hubspot_mock = MockServer::start().await;
        let mut config = ServerConfig::for_test_with_mocks(&hubspot_mock);
        customize(&mut config);

        let state = AppState::for_testing(&config);
        let app = create_app(state.clone());

        Self {
            app,
            config,
            state,
            hubspot_mock,
        }
    }

    /// Initializes the test logger with customized settings.
    ///
    /// Called by `TestFixture::new()` with the debug level; only the first
    /// call in a test binary takes effect.
    pub fn setup_logger(level: LevelFilter) {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    }

    /// Sends a GET request to the specified URI.
    pub async fn get(&self, uri: impl AsRef<str>) -> TestResponse {
        self.request(Method::GET, uri).await
    }

    /// Sends a request without a body using the given method.
    pub async fn request(&self, method: Method, uri: impl AsRef<str>) -> TestResponse {
        let request = Request::builder()
            .method(method)
            .uri(uri.as_ref())
            .body(Body::empty())
            .expect("Failed to build request");

        self.send(request).await
    }

    /// Sends a request and returns a TestResponse.
    ///
    /// This is a lower-level method that is used by the convenience methods
    /// like `get()`. Use this method when you need more control over the
    /// request details.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        // Try to parse as JSON, defaulting to empty object if parsing fails or empty body
        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| json!({}))
        } else {
            json!({})
        };
        let text = String::from_utf8_lossy(&body).into_owned();

        TestResponse {
            status,
            headers,
            json,
            text,
        }
    }

    /// Stores a raw credentials document for the user, as the callback would.
    pub async fn store_credentials(&self, user_id: &str, org_id: &str, credentials: Value) {
        self.state
            .cache
            .set(
                &credentials_key(org_id, user_id),
                &credentials.to_string(),
                Duration::from_secs(3600),
            )
            .await
            .expect("Failed to seed credentials");
    }

    /// Mounts single-page contacts, companies and deals list responses that
    /// require the `test-token` bearer token.
    ///
    /// Yields two contacts, one company and one deal, in that order.
    pub async fn mount_crm_objects(&self) {
        let pages = [
            (
                "/crm/v3/objects/contacts",
                json!({"results": [
                    {
                        "id": "101",
                        "properties": {
                            "firstname": "Ada",
                            "lastname": "Lovelace",
                            "email": "ada@example.com",
                            "createdate": "2024-01-01T00:00:00Z",
                            "hs_lastmodifieddate": "2024-02-01T00:00:00Z"
                        }
                    },
                    {
                        "id": "102",
                        "properties": {"firstname": "", "email": "grace@example.com"},
                        "createdAt": "2024-03-01T00:00:00Z"
                    }
                ]}),
            ),
            (
                "/crm/v3/objects/companies",
                json!({"results": [
                    {"id": "201", "properties": {"name": "Acme", "domain": "acme.test"}}
                ]}),
            ),
            (
                "/crm/v3/objects/deals",
                json!({"results": [
                    {"id": "301", "properties": {"dealname": "Renewal", "amount": "1000"}}
                ]}),
            ),
        ];

        for (path, body) in pages {
            Mock::given(matchers::method("GET"))
                .and(matchers::path(path))
                .and(matchers::header("authorization", "Bearer test-token"))
                .and(matchers::query_param("limit", "100"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.hubspot_mock)
                .await;
        }
    }
}

/// Base URL of a local port that nothing listens on, so every request to it
/// fails at connect time.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind a local port");
    let addr = listener.local_addr().expect("Failed to read the local address");
    drop(listener);
    format!("http://{addr}")
}

/// Response from a test request that provides convenient access to status and body.
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body as JSON (if present and valid JSON)
    pub json: Value,
    /// Raw response body
    pub text: String,
}

impl TestResponse {
    /// Checks if the response status is successful (2xx).
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a response header value as a string, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Asserts that the response has the expected status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match the expected value.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "Expected status {} but got {} with body: {}",
            expected, self.status, self.text
        );
        self
    }

    /// Asserts that the response status is OK (200).
    pub fn assert_ok(&self) -> &Self {
        assert!(
            self.is_success(),
            "Expected a successful status but got {} with body: {}",
            self.status,
            self.text
        );
        self.assert_status(StatusCode::OK)
    }

    /// Converts the JSON body to the specified type.
    ///
    /// # Panics
    ///
    /// Panics if deserialization fails.
    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
