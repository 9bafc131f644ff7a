//! HTTP transport for the news API.
//!
//! ### Behavior
//!
//! - **Base URL**: resolved once from the [`ExecutionContext`] and the
//!   configured override (see [`base_url`]).
//! - **Authentication**: in a page context the persisted access token is read
//!   before every request and sent as `Authorization: Bearer <token>`.
//! - **Rejected credentials**: a 401 clears the persisted tokens and publishes
//!   one [`SessionSignal::Invalidated`] per occurrence. Navigation is left to
//!   whoever subscribes. A transport from [`Transport::unguarded`] reports a
//!   401 as a plain HTTP error instead, for sign-in and session checks.
//! - **Errors**: non-2xx bodies are decoded with [`detail`] for a readable
//!   message. Nothing is retried.

pub mod base_url;
pub mod detail;
pub mod error;

pub use base_url::{API_ENDPOINT, ExecutionContext, PageLocation, RECOMMEND_ENDPOINT, ServiceEndpoint};
pub use detail::{ErrorDetail, decode_error_message};
pub use error::TransportError;

use std::sync::Arc;
use std::time::{Duration, Instant};

use newsfeed_core::credentials::DEFAULT_USER_ID;
use newsfeed_core::{AppConfig, CredentialStore};
use reqwest::{Method, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

/// Path prefix shared by every API route.
pub const API_PREFIX: &str = "/api/v1";

/// Where the user is sent after the session is invalidated.
pub const LOGIN_PATH: &str = "/auth";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "newsfeed/0.1";

/// Buffered session signals per subscriber.
const SIGNAL_CAPACITY: usize = 16;

/// Session-level events raised by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionSignal {
    /// Stored credentials were rejected and have been cleared.
    Invalidated { redirect_to: &'static str },
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Resolved base URL, without the `/api/v1` prefix.
    pub base_url: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
    /// User-agent string (default: newsfeed/0.x).
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: API_ENDPOINT.internal_url(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TransportConfig {
    /// Derive transport settings for the core API from application config.
    pub fn for_api(config: &AppConfig, context: &ExecutionContext) -> Self {
        Self {
            base_url: API_ENDPOINT.resolve(context, config.api_url.as_deref()),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Configured HTTP client for the core API.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    config: TransportConfig,
    context: ExecutionContext,
    credentials: Option<Arc<dyn CredentialStore>>,
    signals: broadcast::Sender<SessionSignal>,
    guard_session: bool,
}

impl Transport {
    /// Create a transport.
    ///
    /// `credentials` is ignored in a server context, which has no persisted state.
    pub fn new(
        config: TransportConfig, context: ExecutionContext, credentials: Option<Arc<dyn CredentialStore>>,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        let credentials = if context.is_page() { credentials } else { None };
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);

        Ok(Self { http, config, context, credentials, signals, guard_session: true })
    }

    /// A handle on the same client whose 401 responses leave the session alone.
    pub fn unguarded(&self) -> Self {
        Self { guard_session: false, ..self.clone() }
    }

    /// Subscribe to session signals. Each 401 is delivered once to every subscriber.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals.subscribe()
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn credentials(&self) -> Option<&Arc<dyn CredentialStore>> {
        self.credentials.as_ref()
    }

    /// Id of the signed-in user, or the API default when unknown.
    pub fn user_id(&self) -> i64 {
        self.credentials.as_ref().map(|store| store.user_id()).unwrap_or(DEFAULT_USER_ID)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, TransportError> {
        let builder = self.request(Method::GET, path).query(query);
        self.execute(Method::GET, path, builder).await
    }

    pub async fn post<B, T>(&self, path: &str, query: &[(&str, String)], body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::POST, path).query(query).json(body);
        self.execute(Method::POST, path, builder).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(Method::PUT, path).json(body);
        self.execute(Method::PUT, path, builder).await
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<(), TransportError> {
        let builder = self.request(Method::DELETE, path).query(query);
        self.execute::<serde_json::Value>(Method::DELETE, path, builder)
            .await
            .map(|_| ())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}{}", self.config.base_url, API_PREFIX, path);
        let mut builder = self
            .http
            .request(method, url)
            .header(header::ACCEPT, "application/json");

        if let Some(token) = self.credentials.as_ref().and_then(|store| store.access_token()) {
            builder = builder.bearer_auth(token);
        }

        builder
    }

    async fn execute<T: DeserializeOwned>(
        &self, method: Method, path: &str, builder: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let start = Instant::now();
        let response = builder.send().await?;
        let status = response.status();

        tracing::debug!(
            method = %method,
            path,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "api request completed"
        );

        if status == StatusCode::UNAUTHORIZED && self.guard_session {
            self.invalidate_session();
            return Err(TransportError::Unauthorized);
        }

        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(TransportError::Http { status: status.as_u16(), detail: decode_error_message(&bytes) });
        }

        decode_body(&bytes)
    }

    /// Clear persisted tokens and tell subscribers the session is gone.
    fn invalidate_session(&self) {
        if !self.context.is_page() {
            return;
        }

        tracing::warn!("credentials rejected, clearing session");

        if let Some(store) = &self.credentials
            && let Err(e) = store.clear_tokens()
        {
            tracing::warn!("failed to clear persisted tokens: {}", e);
        }

        // No subscribers is fine; the tokens are already gone.
        let _ = self.signals.send(SessionSignal::Invalidated { redirect_to: LOGIN_PATH });
    }
}

/// Decode a success body. Empty bodies (204) decode as JSON `null`.
pub(crate) fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TransportError> {
    let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) { b"null" } else { bytes };
    serde_json::from_slice(body).map_err(|e| TransportError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::page_transport;
    use newsfeed_core::{CredentialKey, MemoryCredentials};
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.base_url, "http://core-api-service:8080");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.user_agent, "newsfeed/0.1");
    }

    #[test]
    fn test_transport_config_for_api() {
        let app = AppConfig { api_url: Some("https://api.example.com".into()), timeout_ms: 2_500, ..Default::default() };
        let context = ExecutionContext::Page(PageLocation::new("https", "news.example.com"));
        let config = TransportConfig::for_api(&app, &context);
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.timeout, Duration::from_millis(2_500));
    }

    #[test]
    fn test_server_context_drops_credentials() {
        let store: Arc<dyn CredentialStore> = Arc::new(MemoryCredentials::new());
        let transport = Transport::new(TransportConfig::default(), ExecutionContext::Server, Some(store)).unwrap();
        assert!(transport.credentials().is_none());
        assert_eq!(transport.user_id(), DEFAULT_USER_ID);
    }

    #[test]
    fn test_decode_empty_body() {
        assert!(decode_body::<()>(b"").is_ok());
        let value: serde_json::Value = decode_body(b"  ").unwrap();
        assert!(value.is_null());
        assert!(matches!(decode_body::<Vec<i64>>(b"{}"), Err(TransportError::Decode(_))));
    }

    #[tokio::test]
    async fn test_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/sources"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentials::new());
        store.set(CredentialKey::AccessToken, "secret-token").unwrap();
        let transport = page_transport(&server, store);

        let sources: Vec<serde_json::Value> = transport.get("/sources", &[]).await.unwrap();
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_post_sends_json_and_query() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/articles/read/5"))
            .and(query_param("user_id", "3"))
            .and(body_json(serde_json::json!({})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"message": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let transport = page_transport(&server, Arc::new(MemoryCredentials::new()));
        let _: serde_json::Value = transport
            .post("/articles/read/5", &[("user_id", "3".to_string())], &serde_json::json!({}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unauthorized_clears_tokens_and_signals_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/auth/users/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({"detail": "Invalid token"})))
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentials::new());
        store.set(CredentialKey::AccessToken, "expired").unwrap();
        store.set(CredentialKey::RefreshToken, "refresh").unwrap();
        store.set(CredentialKey::UserId, "4").unwrap();
        let transport = page_transport(&server, store.clone());
        let mut signals = transport.subscribe();

        let result: Result<serde_json::Value, _> = transport.get("/auth/users/me", &[]).await;
        assert!(matches!(result, Err(TransportError::Unauthorized)));

        assert!(store.access_token().is_none());
        assert!(store.get(CredentialKey::RefreshToken).is_none());
        assert_eq!(store.user_id(), 4);

        assert_eq!(signals.try_recv().unwrap(), SessionSignal::Invalidated { redirect_to: LOGIN_PATH });
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unguarded_unauthorized_keeps_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/auth/login"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"detail": "Incorrect username or password"})),
            )
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentials::new());
        store.set(CredentialKey::AccessToken, "valid").unwrap();
        let transport = page_transport(&server, store.clone()).unguarded();
        let mut signals = transport.subscribe();

        let result: Result<serde_json::Value, _> =
            transport.post("/auth/login", &[], &serde_json::json!({"username": "a", "password": "b"})).await;
        match result {
            Err(TransportError::Http { status, detail }) => {
                assert_eq!(status, 401);
                assert_eq!(detail.as_deref(), Some("Incorrect username or password"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(store.access_token().as_deref(), Some("valid"));
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_http_error_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/articles/99"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Article not found"})))
            .mount(&server)
            .await;

        let transport = page_transport(&server, Arc::new(MemoryCredentials::new()));
        let mut signals = transport.subscribe();
        let result: Result<serde_json::Value, _> = transport.get("/articles/99", &[]).await;

        match result {
            Err(TransportError::Http { status, detail }) => {
                assert_eq!(status, 404);
                assert_eq!(detail.as_deref(), Some("Article not found"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_delete_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/sources/7"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let transport = page_transport(&server, Arc::new(MemoryCredentials::new()));
        transport.delete("/sources/7", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_network_failure() {
        let config = TransportConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout: Duration::from_millis(500),
            ..Default::default()
        };
        let transport = Transport::new(config, ExecutionContext::Server, None).unwrap();
        let result: Result<serde_json::Value, _> = transport.get("/articles", &[]).await;
        assert!(matches!(result, Err(TransportError::Network(_)) | Err(TransportError::Timeout)));
    }
}
