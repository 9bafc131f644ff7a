//! Recommendation service client.
//!
//! Related-article ids come from a separately deployed service rather than
//! the core API.
//!
//! ### Behavior
//!
//! - **Endpoint**: `GET {base}/api/v1/recommend/{id}?top_k=`
//! - **Base URL**: own override and port (8001), same page/server rules as the API.
//! - **Authentication**: none.
//! - **Normalization**: three payload shapes are accepted (see [`response`]);
//!   anything else is a decode failure.

pub mod response;

pub use response::{RecommendPayload, coerce_id};

use std::time::{Duration, Instant};

use async_trait::async_trait;
use newsfeed_core::{AppConfig, Error};

use crate::transport::{ExecutionContext, RECOMMEND_ENDPOINT, TransportError};

/// Default number of recommendations requested.
pub const DEFAULT_TOP_K: u32 = 10;

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of related-article ids.
#[async_trait]
pub trait Recommender: Send + Sync {
    /// Ids of articles related to `article_id`, best first.
    async fn recommend(&self, article_id: i64, top_k: u32) -> Result<Vec<i64>, Error>;
}

/// Recommendation client configuration.
#[derive(Debug, Clone)]
pub struct RecommendConfig {
    /// Resolved base URL of the recommendation service.
    pub base_url: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self { base_url: RECOMMEND_ENDPOINT.internal_url(), timeout: DEFAULT_TIMEOUT }
    }
}

impl RecommendConfig {
    pub fn from_app(config: &AppConfig, context: &ExecutionContext) -> Self {
        Self {
            base_url: RECOMMEND_ENDPOINT.resolve(context, config.recommend_url.as_deref()),
            timeout: config.timeout(),
        }
    }
}

/// HTTP client for the recommendation service.
#[derive(Debug, Clone)]
pub struct RecommendClient {
    http: reqwest::Client,
    config: RecommendConfig,
}

impl RecommendClient {
    pub fn new(config: RecommendConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn fetch_ids(&self, article_id: i64, top_k: u32) -> Result<Vec<i64>, TransportError> {
        let start = Instant::now();
        let url = format!("{}/api/v1/recommend/{}", self.config.base_url, article_id);

        let response = self.http.get(&url).query(&[("top_k", top_k)]).send().await?;
        let status = response.status();

        tracing::debug!(article_id, top_k, status = status.as_u16(), "recommendation response");

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                detail: Some("Failed to fetch recommendations".to_string()),
            });
        }

        let bytes = response.bytes().await?;
        let payload: RecommendPayload =
            serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(format!("unrecognized shape: {e}")))?;
        let ids = payload.into_ids();

        tracing::debug!("recommendations fetched in {:?}, {} ids", start.elapsed(), ids.len());

        Ok(ids)
    }
}

#[async_trait]
impl Recommender for RecommendClient {
    async fn recommend(&self, article_id: i64, top_k: u32) -> Result<Vec<i64>, Error> {
        crate::api::ensure_id(article_id, "article")?;
        self.fetch_ids(article_id, top_k)
            .await
            .map_err(|e| e.into_api_error("fetch recommendations"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::PageLocation;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RecommendClient {
        RecommendClient::new(RecommendConfig { base_url: server.uri(), ..Default::default() }).unwrap()
    }

    #[test]
    fn test_config_resolution() {
        let app = AppConfig { recommend_url: Some("http://recommendation-service:8001".into()), ..Default::default() };
        let page = ExecutionContext::Page(PageLocation::new("http", "localhost"));
        assert_eq!(RecommendConfig::from_app(&app, &page).base_url, "http://localhost:8001");
        assert_eq!(
            RecommendConfig::from_app(&app, &ExecutionContext::Server).base_url,
            "http://recommendation-service:8001"
        );
    }

    #[tokio::test]
    async fn test_recommend_wrapped_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/recommend/42"))
            .and(query_param("top_k", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"similar_articles": [7, "8", "bad", 9]})))
            .expect(1)
            .mount(&server)
            .await;

        let ids = client(&server).recommend(42, DEFAULT_TOP_K).await.unwrap();
        assert_eq!(ids, vec![7, 8, 9]);
    }

    #[tokio::test]
    async fn test_recommend_sends_no_auth_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/recommend/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([2, 3])))
            .mount(&server)
            .await;

        client(&server).recommend(1, 5).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_unknown_shape_is_operation_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/recommend/1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [2]})))
            .mount(&server)
            .await;

        let err = client(&server).recommend(1, 5).await.unwrap_err();
        assert!(matches!(err, Error::OperationFailed { ref operation, .. } if operation == "fetch recommendations"));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/recommend/1"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = client(&server).recommend(1, 5).await.unwrap_err();
        assert_eq!(err.user_message(), "Failed to fetch recommendations");
    }
}
