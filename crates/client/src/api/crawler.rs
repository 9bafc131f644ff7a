//! Crawler control.

use newsfeed_core::Error;
use serde_json::{Value, json};

use crate::transport::Transport;

/// Client for `/api/v1/crawler`.
#[derive(Debug, Clone)]
pub struct CrawlerApi {
    transport: Transport,
}

impl CrawlerApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    /// Start a full crawl of every active source. Returns the server's acknowledgement as-is.
    pub async fn trigger(&self) -> Result<Value, Error> {
        self.transport
            .post("/crawler/trigger", &[], &json!({}))
            .await
            .map_err(|e| e.into_api_error("trigger crawl"))
    }
}
