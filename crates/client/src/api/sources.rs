//! RSS source administration endpoints.

use newsfeed_core::{Error, Source, SourceCreate, SourceUpdate};

use super::{ensure_id, ensure_present};
use crate::transport::Transport;

/// Client for `/api/v1/sources`.
#[derive(Debug, Clone)]
pub struct SourcesApi {
    transport: Transport,
}

impl SourcesApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub async fn list(&self) -> Result<Vec<Source>, Error> {
        self.transport
            .get("/sources", &[])
            .await
            .map_err(|e| e.into_api_error("list sources"))
    }

    /// Register a new source. Name and URL are required.
    pub async fn create(&self, source: &SourceCreate) -> Result<Source, Error> {
        ensure_present(&source.name, "name")?;
        ensure_present(&source.url, "url")?;

        self.transport
            .post("/sources", &[], source)
            .await
            .map_err(|e| e.into_api_error("create source"))
    }

    pub async fn update(&self, id: i64, update: &SourceUpdate) -> Result<Source, Error> {
        ensure_id(id, "source")?;
        self.transport
            .put(&format!("/sources/{id}"), update)
            .await
            .map_err(|e| e.into_api_error("update source"))
    }

    pub async fn delete(&self, id: i64) -> Result<(), Error> {
        ensure_id(id, "source")?;
        self.transport
            .delete(&format!("/sources/{id}"), &[])
            .await
            .map_err(|e| e.into_api_error("delete source"))
    }
}
