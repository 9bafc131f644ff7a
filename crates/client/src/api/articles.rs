//! Article endpoints: feed, detail, batch lookup, saves and reading history.

use newsfeed_core::{Article, ArticleDraft, Error, HistoryEntry, SavedArticle, SavedStatus};
use serde_json::{Value, json};

use super::ensure_id;
use crate::transport::Transport;

/// Client for `/api/v1/articles`.
#[derive(Debug, Clone)]
pub struct ArticlesApi {
    transport: Transport,
}

impl ArticlesApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    fn user_query(&self) -> [(&'static str, String); 1] {
        [("user_id", self.transport.user_id().to_string())]
    }

    /// One page of the feed, newest first. Pages start at 1.
    pub async fn list(&self, page: u32, limit: u32) -> Result<Vec<Article>, Error> {
        if page == 0 || limit == 0 {
            return Err(Error::InvalidInput("page and limit must be at least 1".into()));
        }

        self.transport
            .get("/articles", &[("page", page.to_string()), ("limit", limit.to_string())])
            .await
            .map_err(|e| e.into_api_error("list articles"))
    }

    pub async fn get(&self, id: i64) -> Result<Article, Error> {
        ensure_id(id, "article")?;
        self.transport
            .get(&format!("/articles/{id}"), &[])
            .await
            .map_err(|e| e.into_api_error("get article"))
    }

    /// Fetch several articles in one request (`?ids=1&ids=2`).
    ///
    /// An empty id list returns an empty result without touching the network.
    pub async fn get_many(&self, ids: &[i64]) -> Result<Vec<Article>, Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        for id in ids {
            ensure_id(*id, "article")?;
        }

        let query: Vec<(&str, String)> = ids.iter().map(|id| ("ids", id.to_string())).collect();
        self.transport
            .get("/articles", &query)
            .await
            .map_err(|e| e.into_api_error("get articles"))
    }

    pub async fn create(&self, draft: &ArticleDraft) -> Result<Article, Error> {
        self.transport
            .post("/articles", &[], draft)
            .await
            .map_err(|e| e.into_api_error("create article"))
    }

    pub async fn update(&self, id: i64, draft: &ArticleDraft) -> Result<Article, Error> {
        ensure_id(id, "article")?;
        self.transport
            .put(&format!("/articles/{id}"), draft)
            .await
            .map_err(|e| e.into_api_error("update article"))
    }

    pub async fn delete(&self, id: i64) -> Result<(), Error> {
        ensure_id(id, "article")?;
        self.transport
            .delete(&format!("/articles/{id}"), &[])
            .await
            .map_err(|e| e.into_api_error("delete article"))
    }

    pub async fn save(&self, id: i64) -> Result<(), Error> {
        ensure_id(id, "article")?;
        self.transport
            .post::<_, Value>(&format!("/articles/save/{id}"), &self.user_query(), &json!({}))
            .await
            .map(|_| ())
            .map_err(|e| e.into_api_error("save article"))
    }

    pub async fn unsave(&self, id: i64) -> Result<(), Error> {
        ensure_id(id, "article")?;
        self.transport
            .delete(&format!("/articles/save/{id}"), &self.user_query())
            .await
            .map_err(|e| e.into_api_error("unsave article"))
    }

    pub async fn is_saved(&self, id: i64) -> Result<bool, Error> {
        ensure_id(id, "article")?;
        self.transport
            .get::<SavedStatus>(&format!("/articles/saved/{id}"), &self.user_query())
            .await
            .map(|status| status.is_saved)
            .map_err(|e| e.into_api_error("check saved article"))
    }

    pub async fn mark_read(&self, id: i64) -> Result<(), Error> {
        ensure_id(id, "article")?;
        self.transport
            .post::<_, Value>(&format!("/articles/read/{id}"), &self.user_query(), &json!({}))
            .await
            .map(|_| ())
            .map_err(|e| e.into_api_error("mark article read"))
    }

    /// Saved articles of the current user, unwrapped from their save records.
    pub async fn saved(&self) -> Result<Vec<Article>, Error> {
        self.transport
            .get::<Vec<SavedArticle>>("/articles/saved", &self.user_query())
            .await
            .map(|rows| rows.into_iter().map(|row| row.article).collect())
            .map_err(|e| e.into_api_error("list saved articles"))
    }

    /// Reading history of the current user, most recent first as served.
    pub async fn history(&self) -> Result<Vec<Article>, Error> {
        self.transport
            .get::<Vec<HistoryEntry>>("/articles/history", &self.user_query())
            .await
            .map(|rows| rows.into_iter().map(|row| row.article).collect())
            .map_err(|e| e.into_api_error("list reading history"))
    }
}
