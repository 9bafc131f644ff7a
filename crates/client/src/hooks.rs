//! Named queries and mutations over the resource clients.
//!
//! Every read goes through the shared [`QueryClient`] under a fixed key, and
//! every write invalidates the keys whose data it changes.

use std::sync::Arc;

use newsfeed_core::{
    AppConfig, Article, ArticleDraft, CredentialStore, Error, Role, Source, SourceCreate, SourceUpdate, User,
};
use serde_json::Value;

use crate::api::{ArticlesApi, AuthApi, CrawlerApi, SourcesApi, ensure_id};
use crate::query::{InfinitePages, QueryClient, QueryConfig, QueryKey};
use crate::recommend::{DEFAULT_TOP_K, RecommendClient, RecommendConfig, Recommender};
use crate::transport::{ExecutionContext, Transport, TransportConfig, TransportError};

/// Cache-backed entry point for everything the UI reads and writes.
#[derive(Clone)]
pub struct NewsQueries {
    queries: QueryClient,
    transport: Transport,
    articles: ArticlesApi,
    sources: SourcesApi,
    auth: AuthApi,
    crawler: CrawlerApi,
    recommender: Arc<dyn Recommender>,
    page_size: u32,
}

impl std::fmt::Debug for NewsQueries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsQueries")
            .field("queries", &self.queries)
            .field("base_url", &self.transport.base_url())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl NewsQueries {
    pub fn new(transport: Transport, recommender: Arc<dyn Recommender>, queries: QueryClient, page_size: u32) -> Self {
        Self {
            queries,
            articles: ArticlesApi::new(transport.clone()),
            sources: SourcesApi::new(transport.clone()),
            auth: AuthApi::new(transport.clone()),
            crawler: CrawlerApi::new(transport.clone()),
            transport,
            recommender,
            page_size,
        }
    }

    /// Wire transport, recommendation client and cache from application config.
    pub fn from_config(
        config: &AppConfig, context: ExecutionContext, credentials: Option<Arc<dyn CredentialStore>>,
    ) -> Result<Self, TransportError> {
        let recommender = RecommendClient::new(RecommendConfig::from_app(config, &context))?;
        let transport = Transport::new(TransportConfig::for_api(config, &context), context, credentials)?;

        tracing::debug!(
            api = transport.base_url(),
            recommend = recommender.base_url(),
            "news client configured"
        );

        Ok(Self::new(transport, Arc::new(recommender), QueryClient::new(QueryConfig::from_app(config)), config.page_size))
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    /// First page of the feed, or every page loaded so far while fresh.
    pub async fn feed(&self) -> Result<InfinitePages<Article>, Error> {
        let api = self.articles.clone();
        let limit = self.page_size;
        self.queries
            .fetch_infinite_query(QueryKey::articles(), limit, move |page| async move { api.list(page, limit).await })
            .await
    }

    /// Load one more feed page when the last one was full.
    pub async fn feed_next_page(&self) -> Result<InfinitePages<Article>, Error> {
        let api = self.articles.clone();
        let limit = self.page_size;
        self.queries
            .fetch_next_page(QueryKey::articles(), move |page| async move { api.list(page, limit).await })
            .await
    }

    pub async fn article(&self, id: i64) -> Result<Article, Error> {
        ensure_id(id, "article")?;
        let api = self.articles.clone();
        self.queries.fetch_query(QueryKey::article(id), async move { api.get(id).await }).await
    }

    /// Articles the recommendation service relates to `id`, in its order.
    ///
    /// Non-positive ids in the recommendation are skipped; no ids means no lookup.
    pub async fn related_articles(&self, id: i64) -> Result<Vec<Article>, Error> {
        ensure_id(id, "article")?;
        let api = self.articles.clone();
        let recommender = self.recommender.clone();

        self.queries
            .fetch_query(QueryKey::related(id), async move {
                let ids: Vec<i64> = recommender
                    .recommend(id, DEFAULT_TOP_K)
                    .await?
                    .into_iter()
                    .filter(|candidate| *candidate > 0)
                    .collect();
                api.get_many(&ids).await
            })
            .await
    }

    pub async fn is_saved(&self, id: i64) -> Result<bool, Error> {
        ensure_id(id, "article")?;
        let api = self.articles.clone();
        self.queries.fetch_query(QueryKey::saved_status(id), async move { api.is_saved(id).await }).await
    }

    pub async fn saved_articles(&self) -> Result<Vec<Article>, Error> {
        let api = self.articles.clone();
        self.queries.fetch_query(QueryKey::saved_articles(), async move { api.saved().await }).await
    }

    pub async fn reading_history(&self) -> Result<Vec<Article>, Error> {
        let api = self.articles.clone();
        let key = QueryKey::reading_history(self.transport.user_id());
        self.queries.fetch_query(key, async move { api.history().await }).await
    }

    pub async fn sources(&self) -> Result<Vec<Source>, Error> {
        let api = self.sources.clone();
        self.queries.fetch_query(QueryKey::sources(), async move { api.list().await }).await
    }

    pub async fn users(&self) -> Result<Vec<User>, Error> {
        let api = self.auth.clone();
        self.queries.fetch_query(QueryKey::users(), async move { api.users().await }).await
    }

    pub async fn create_article(&self, draft: ArticleDraft) -> Result<Article, Error> {
        let api = self.articles.clone();
        self.queries
            .mutate(async move { api.create(&draft).await }, &[QueryKey::articles()])
            .await
    }

    pub async fn update_article(&self, id: i64, draft: ArticleDraft) -> Result<Article, Error> {
        let api = self.articles.clone();
        self.queries
            .mutate(async move { api.update(id, &draft).await }, &[QueryKey::articles(), QueryKey::article(id)])
            .await
    }

    pub async fn delete_article(&self, id: i64) -> Result<(), Error> {
        let api = self.articles.clone();
        self.queries
            .mutate(async move { api.delete(id).await }, &[QueryKey::articles()])
            .await
    }

    pub async fn create_source(&self, source: SourceCreate) -> Result<Source, Error> {
        let api = self.sources.clone();
        self.queries
            .mutate(async move { api.create(&source).await }, &[QueryKey::sources()])
            .await
    }

    pub async fn update_source(&self, id: i64, update: SourceUpdate) -> Result<Source, Error> {
        let api = self.sources.clone();
        self.queries
            .mutate(async move { api.update(id, &update).await }, &[QueryKey::sources()])
            .await
    }

    pub async fn delete_source(&self, id: i64) -> Result<(), Error> {
        let api = self.sources.clone();
        self.queries
            .mutate(async move { api.delete(id).await }, &[QueryKey::sources()])
            .await
    }

    pub async fn save_article(&self, id: i64) -> Result<(), Error> {
        let api = self.articles.clone();
        self.queries
            .mutate(async move { api.save(id).await }, &[QueryKey::saved_status(id), QueryKey::saved_articles()])
            .await
    }

    pub async fn unsave_article(&self, id: i64) -> Result<(), Error> {
        let api = self.articles.clone();
        self.queries
            .mutate(async move { api.unsave(id).await }, &[QueryKey::saved_status(id), QueryKey::saved_articles()])
            .await
    }

    pub async fn mark_read(&self, id: i64) -> Result<(), Error> {
        let api = self.articles.clone();
        self.queries
            .mutate(async move { api.mark_read(id).await }, &[QueryKey::all_reading_history()])
            .await
    }

    pub async fn update_role(&self, id: i64, role: Role) -> Result<User, Error> {
        let api = self.auth.clone();
        self.queries
            .mutate(async move { api.update_role(id, role).await }, &[QueryKey::users()])
            .await
    }

    /// Ask the backend to crawl all active sources now.
    pub async fn trigger_crawl(&self) -> Result<Value, Error> {
        let api = self.crawler.clone();
        self.queries
            .mutate(async move { api.trigger().await }, &[QueryKey::articles()])
            .await
    }
}
