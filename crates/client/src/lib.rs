//! Client code for the newsfeed API.
//!
//! This crate provides the HTTP transport, typed resource clients, the
//! recommendation client, the query cache and the session context used by
//! the CLI and any other front end.

pub mod api;
pub mod hooks;
pub mod query;
pub mod recommend;
pub mod session;
pub mod transport;

pub use api::{ArticlesApi, AuthApi, CrawlerApi, SourcesApi};
pub use hooks::NewsQueries;
pub use query::{Cached, InfinitePages, QueryClient, QueryConfig, QueryKey, QueryObserver, QuerySnapshot, QueryStatus};
pub use recommend::{RecommendClient, RecommendConfig, Recommender};
pub use session::Session;
pub use transport::{ExecutionContext, PageLocation, SessionSignal, Transport, TransportConfig, TransportError};
