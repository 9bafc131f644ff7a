//! Typed resource clients for the core API.
//!
//! Each method maps one remote operation to one request/response pair.
//! Failures collapse into [`newsfeed_core::Error`]: validation problems are
//! caught before any request, rejected credentials become
//! `SessionInvalid`, everything else is a generic failed operation.

pub mod articles;
pub mod auth;
pub mod crawler;
pub mod sources;

pub use articles::ArticlesApi;
pub use auth::AuthApi;
pub use crawler::CrawlerApi;
pub use sources::SourcesApi;

use newsfeed_core::Error;

/// Reject non-positive ids before they reach the network.
pub(crate) fn ensure_id(id: i64, what: &str) -> Result<(), Error> {
    if id <= 0 {
        return Err(Error::InvalidInput(format!("{what} id must be a positive integer, got {id}")));
    }
    Ok(())
}

/// Reject blank required text fields.
pub(crate) fn ensure_present(value: &str, field: &str) -> Result<(), Error> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("{field} is required")));
    }
    Ok(())
}
