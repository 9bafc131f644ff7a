//! Core types and shared functionality for the newsfeed client.
//!
//! This crate provides:
//! - Domain models mirroring the news API payloads
//! - Unified error types
//! - Configuration structures
//! - Persisted credential storage

pub mod config;
pub mod credentials;
pub mod error;
pub mod model;

pub use config::{AppConfig, ConfigError};
pub use credentials::{CredentialError, CredentialKey, CredentialStore, FileCredentials, MemoryCredentials};
pub use error::Error;
pub use model::{
    Article, ArticleDraft, HistoryEntry, Role, SavedArticle, SavedStatus, Source, SourceCreate, SourceRef,
    SourceUpdate, TokenPair, User,
};
