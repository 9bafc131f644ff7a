//! Client-side projections of the news API payloads.
//!
//! The server is authoritative for all of these; the client only caches them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Basic source reference embedded in an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRef {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
}

/// A news article as returned by `/api/v1/articles`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub source_id: Option<i64>,
    #[serde(default)]
    pub source: Option<SourceRef>,
    #[serde(default)]
    pub fetched_at: Option<String>,
    #[serde(default)]
    pub is_saved: Option<bool>,
}

impl Article {
    /// Parsed publication time, when the server sent one in a known format.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published.as_deref().and_then(parse_timestamp)
    }
}

/// Partial article used for create and update requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArticleDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
}

/// An RSS source managed from the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: Option<String>,
    pub is_active: bool,
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

/// Body of `POST /sources`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceCreate {
    pub name: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Body of `PUT /sources/{id}`. Unset fields are left unchanged by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Account role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The signed-in account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Tokens issued by `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".into()
}

/// Wrapper row returned by `GET /articles/saved`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedArticle {
    pub id: i64,
    pub article: Article,
    pub saved_at: String,
}

/// Wrapper row returned by `GET /articles/history`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: i64,
    pub article: Article,
    pub read_at: String,
}

/// Body of `GET /articles/saved/{id}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedStatus {
    pub is_saved: bool,
}

/// Parse RFC 3339 or the naive ISO form the API emits for timezone-less columns.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_JSON: &str = r#"{
        "id": 42,
        "title": "Rust 2024 released",
        "link": "https://example.com/rust",
        "published": "2024-10-21T07:28:00Z",
        "summary": "Edition 2024 ships",
        "source": {"id": 3, "name": "Tech Feed", "category": "technology"}
    }"#;

    #[test]
    fn test_deserialize_article_with_missing_optionals() {
        let article: Article = serde_json::from_str(ARTICLE_JSON).unwrap();
        assert_eq!(article.id, 42);
        assert_eq!(article.source.as_ref().unwrap().name, "Tech Feed");
        assert!(article.content.is_none());
        assert!(article.is_saved.is_none());
    }

    #[test]
    fn test_published_at_parsing() {
        let article: Article = serde_json::from_str(ARTICLE_JSON).unwrap();
        let published = article.published_at().unwrap();
        assert_eq!(published.to_rfc3339(), "2024-10-21T07:28:00+00:00");

        let naive = Article { published: Some("2024-10-21T07:28:00.123456".into()), ..article.clone() };
        assert!(naive.published_at().is_some());

        let garbage = Article { published: Some("yesterday".into()), ..article };
        assert!(garbage.published_at().is_none());
    }

    #[test]
    fn test_draft_skips_unset_fields() {
        let draft = ArticleDraft { title: Some("New".into()), ..Default::default() };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json, serde_json::json!({"title": "New"}));
    }

    #[test]
    fn test_source_create_body() {
        let body = SourceCreate {
            name: "Tech Feed".into(),
            url: "https://example.com/rss".into(),
            category: Some("technology".into()),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Tech Feed", "url": "https://example.com/rss", "category": "technology"})
        );
    }

    #[test]
    fn test_source_created_at_is_lenient() {
        let naive: Source = serde_json::from_value(serde_json::json!({
            "id": 1, "name": "World", "url": "https://example.com/rss",
            "is_active": true, "created_at": "2024-10-21T08:00:00.5"
        }))
        .unwrap();
        assert_eq!(naive.created_at.to_rfc3339(), "2024-10-21T08:00:00.500+00:00");

        let reencoded: Source = serde_json::from_value(serde_json::to_value(&naive).unwrap()).unwrap();
        assert_eq!(reencoded, naive);

        let bad = serde_json::from_value::<Source>(serde_json::json!({
            "id": 1, "name": "World", "url": "https://example.com/rss",
            "is_active": true, "created_at": "last week"
        }));
        assert!(bad.unwrap_err().to_string().contains("invalid timestamp"));
    }

    #[test]
    fn test_role_roundtrip_and_parse() {
        let user: User = serde_json::from_str(r#"{"id": 1, "username": "root", "role": "admin"}"#).unwrap();
        assert!(user.is_admin());
        assert_eq!("USER".parse::<Role>().unwrap(), Role::User);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_token_type_default() {
        let tokens: TokenPair = serde_json::from_str(r#"{"access_token": "a", "refresh_token": "r"}"#).unwrap();
        assert_eq!(tokens.token_type, "bearer");
    }
}
