//! Hierarchical query keys.

use std::fmt;

/// One segment of a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Name(String),
    Id(i64),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Name(name) => f.write_str(name),
            KeyPart::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Identifies a cached query, e.g. `["article", 42, "related"]`.
///
/// Keys are compared by prefix for invalidation: invalidating `["articles"]`
/// touches every key that starts with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl QueryKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(vec![KeyPart::Name(name.into())])
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.0.push(KeyPart::Id(id));
        self
    }

    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.0.push(KeyPart::Name(name.into()));
        self
    }

    pub fn parts(&self) -> &[KeyPart] {
        &self.0
    }

    /// True when `prefix` matches the leading segments of this key.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// The infinite article feed.
    pub fn articles() -> Self {
        Self::new("articles")
    }

    pub fn article(id: i64) -> Self {
        Self::new("article").with_id(id)
    }

    pub fn related(id: i64) -> Self {
        Self::article(id).with("related")
    }

    pub fn saved_status(id: i64) -> Self {
        Self::article(id).with("saved")
    }

    pub fn saved_articles() -> Self {
        Self::new("saved-articles")
    }

    pub fn reading_history(user_id: i64) -> Self {
        Self::new("reading-history").with_id(user_id)
    }

    /// Every reading-history key regardless of user.
    pub fn all_reading_history() -> Self {
        Self::new("reading-history")
    }

    pub fn sources() -> Self {
        Self::new("rss-sources")
    }

    pub fn users() -> Self {
        Self::new("users")
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}
