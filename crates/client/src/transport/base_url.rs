//! Execution context and base URL resolution.
//!
//! The same client behaves differently depending on where it runs:
//!
//! - **Page** (interactive, has a host to infer from): an explicit override
//!   wins unless it names an internal-only service host, otherwise the page's
//!   own host is used with the service port.
//! - **Server** (rendering inside the deployment network): the override, or
//!   the internal service address.

use newsfeed_core::config::{API_SERVICE_HOST, RECOMMEND_SERVICE_HOST};

/// Error type for page location parsing failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("empty location")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("location has no host: {0}")]
    MissingHost(String),

    #[error("invalid location: {0}")]
    Invalid(String),
}

/// Scheme and host of the page the client is running in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLocation {
    pub scheme: String,
    pub hostname: String,
}

impl PageLocation {
    pub fn new(scheme: impl Into<String>, hostname: impl Into<String>) -> Self {
        Self { scheme: scheme.into(), hostname: hostname.into() }
    }

    /// Parse a page origin such as `https://news.example.com/articles/3`.
    ///
    /// Only scheme and host are kept; port, path and query are ignored.
    pub fn parse(origin: &str) -> Result<Self, LocationError> {
        let trimmed = origin.trim();
        if trimmed.is_empty() {
            return Err(LocationError::Empty);
        }

        let parsed = url::Url::parse(trimmed).map_err(|e| LocationError::Invalid(e.to_string()))?;

        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(LocationError::UnsupportedScheme(scheme.to_string())),
        }

        let hostname = parsed
            .host_str()
            .ok_or_else(|| LocationError::MissingHost(trimmed.to_string()))?
            .to_lowercase();

        Ok(Self { scheme: parsed.scheme().to_string(), hostname })
    }
}

/// Where the client is executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Interactive context with a page host and persisted credentials.
    Page(PageLocation),
    /// Server-side rendering; no page host, no credential storage.
    Server,
}

impl ExecutionContext {
    pub fn is_page(&self) -> bool {
        matches!(self, ExecutionContext::Page(_))
    }
}

/// A remote service the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Host name only resolvable inside the deployment network.
    pub internal_host: &'static str,
    pub port: u16,
}

/// The core news API.
pub const API_ENDPOINT: ServiceEndpoint = ServiceEndpoint { internal_host: API_SERVICE_HOST, port: 8080 };

/// The recommendation service.
pub const RECOMMEND_ENDPOINT: ServiceEndpoint = ServiceEndpoint { internal_host: RECOMMEND_SERVICE_HOST, port: 8001 };

impl ServiceEndpoint {
    /// Internal address used by server contexts without an override.
    pub fn internal_url(&self) -> String {
        format!("http://{}:{}", self.internal_host, self.port)
    }

    /// Resolve the base URL for `context`, honoring `override_url` where allowed.
    ///
    /// The result never ends with a slash.
    pub fn resolve(&self, context: &ExecutionContext, override_url: Option<&str>) -> String {
        let override_url = override_url.map(str::trim).filter(|url| !url.is_empty());

        let resolved = match context {
            ExecutionContext::Page(location) => match override_url {
                Some(url) if !url.contains(self.internal_host) => url.to_string(),
                _ => format!("{}://{}:{}", location.scheme, location.hostname, self.port),
            },
            ExecutionContext::Server => override_url.map(str::to_string).unwrap_or_else(|| self.internal_url()),
        };

        resolved.trim_end_matches('/').to_string()
    }
}
