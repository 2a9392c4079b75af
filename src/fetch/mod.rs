//! Page fetching with two interchangeable strategies.
//!
//! Every source names a preferred [`FetchStrategy`]. The two implementations
//! live in submodules:
//!
//! | Strategy | Module | Transport | Notes |
//! |----------|--------|-----------|-------|
//! | Static | [`static_fetch`] | `reqwest` GET | Server-rendered HTML only |
//! | Rendered | [`rendered`] | headless Chromium | Needs the `browser` feature and a Chromium binary |
//!
//! Whether the rendered strategy can be used is decided once at startup by
//! [`Capabilities::detect`] and baked into the [`FetcherSet`] that source
//! runners are built with. A source that prefers rendering falls back to the
//! static fetcher when the capability is missing.

pub mod rendered;
pub mod static_fetch;

use crate::config::FetchSettings;
use async_trait::async_trait;
use scraper::Html;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

pub use rendered::RenderedFetcher;
pub use static_fetch::StaticFetcher;

/// How a page is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Single HTTP GET against server-rendered HTML.
    Static,
    /// Full browser navigation for JavaScript-driven pages.
    Rendered,
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchStrategy::Static => f.write_str("static"),
            FetchStrategy::Rendered => f.write_str("rendered"),
        }
    }
}

/// Failures while retrieving a page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error{}: {message}", status_suffix(.status))]
    Network {
        status: Option<u16>,
        message: String,
    },

    #[error("navigation timed out after {0:?}")]
    NavigationTimeout(Duration),

    #[error("marker `{marker}` did not appear within {timeout:?}")]
    MarkerNotFound { marker: String, timeout: Duration },

    #[error("browser error: {0}")]
    Browser(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// A search box to fill in before reading results.
///
/// The rendered strategy types `query` into the first matching input and
/// submits; the static strategy sends it as a query-string parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchForm {
    pub query: String,
    pub input_selectors: Vec<String>,
    pub submit_selectors: Vec<String>,
    pub query_param: String,
}

/// What to fetch for one source.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub url: &'a str,
    /// Selector whose presence means the rendered page is ready.
    pub marker: Option<&'a str>,
    pub search: Option<&'a SearchForm>,
}

impl FetchRequest<'_> {
    /// URL for a plain GET, with the search query appended when present.
    pub fn static_url(&self) -> String {
        match self.search {
            Some(form) => {
                let sep = if self.url.contains('?') { '&' } else { '?' };
                format!(
                    "{}{}{}={}",
                    self.url,
                    sep,
                    form.query_param,
                    urlencoding::encode(&form.query)
                )
            }
            None => self.url.to_string(),
        }
    }
}

/// Raw page content as retrieved.
///
/// Kept as text so it can cross await points; [`RawDocument::parse`] builds
/// the DOM tree right before extraction.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub url: String,
    pub html: String,
    pub strategy: FetchStrategy,
}

impl RawDocument {
    pub fn parse(&self) -> Html {
        Html::parse_document(&self.html)
    }
}

/// A page retrieval strategy.
#[async_trait]
pub trait Fetcher: Send + Sync {
    fn strategy(&self) -> FetchStrategy;

    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<RawDocument, FetchError>;
}

/// Process-wide capabilities discovered at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// A headless browser could be launched.
    pub rendered: bool,
}

impl Capabilities {
    /// Probe the environment once. `disable_rendered` skips the probe.
    #[instrument(level = "info", skip(settings))]
    pub async fn detect(settings: &FetchSettings, disable_rendered: bool) -> Self {
        let rendered = if disable_rendered {
            info!("Rendered strategy disabled by configuration");
            false
        } else {
            rendered::probe(settings).await
        };
        info!(rendered, "Detected fetch capabilities");
        Self { rendered }
    }
}

/// The fetchers available to source runners.
#[derive(Clone)]
pub struct FetcherSet {
    static_fetcher: Arc<dyn Fetcher>,
    rendered_fetcher: Option<Arc<dyn Fetcher>>,
}

impl FetcherSet {
    pub fn new(
        static_fetcher: Arc<dyn Fetcher>,
        rendered_fetcher: Option<Arc<dyn Fetcher>>,
    ) -> Self {
        Self {
            static_fetcher,
            rendered_fetcher,
        }
    }

    /// Build the real fetchers, including the rendered one only when the
    /// capability probe succeeded.
    pub fn from_settings(
        settings: &FetchSettings,
        capabilities: Capabilities,
    ) -> Result<Self, FetchError> {
        let static_fetcher: Arc<dyn Fetcher> = Arc::new(StaticFetcher::new(
            &settings.user_agent,
            settings.static_timeout(),
        )?);
        let rendered_fetcher = if capabilities.rendered {
            Some(Arc::new(RenderedFetcher::new(settings)) as Arc<dyn Fetcher>)
        } else {
            None
        };
        Ok(Self::new(static_fetcher, rendered_fetcher))
    }

    /// The fetcher to use for a source preferring `preferred`.
    ///
    /// Rendered falls back to static when no rendered fetcher is available.
    pub fn select(&self, preferred: FetchStrategy) -> &dyn Fetcher {
        match (preferred, &self.rendered_fetcher) {
            (FetchStrategy::Rendered, Some(rendered)) => rendered.as_ref(),
            _ => self.static_fetcher.as_ref(),
        }
    }

    pub fn rendered_available(&self) -> bool {
        self.rendered_fetcher.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(FetchStrategy);

    #[async_trait]
    impl Fetcher for Named {
        fn strategy(&self) -> FetchStrategy {
            self.0
        }

        async fn fetch(&self, request: &FetchRequest<'_>) -> Result<RawDocument, FetchError> {
            Ok(RawDocument {
                url: request.url.to_string(),
                html: String::new(),
                strategy: self.0,
            })
        }
    }

    fn form(query: &str) -> SearchForm {
        SearchForm {
            query: query.to_string(),
            input_selectors: vec!["input[type=\"text\"]".to_string()],
            submit_selectors: vec![],
            query_param: "query".to_string(),
        }
    }

    #[test]
    fn test_select_falls_back_to_static_without_rendered() {
        let set = FetcherSet::new(Arc::new(Named(FetchStrategy::Static)), None);
        assert_eq!(
            set.select(FetchStrategy::Rendered).strategy(),
            FetchStrategy::Static
        );
        assert!(!set.rendered_available());
    }

    #[test]
    fn test_select_uses_rendered_when_available() {
        let set = FetcherSet::new(
            Arc::new(Named(FetchStrategy::Static)),
            Some(Arc::new(Named(FetchStrategy::Rendered))),
        );
        assert_eq!(
            set.select(FetchStrategy::Rendered).strategy(),
            FetchStrategy::Rendered
        );
        assert_eq!(
            set.select(FetchStrategy::Static).strategy(),
            FetchStrategy::Static
        );
    }

    #[test]
    fn test_static_url_without_search() {
        let request = FetchRequest {
            url: "https://x.example/list",
            marker: None,
            search: None,
        };
        assert_eq!(request.static_url(), "https://x.example/list");
    }

    #[test]
    fn test_static_url_encodes_query() {
        let search = form("산업안전 중대재해");
        let request = FetchRequest {
            url: "https://x.example/search.do",
            marker: None,
            search: Some(&search),
        };
        assert_eq!(
            request.static_url(),
            "https://x.example/search.do?query=%EC%82%B0%EC%97%85%EC%95%88%EC%A0%84%20%EC%A4%91%EB%8C%80%EC%9E%AC%ED%95%B4"
        );

        let request = FetchRequest {
            url: "https://x.example/search.do?page=1",
            marker: None,
            search: Some(&search),
        };
        assert!(request.static_url().starts_with("https://x.example/search.do?page=1&query="));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Network {
            status: Some(503),
            message: "service unavailable".to_string(),
        };
        assert_eq!(err.to_string(), "network error (HTTP 503): service unavailable");

        let err = FetchError::Network {
            status: None,
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "network error: connection refused");
    }
}
