//! Headless-browser fetching.
//!
//! Each fetch launches its own Chromium process with a throwaway profile
//! directory, navigates, optionally submits a search form, waits for the
//! source's readiness marker and returns the rendered DOM as HTML.
//!
//! Navigation is done when the document has been parsed (`readyState` is no
//! longer `loading`); slow images and late scripts do not count against the
//! navigation timeout. After a search submit the page gets a short settle
//! window to replace its document before the marker is looked for, so a
//! marker already present on the landing page is not mistaken for results.
//!
//! # Teardown
//!
//! The session is closed explicitly once the page has been read, whatever the
//! outcome. If the fetch future is dropped instead (run deadline, panic in a
//! sibling branch), the [`Session`] drop guard aborts the CDP event loop and
//! the browser handle kills its child process.
//!
//! Without the `browser` cargo feature this module only provides a probe that
//! reports the capability as missing.

use super::{FetchError, FetchRequest, FetchStrategy, Fetcher, RawDocument};
use crate::config::FetchSettings;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

pub struct RenderedFetcher {
    #[cfg_attr(not(feature = "browser"), allow(dead_code))]
    user_agent: String,
    navigation_timeout: Duration,
    marker_timeout: Duration,
}

impl RenderedFetcher {
    pub fn new(settings: &FetchSettings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            navigation_timeout: settings.navigation_timeout(),
            marker_timeout: settings.marker_timeout(),
        }
    }
}

/// Run a navigation step, failing with [`FetchError::NavigationTimeout`]
/// when it takes longer than `limit`.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) async fn within_navigation<T, F>(limit: Duration, step: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match timeout(limit, step).await {
        Ok(outcome) => outcome,
        Err(_) => Err(FetchError::NavigationTimeout(limit)),
    }
}

/// Wait for `marker` to show up, failing with [`FetchError::MarkerNotFound`]
/// when `wait` does not finish within `limit`.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) async fn within_marker_wait<F>(
    limit: Duration,
    marker: &str,
    wait: F,
) -> Result<(), FetchError>
where
    F: Future<Output = ()>,
{
    timeout(limit, wait)
        .await
        .map_err(|_| FetchError::MarkerNotFound {
            marker: marker.to_string(),
            timeout: limit,
        })
}

#[cfg(feature = "browser")]
mod session {
    use super::super::{FetchError, SearchForm};
    use chromiumoxide::Page;
    use chromiumoxide::browser::{Browser, BrowserConfig};
    use futures::StreamExt;
    use rand::Rng;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::task::JoinHandle;
    use tokio::time::{sleep, timeout};
    use tracing::{debug, warn};

    const POLL: Duration = Duration::from_millis(250);

    /// How long a submitted search may take to replace the landing page.
    pub(super) const SEARCH_SETTLE: Duration = Duration::from_secs(3);

    /// Set on the pre-submit document; a fresh document does not have it.
    const STALE_FLAG: &str = "window.__safetyNewsStale = true";

    const NAVIGATED: &str =
        "document.URL !== 'about:blank' && document.readyState !== 'loading'";

    const REPLACED: &str = "window.__safetyNewsStale !== true && document.readyState !== 'loading'";

    pub(super) fn browser_err(e: impl std::fmt::Display) -> FetchError {
        FetchError::Browser(e.to_string())
    }

    /// One isolated browser process plus its event loop.
    pub(super) struct Session {
        pub browser: Browser,
        handler: JoinHandle<()>,
        profile_dir: PathBuf,
    }

    impl Session {
        pub async fn launch(user_agent: &str) -> Result<Self, FetchError> {
            let nonce: u64 = rand::rng().random();
            let profile_dir = std::env::temp_dir().join(format!("safety-news-{nonce:016x}"));
            let config = BrowserConfig::builder()
                .user_data_dir(&profile_dir)
                .arg(format!("--user-agent={user_agent}"))
                .build()
                .map_err(FetchError::Browser)?;

            let (browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });
            debug!(profile = %profile_dir.display(), "Browser session launched");

            Ok(Self {
                browser,
                handler,
                profile_dir,
            })
        }

        pub async fn close(mut self) {
            if let Err(e) = self.browser.close().await {
                warn!(error = %e, "Browser close failed; process will be killed");
            }
            let _ = self.browser.wait().await;
            debug!("Browser session closed");
        }
    }

    impl Drop for Session {
        fn drop(&mut self) {
            self.handler.abort();
            let _ = std::fs::remove_dir_all(&self.profile_dir);
        }
    }

    /// Evaluate a boolean expression; script errors (e.g. a context torn down
    /// mid-navigation) read as `false`.
    async fn holds(page: &Page, expression: &str) -> bool {
        match page.evaluate(expression).await {
            Ok(result) => result.into_value::<bool>().unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Start navigating away from `about:blank` and return once the new
    /// document has been parsed. Unbounded; callers add the timeout.
    pub(super) async fn navigate(page: &Page, url: &str) -> Result<(), FetchError> {
        let target = serde_json::to_string(url).map_err(browser_err)?;
        if let Err(e) = page.evaluate(format!("window.location.assign({target})")).await {
            debug!(error = %e, "Navigation script interrupted; waiting for the document");
        }
        while !holds(page, NAVIGATED).await {
            sleep(POLL).await;
        }
        Ok(())
    }

    pub(super) async fn submit_search(page: &Page, form: &SearchForm) -> Result<(), FetchError> {
        let mut input = None;
        for selector in &form.input_selectors {
            if let Ok(element) = page.find_element(selector.as_str()).await {
                input = Some(element);
                break;
            }
        }
        let input = input.ok_or_else(|| FetchError::Browser("no search input found".to_string()))?;
        input
            .click()
            .await
            .map_err(browser_err)?
            .type_str(&form.query)
            .await
            .map_err(browser_err)?;

        page.evaluate(STALE_FLAG).await.map_err(browser_err)?;

        for selector in &form.submit_selectors {
            if let Ok(button) = page.find_element(selector.as_str()).await {
                button.click().await.map_err(browser_err)?;
                return Ok(());
            }
        }
        input.press_key("Enter").await.map_err(browser_err)?;
        Ok(())
    }

    /// Give a submitted search up to [`SEARCH_SETTLE`] to swap in a new
    /// document. In-place (scripted) result updates use the whole window.
    pub(super) async fn settle_after_submit(page: &Page) {
        let replaced = timeout(SEARCH_SETTLE, async {
            while !holds(page, REPLACED).await {
                sleep(POLL).await;
            }
        })
        .await;
        debug!(replaced = replaced.is_ok(), "Search submit settled");
    }

    pub(super) async fn wait_for_marker(page: &Page, marker: &str) {
        loop {
            if page.find_element(marker).await.is_ok() {
                return;
            }
            sleep(POLL).await;
        }
    }
}

#[cfg(feature = "browser")]
impl RenderedFetcher {
    async fn drive(
        &self,
        browser: &chromiumoxide::Browser,
        request: &FetchRequest<'_>,
    ) -> Result<RawDocument, FetchError> {
        use session::{browser_err, navigate, settle_after_submit, submit_search, wait_for_marker};

        let page = browser.new_page("about:blank").await.map_err(browser_err)?;
        within_navigation(self.navigation_timeout, navigate(&page, request.url)).await?;

        let submitted = match request.search {
            Some(form) => {
                submit_search(&page, form).await?;
                true
            }
            None => false,
        };

        match request.marker {
            Some(marker) => {
                within_marker_wait(self.marker_timeout, marker, async {
                    if submitted {
                        settle_after_submit(&page).await;
                    }
                    wait_for_marker(&page, marker).await;
                })
                .await?
            }
            None if submitted => {
                let _ = timeout(self.marker_timeout, settle_after_submit(&page)).await;
            }
            None => {}
        }

        let html = page.content().await.map_err(browser_err)?;
        Ok(RawDocument {
            url: request.url.to_string(),
            html,
            strategy: FetchStrategy::Rendered,
        })
    }
}

#[async_trait]
impl Fetcher for RenderedFetcher {
    fn strategy(&self) -> FetchStrategy {
        FetchStrategy::Rendered
    }

    #[cfg(feature = "browser")]
    #[tracing::instrument(level = "info", skip_all, fields(url = %request.url))]
    async fn fetch(&self, request: &FetchRequest<'_>) -> Result<RawDocument, FetchError> {
        let session = session::Session::launch(&self.user_agent).await?;
        let outcome = self.drive(&session.browser, request).await;
        session.close().await;
        if let Ok(doc) = &outcome {
            tracing::info!(bytes = doc.html.len(), "Rendered page");
        }
        outcome
    }

    #[cfg(not(feature = "browser"))]
    async fn fetch(&self, _request: &FetchRequest<'_>) -> Result<RawDocument, FetchError> {
        Err(FetchError::Browser(format!(
            "built without the `browser` feature (navigation {:?}, marker {:?})",
            self.navigation_timeout, self.marker_timeout
        )))
    }
}

/// Check once whether a headless browser can be started here.
#[cfg(feature = "browser")]
pub async fn probe(settings: &FetchSettings) -> bool {
    use tracing::warn;

    match timeout(
        settings.probe_timeout(),
        session::Session::launch(&settings.user_agent),
    )
    .await
    {
        Ok(Ok(session)) => {
            session.close().await;
            true
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Headless browser unavailable; rendered sources will use static fetch");
            false
        }
        Err(_) => {
            warn!("Headless browser probe timed out; rendered sources will use static fetch");
            false
        }
    }
}

#[cfg(not(feature = "browser"))]
pub async fn probe(_settings: &FetchSettings) -> bool {
    tracing::info!("Built without the `browser` feature; rendered sources will use static fetch");
    false
}
