//! Per-source fetch → extract → normalize chain.
//!
//! [`SourceRunner::run`] is the isolation boundary: whatever goes wrong for a
//! source (fetch error, no matching selector, every node malformed) ends here
//! as an empty item list and a log line. Nothing is propagated upward.

use crate::extract::extract;
use crate::fetch::{FetchError, FetchStrategy, FetcherSet, RawDocument};
use crate::models::Item;
use crate::normalize::{NormalizeRules, normalize};
use crate::sources::SourceSpec;
use crate::utils::truncate_for_log;
use itertools::Itertools;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

/// Why a source contributed nothing.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{strategy} fetch failed: {source}")]
    Fetch {
        strategy: FetchStrategy,
        #[source]
        source: FetchError,
    },
    #[error("no selector in the cascade matched")]
    ExtractionEmpty,
}

pub struct SourceRunner {
    fetchers: FetcherSet,
    today: String,
}

impl SourceRunner {
    /// `today` is the run's local date, used for sources that default
    /// missing dates.
    pub fn new(fetchers: FetcherSet, today: impl Into<String>) -> Self {
        Self {
            fetchers,
            today: today.into(),
        }
    }

    /// Collect items for `spec`. Never fails; failures yield an empty list.
    #[instrument(level = "info", skip_all, fields(category = %spec.category, source = %spec.label))]
    pub async fn run(&self, spec: &SourceSpec) -> Vec<Item> {
        match self.try_run(spec).await {
            Ok(items) => {
                info!(count = items.len(), "Collected items");
                items
            }
            Err(SourceError::ExtractionEmpty) => {
                warn!(url = %spec.url, "No content found on page");
                Vec::new()
            }
            Err(e) => {
                error!(error = %e, url = %spec.url, "Source failed; skipping");
                Vec::new()
            }
        }
    }

    /// The fallible chain behind [`SourceRunner::run`].
    pub async fn try_run(&self, spec: &SourceSpec) -> Result<Vec<Item>, SourceError> {
        let fetcher = self.fetchers.select(spec.strategy);
        let strategy = fetcher.strategy();
        if strategy != spec.strategy {
            info!(
                preferred = %spec.strategy,
                using = %strategy,
                "Rendered strategy unavailable; falling back"
            );
        }

        let doc = fetcher
            .fetch(&spec.request())
            .await
            .map_err(|source| SourceError::Fetch { strategy, source })?;
        debug!(
            url = %doc.url,
            strategy = %doc.strategy,
            bytes = doc.html.len(),
            "Fetched page"
        );

        collect_items(&doc, spec, &self.today)
    }
}

/// Extract and normalize the items of an already fetched page.
///
/// Items keep document order; repeated `(title, link)` pairs keep the first.
pub fn collect_items(
    doc: &RawDocument,
    spec: &SourceSpec,
    today: &str,
) -> Result<Vec<Item>, SourceError> {
    let html = doc.parse();
    let extraction = extract(&html, &spec.cascade, &spec.fields, spec.max_items);
    if extraction.is_exhausted() {
        debug!(
            url = %doc.url,
            preview = %truncate_for_log(&doc.html, 300),
            "No cascade query matched"
        );
        return Err(SourceError::ExtractionEmpty);
    }
    debug!(
        query = ?extraction.matched.and_then(|i| spec.cascade.get(i)),
        extracted = extraction.fields.len(),
        skipped = extraction.skipped.len(),
        "Extraction finished"
    );

    let rules = NormalizeRules {
        link_join: &spec.link_join,
        relevance: &spec.relevance,
        date_policy: spec.date_policy,
        category: spec.category,
        source_label: &spec.label,
        today,
    };
    let items: Vec<Item> = extraction
        .fields
        .iter()
        .filter_map(|raw| normalize(raw, &rules))
        .unique_by(|item| (item.title.clone(), item.link.clone()))
        .collect();

    let filtered = extraction.fields.len() - items.len();
    if filtered > 0 {
        debug!(filtered, "Dropped irrelevant or duplicate items");
    }
    Ok(items)
}
