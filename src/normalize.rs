//! Turning raw extracted fields into canonical [`Item`]s.
//!
//! Link joining is per source: each site builds its detail URLs differently,
//! so a [`LinkJoin`] rule travels with the source instead of one global
//! resolution scheme.

use crate::extract::RawFields;
use crate::models::{Category, Item};
use crate::utils::collapse_whitespace;
use serde::{Deserialize, Serialize};
use url::Url;

/// How a relative href becomes an absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkJoin {
    /// Concatenate `base` and the href, whatever its shape.
    Prefix(String),
    /// `root` for `/`-leading hrefs, `nested` for everything else.
    RootOrNested { root: String, nested: String },
    /// `root` for `/`-leading hrefs; other relative hrefs yield no link.
    RootOnly(String),
    /// The source has no detail pages.
    None,
}

impl LinkJoin {
    /// Resolve `href` to an absolute URL, or `None` when it cannot be linked.
    pub fn resolve(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || matches!(self, LinkJoin::None) {
            return None;
        }
        if let Ok(url) = Url::parse(href) {
            return matches!(url.scheme(), "http" | "https").then(|| href.to_string());
        }
        match self {
            LinkJoin::Prefix(base) => Some(format!("{base}{href}")),
            LinkJoin::RootOrNested { root, nested } => {
                if href.starts_with('/') {
                    Some(format!("{root}{href}"))
                } else {
                    Some(format!("{nested}{href}"))
                }
            }
            LinkJoin::RootOnly(root) => href.starts_with('/').then(|| format!("{root}{href}")),
            LinkJoin::None => None,
        }
    }
}

/// Which items a source keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relevance {
    Any,
    /// Keep titles containing at least one keyword (case-sensitive substring).
    Keywords(Vec<String>),
}

impl Relevance {
    pub fn accepts(&self, title: &str) -> bool {
        match self {
            Relevance::Any => true,
            Relevance::Keywords(keywords) => keywords.iter().any(|k| title.contains(k.as_str())),
        }
    }
}

/// What to put in `date` when the page had none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    LeaveEmpty,
    TodayIfMissing,
}

/// Per-source normalization parameters.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeRules<'a> {
    pub link_join: &'a LinkJoin,
    pub relevance: &'a Relevance,
    pub date_policy: DatePolicy,
    pub category: Category,
    pub source_label: &'a str,
    /// Local date of the run, used by [`DatePolicy::TodayIfMissing`].
    pub today: &'a str,
}

/// Build an [`Item`] from raw fields, or `None` if it must be discarded.
pub fn normalize(raw: &RawFields, rules: &NormalizeRules<'_>) -> Option<Item> {
    let title = collapse_whitespace(&raw.title);
    if title.is_empty() {
        return None;
    }

    let link = raw.href.as_deref().and_then(|href| rules.link_join.resolve(href));

    if !rules.relevance.accepts(&title) {
        return None;
    }

    let date = raw.date.as_deref().map(str::trim).unwrap_or_default();
    let date = match (date.is_empty(), rules.date_policy) {
        (true, DatePolicy::TodayIfMissing) => rules.today.to_string(),
        _ => date.to_string(),
    };

    let source = raw
        .publisher
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(rules.source_label)
        .to_string();

    Some(Item {
        title,
        date,
        link,
        source,
        category: rules.category,
    })
}
