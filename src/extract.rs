//! Selector-cascade extraction of raw fields from a parsed page.
//!
//! A source lists several structural queries, most specific first, because
//! the sites change markup without notice. The first query that matches at
//! least one node wins and the rest are ignored. Each matched node is then
//! mined for a title, a link href and a date-looking string.
//!
//! Nothing in here fails as a whole. A page where no query matches yields an
//! empty [`Extraction`]; a node missing a required field is recorded in
//! [`Extraction::skipped`] and the next node is processed.

use crate::utils::{collapse_whitespace, truncate_chars};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Dates are short; anything longer is body text that happens to contain a dot.
pub const DEFAULT_DATE_MAX_CHARS: usize = 20;

/// How to pull fields out of one matched node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRules {
    /// Candidate sub-queries for the title, tried in order.
    pub title: Vec<String>,
    /// Prefer the first candidate with at least this many characters; if
    /// none is that long, the last non-empty one. Zero accepts the first
    /// non-empty candidate.
    pub min_title_chars: usize,
    /// When no candidate yields text, use this many characters of the node's
    /// own text instead.
    pub title_fallback_chars: Option<usize>,
    /// Anchor query for the link; `None` for sources without detail pages.
    pub link: Option<String>,
    /// Candidate sub-queries for the date, tried in order.
    pub date: Vec<String>,
    /// A date candidate must be strictly shorter than this.
    pub date_max_chars: usize,
    /// Table rows with fewer `td` cells are skipped.
    pub min_cells: Option<usize>,
    /// Candidate sub-queries for a per-item publisher name.
    pub publisher: Vec<String>,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self {
            title: vec!["a".to_string()],
            min_title_chars: 0,
            title_fallback_chars: None,
            link: Some("a[href]".to_string()),
            date: Vec::new(),
            date_max_chars: DEFAULT_DATE_MAX_CHARS,
            min_cells: None,
            publisher: Vec::new(),
        }
    }
}

/// Fields found in one node, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFields {
    pub title: String,
    pub href: Option<String>,
    pub date: Option<String>,
    pub publisher: Option<String>,
}

/// Why a single node was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldMissing {
    #[error("no title text")]
    NoTitle,
    #[error("row has {found} cells, need {required}")]
    TooFewCells { found: usize, required: usize },
}

/// Outcome of running a cascade over one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Index of the query that matched, `None` when the cascade was exhausted.
    pub matched: Option<usize>,
    /// Fields of every usable node, in document order.
    pub fields: Vec<RawFields>,
    /// Node position (within the matches) and cause for every skipped node.
    pub skipped: Vec<(usize, FieldMissing)>,
}

impl Extraction {
    /// No query matched anything on the page.
    pub fn is_exhausted(&self) -> bool {
        self.matched.is_none()
    }
}

fn parse_selector(query: &str) -> Option<Selector> {
    match Selector::parse(query) {
        Ok(selector) => Some(selector),
        Err(e) => {
            warn!(%query, error = %e, "Invalid selector; skipping");
            None
        }
    }
}

/// Inline text of an element, whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// Block text of a node, with text runs separated by spaces.
fn node_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Heuristic: short and contains a date separator.
pub fn looks_like_date(text: &str, max_chars: usize) -> bool {
    !text.is_empty()
        && text.chars().count() < max_chars
        && text.contains(['.', '-', '/'])
}

/// Run `cascade` against `doc` and extract fields from at most `limit` nodes.
pub fn extract(doc: &Html, cascade: &[String], rules: &FieldRules, limit: usize) -> Extraction {
    for (index, query) in cascade.iter().enumerate() {
        let Some(selector) = parse_selector(query) else {
            continue;
        };
        let nodes: Vec<ElementRef<'_>> = doc.select(&selector).take(limit).collect();
        if nodes.is_empty() {
            debug!(%query, "Cascade query matched nothing");
            continue;
        }

        debug!(%query, nodes = nodes.len(), "Cascade query matched");
        let mut extraction = Extraction {
            matched: Some(index),
            ..Extraction::default()
        };
        for (position, node) in nodes.into_iter().enumerate() {
            match extract_node(node, rules) {
                Ok(fields) => extraction.fields.push(fields),
                Err(missing) => {
                    debug!(position, reason = %missing, "Skipping node");
                    extraction.skipped.push((position, missing));
                }
            }
        }
        return extraction;
    }

    Extraction::default()
}

/// Extract fields from a single matched node.
pub fn extract_node(node: ElementRef<'_>, rules: &FieldRules) -> Result<RawFields, FieldMissing> {
    if let Some(required) = rules.min_cells {
        let found = count_cells(node);
        if found < required {
            return Err(FieldMissing::TooFewCells { found, required });
        }
    }

    let title = extract_title(node, rules).ok_or(FieldMissing::NoTitle)?;
    let href = rules.link.as_deref().and_then(|query| extract_href(node, query));
    let date = extract_date(node, rules);
    let publisher = first_text(node, &rules.publisher);

    Ok(RawFields {
        title,
        href,
        date,
        publisher,
    })
}

fn count_cells(node: ElementRef<'_>) -> usize {
    Selector::parse("td")
        .map(|td| node.select(&td).count())
        .unwrap_or(0)
}

fn extract_title(node: ElementRef<'_>, rules: &FieldRules) -> Option<String> {
    // Latest short candidate, used when none reaches `min_title_chars`.
    let mut short = None;
    for query in &rules.title {
        let Some(selector) = parse_selector(query) else {
            continue;
        };
        let Some(text) = node.select(&selector).next().map(element_text) else {
            continue;
        };
        if text.is_empty() {
            continue;
        }
        if text.chars().count() >= rules.min_title_chars {
            return Some(text);
        }
        short = Some(text);
    }

    short.or_else(|| {
        let max = rules.title_fallback_chars?;
        let text = truncate_chars(&node_text(node), max);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    })
}

fn extract_href(node: ElementRef<'_>, query: &str) -> Option<String> {
    if node.value().name() == "a" {
        if let Some(href) = node.value().attr("href") {
            return Some(href.trim().to_string());
        }
    }
    let selector = parse_selector(query)?;
    node.select(&selector)
        .find_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
}

fn extract_date(node: ElementRef<'_>, rules: &FieldRules) -> Option<String> {
    for query in &rules.date {
        let Some(selector) = parse_selector(query) else {
            continue;
        };
        if let Some(text) = node
            .select(&selector)
            .map(element_text)
            .find(|text| looks_like_date(text, rules.date_max_chars))
        {
            return Some(text);
        }
    }
    None
}

fn first_text(node: ElementRef<'_>, queries: &[String]) -> Option<String> {
    queries.iter().find_map(|query| {
        let selector = parse_selector(query)?;
        node.select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE_PAGE: &str = r#"
        <html><body>
          <table>
            <thead><tr><th>번호</th><th>제목</th><th>날짜</th><th>조회</th></tr></thead>
            <tbody>
              <tr><td>2</td><td><a href="/n/1"> 공장 안전
                  점검 </a></td><td>2025.01.01</td><td>10</td></tr>
              <tr><td>1</td><td><a href="/n/2">임금 협상</a></td><td>2025.01.02</td><td>5</td></tr>
              <tr><td colspan="4">공지 없음</td></tr>
            </tbody>
          </table>
        </body></html>
    "#;

    const CARD_PAGE: &str = r#"
        <html><body>
          <div class="card-list">
            <div class="card-item"><h4>경기 화성 추락 사고</h4><span>2025-03-04</span></div>
            <div class="card-item"><p>서울 끼임 사고 발생</p></div>
            <div class="card-item"></div>
          </div>
        </body></html>
    "#;

    fn cascade(queries: &[&str]) -> Vec<String> {
        queries.iter().map(|q| q.to_string()).collect()
    }

    fn table_rules() -> FieldRules {
        FieldRules {
            date: vec!["td".to_string()],
            min_cells: Some(3),
            ..FieldRules::default()
        }
    }

    #[test]
    fn test_first_matching_query_wins() {
        let doc = Html::parse_document(TABLE_PAGE);
        let rules = table_rules();

        let full = extract(
            &doc,
            &cascade(&[".article-list li", "table tbody tr", "tr"]),
            &rules,
            15,
        );
        let alone = extract(&doc, &cascade(&["table tbody tr"]), &rules, 15);

        assert_eq!(full.matched, Some(1));
        assert_eq!(alone.matched, Some(0));
        assert_eq!(full.fields, alone.fields);
        assert_eq!(full.skipped, alone.skipped);
    }

    #[test]
    fn test_table_rows_extracted_in_document_order() {
        let doc = Html::parse_document(TABLE_PAGE);
        let extraction = extract(&doc, &cascade(&["table tbody tr"]), &table_rules(), 15);

        assert_eq!(extraction.fields.len(), 2);
        assert_eq!(extraction.fields[0].title, "공장 안전 점검");
        assert_eq!(extraction.fields[0].href.as_deref(), Some("/n/1"));
        assert_eq!(extraction.fields[0].date.as_deref(), Some("2025.01.01"));
        assert_eq!(extraction.fields[1].title, "임금 협상");
        assert_eq!(
            extraction.skipped,
            vec![(2, FieldMissing::TooFewCells { found: 1, required: 3 })]
        );
    }

    #[test]
    fn test_exhausted_cascade_is_empty() {
        let doc = Html::parse_document(TABLE_PAGE);
        let extraction = extract(&doc, &cascade(&[".news-item", "article"]), &table_rules(), 15);
        assert!(extraction.is_exhausted());
        assert!(extraction.fields.is_empty());
    }

    #[test]
    fn test_invalid_selector_is_skipped() {
        let doc = Html::parse_document(TABLE_PAGE);
        let extraction = extract(&doc, &cascade(&["[[[", "table tbody tr"]), &table_rules(), 15);
        assert_eq!(extraction.matched, Some(1));
        assert_eq!(extraction.fields.len(), 2);
    }

    #[test]
    fn test_limit_caps_processed_nodes() {
        let doc = Html::parse_document(TABLE_PAGE);
        let extraction = extract(&doc, &cascade(&["table tbody tr"]), &table_rules(), 1);
        assert_eq!(extraction.fields.len(), 1);
        assert!(extraction.skipped.is_empty());
    }

    #[test]
    fn test_card_title_candidates_and_fallback() {
        let doc = Html::parse_document(CARD_PAGE);
        let rules = FieldRules {
            title: cascade(&[".card-title", "h3", "h4", ".title"]),
            title_fallback_chars: Some(100),
            link: None,
            date: cascade(&[".card-date", ".date", "time", "span"]),
            ..FieldRules::default()
        };
        let extraction = extract(&doc, &cascade(&[".card-list .card-item", "article"]), &rules, 5);

        assert_eq!(extraction.fields.len(), 2);
        assert_eq!(extraction.fields[0].title, "경기 화성 추락 사고");
        assert_eq!(extraction.fields[0].date.as_deref(), Some("2025-03-04"));
        assert_eq!(extraction.fields[0].href, None);
        assert_eq!(extraction.fields[1].title, "서울 끼임 사고 발생");
        assert_eq!(extraction.fields[1].date, None);
        assert_eq!(extraction.skipped, vec![(2, FieldMissing::NoTitle)]);
    }

    #[test]
    fn test_min_title_chars_prefers_meaningful_title() {
        let html = r#"<div class="news-item"><h3>속보</h3><a href="/v/9">건설현장 추락 사망사고 잇따라</a>
            <span class="press">한겨레</span><span class="date">2025/02/03</span></div>"#;
        let doc = Html::parse_document(html);
        let rules = FieldRules {
            title: cascade(&["h3", "h4", ".title", "a", "strong"]),
            min_title_chars: 11,
            date: cascade(&[".date", "time", "span"]),
            publisher: cascade(&[".source", ".press", ".media"]),
            ..FieldRules::default()
        };
        let fields = extract(&doc, &cascade(&[".news-item"]), &rules, 10).fields;
        assert_eq!(fields[0].title, "건설현장 추락 사망사고 잇따라");
        assert_eq!(fields[0].href.as_deref(), Some("/v/9"));
        assert_eq!(fields[0].publisher.as_deref(), Some("한겨레"));
        assert_eq!(fields[0].date.as_deref(), Some("2025/02/03"));
    }

    #[test]
    fn test_short_title_used_when_nothing_longer() {
        let doc = Html::parse_document(r#"<article><h3>속보</h3></article>"#);
        let rules = FieldRules {
            title: cascade(&["h3", "a"]),
            min_title_chars: 11,
            ..FieldRules::default()
        };
        let fields = extract(&doc, &cascade(&["article"]), &rules, 10).fields;
        assert_eq!(fields[0].title, "속보");
        assert_eq!(fields[0].href, None);
    }

    #[test]
    fn test_latest_short_title_wins_when_none_is_long_enough() {
        let doc = Html::parse_document(
            r#"<article><h3>속보</h3><a href="/v/2">추락 사고</a><strong>단독</strong></article>"#,
        );
        let rules = FieldRules {
            title: cascade(&["h3", "h4", ".title", "a", "strong"]),
            min_title_chars: 11,
            ..FieldRules::default()
        };
        let fields = extract(&doc, &cascade(&["article"]), &rules, 10).fields;
        assert_eq!(fields[0].title, "단독");
        assert_eq!(fields[0].href.as_deref(), Some("/v/2"));
    }

    #[test]
    fn test_anchor_node_is_its_own_link() {
        let doc = Html::parse_document(
            r#"<ul><li><a class="t" href="view?id=3">추락 사고</a></li></ul>"#,
        );
        let rules = FieldRules {
            title: cascade(&["*"]),
            title_fallback_chars: Some(50),
            ..FieldRules::default()
        };
        let fields = extract(&doc, &cascade(&["a.t"]), &rules, 10).fields;
        assert_eq!(fields[0].href.as_deref(), Some("view?id=3"));
        assert_eq!(fields[0].title, "추락 사고");
    }

    #[test]
    fn test_looks_like_date() {
        assert!(looks_like_date("2025.01.01", DEFAULT_DATE_MAX_CHARS));
        assert!(looks_like_date("2025-01-01 10:00", DEFAULT_DATE_MAX_CHARS));
        assert!(looks_like_date("01/02", DEFAULT_DATE_MAX_CHARS));
        assert!(!looks_like_date("조회 120", DEFAULT_DATE_MAX_CHARS));
        assert!(!looks_like_date("", DEFAULT_DATE_MAX_CHARS));
        assert!(!looks_like_date("2025.01.01", 10));
        assert!(!looks_like_date(
            "산업안전보건법 시행령 개정안 입법예고 안내.",
            DEFAULT_DATE_MAX_CHARS
        ));
    }
}
