//! The built-in source table.
//!
//! | Category | Site | Strategy | Filter | Links |
//! |----------|------|----------|--------|-------|
//! | `press_release` | 고용노동부 보도자료 | Static | safety keywords | nested prefix |
//! | `portal_notice` | 산업안전포털 공지사항 | Rendered | none | site prefix |
//! | `major_accident` | 중대재해 발생알림 | Rendered | none | none |
//! | `labor_news` | 매일노동뉴스 안전과 건강 | Static | none | root or nested |
//! | `keyword_search` | BIG KINDS 뉴스 검색 | Rendered | safety keywords | site root |
//!
//! Selector cascades are tied to each site's current markup and are expected
//! to need updates when a site is redesigned.

use crate::config::Settings;
use crate::extract::FieldRules;
use crate::fetch::{FetchRequest, FetchStrategy, SearchForm};
use crate::models::Category;
use crate::normalize::{DatePolicy, LinkJoin, Relevance};

/// Default query for the keyword-search source.
pub const DEFAULT_SEARCH_QUERY: &str = "산업안전 중대재해";

/// Upper bound on nodes processed per source.
pub const MAX_ITEMS_CEILING: usize = 15;

/// Lowest `max_items` a settings override may ask for.
pub const MAX_ITEMS_FLOOR: usize = 5;

/// Static description of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub category: Category,
    pub label: String,
    pub url: String,
    pub strategy: FetchStrategy,
    /// Selector that signals a rendered page is ready.
    pub marker: Option<String>,
    pub search: Option<SearchForm>,
    pub cascade: Vec<String>,
    pub fields: FieldRules,
    pub link_join: LinkJoin,
    pub relevance: Relevance,
    pub date_policy: DatePolicy,
    pub max_items: usize,
}

impl SourceSpec {
    pub fn request(&self) -> FetchRequest<'_> {
        FetchRequest {
            url: &self.url,
            marker: self.marker.as_deref(),
            search: self.search.as_ref(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

const PRESS_KEYWORDS: &[&str] = &[
    "안전", "산재", "중대재해", "보건", "재해", "사고", "위험", "근로", "노동",
];

const SEARCH_KEYWORDS: &[&str] = &["안전", "산재", "중대재해", "재해", "사고", "보건", "위험"];

/// Ministry of Employment and Labor press releases.
pub fn press_release() -> SourceSpec {
    SourceSpec {
        category: Category::PressRelease,
        label: "고용노동부".to_string(),
        url: "https://www.moel.go.kr/news/enews/report/enewsList.do".to_string(),
        strategy: FetchStrategy::Static,
        marker: None,
        search: None,
        cascade: strings(&["table tbody tr", "table tr"]),
        fields: FieldRules {
            title: strings(&["td a", "a"]),
            date: strings(&["td:nth-last-child(2)", "td"]),
            min_cells: Some(4),
            ..FieldRules::default()
        },
        link_join: LinkJoin::Prefix("https://www.moel.go.kr/news/enews/report/".to_string()),
        relevance: Relevance::Keywords(strings(PRESS_KEYWORDS)),
        date_policy: DatePolicy::LeaveEmpty,
        max_items: MAX_ITEMS_CEILING,
    }
}

/// Occupational safety portal notices. The list is rendered client-side.
pub fn portal_notice() -> SourceSpec {
    SourceSpec {
        category: Category::PortalNotice,
        label: "산업안전포털".to_string(),
        url: "https://portal.kosha.or.kr/community/notice".to_string(),
        strategy: FetchStrategy::Rendered,
        marker: Some("table".to_string()),
        search: None,
        cascade: strings(&["table tbody tr", "table tr"]),
        fields: FieldRules {
            title: strings(&["td a", "a"]),
            date: strings(&["td:nth-last-child(2)", "td"]),
            date_max_chars: 15,
            min_cells: Some(3),
            ..FieldRules::default()
        },
        link_join: LinkJoin::Prefix("https://portal.kosha.or.kr".to_string()),
        relevance: Relevance::Any,
        date_policy: DatePolicy::LeaveEmpty,
        max_items: MAX_ITEMS_CEILING,
    }
}

/// Serious accident alerts. Cards have no detail links.
pub fn major_accident() -> SourceSpec {
    let cascade = strings(&[".card-list .card-item", "article", ".list-item", "[class*=\"card\"]"]);
    SourceSpec {
        category: Category::MajorAccident,
        label: "안전보건공단".to_string(),
        url: "https://portal.kosha.or.kr/archive/imprtnDsstrAlrame/CSADV50000/CSADV50000M02"
            .to_string(),
        strategy: FetchStrategy::Rendered,
        marker: Some(cascade.join(", ")),
        search: None,
        cascade,
        fields: FieldRules {
            title: strings(&[".card-title", "h3", "h4", ".title", "a"]),
            title_fallback_chars: Some(100),
            link: None,
            date: strings(&[".card-date", ".date", "time", "span"]),
            ..FieldRules::default()
        },
        link_join: LinkJoin::None,
        relevance: Relevance::Any,
        date_policy: DatePolicy::TodayIfMissing,
        max_items: 5,
    }
}

/// Daily Labor News, "safety and health" section.
pub fn labor_news() -> SourceSpec {
    SourceSpec {
        category: Category::LaborNews,
        label: "매일노동뉴스".to_string(),
        url: "https://www.labortoday.co.kr/news/articleList.html?sc_section_code=S1N7&view_type=sm"
            .to_string(),
        strategy: FetchStrategy::Static,
        marker: None,
        search: None,
        cascade: strings(&[
            ".article-list .article-item",
            "article",
            ".list-group .list-group-item",
            "table tbody tr",
            "table tr",
        ]),
        fields: FieldRules {
            title: strings(&[".article-title a", "a"]),
            date: strings(&[".article-date", "time", ".byline em", "td"]),
            ..FieldRules::default()
        },
        link_join: LinkJoin::RootOrNested {
            root: "https://www.labortoday.co.kr".to_string(),
            nested: "https://www.labortoday.co.kr/news/".to_string(),
        },
        relevance: Relevance::Any,
        date_policy: DatePolicy::LeaveEmpty,
        max_items: MAX_ITEMS_CEILING,
    }
}

/// Free-text search over the BIG KINDS news archive.
pub fn keyword_search(query: &str) -> SourceSpec {
    let cascade = strings(&[
        ".news-item",
        ".search-result-item",
        "article",
        ".list-item",
        "[class*=\"result\"]",
    ]);
    SourceSpec {
        category: Category::KeywordSearch,
        label: "Bigkinds".to_string(),
        url: "https://www.bigkinds.or.kr/v2/news/search.do".to_string(),
        strategy: FetchStrategy::Rendered,
        marker: Some(cascade.join(", ")),
        search: Some(SearchForm {
            query: query.to_string(),
            input_selectors: strings(&["input[type=\"text\"]", "#search-input"]),
            submit_selectors: strings(&["button[type=\"submit\"]", ".btn-search"]),
            query_param: "query".to_string(),
        }),
        cascade,
        fields: FieldRules {
            title: strings(&["h3", "h4", ".title", "a", "strong"]),
            min_title_chars: 11,
            date: strings(&[".date", "time", "span", ".info"]),
            date_max_chars: 15,
            publisher: strings(&[".source", ".press", ".media"]),
            ..FieldRules::default()
        },
        link_join: LinkJoin::RootOnly("https://www.bigkinds.or.kr".to_string()),
        relevance: Relevance::Keywords(strings(SEARCH_KEYWORDS)),
        date_policy: DatePolicy::TodayIfMissing,
        max_items: 10,
    }
}

/// The built-in spec for `category`.
pub fn builtin(category: Category, query: &str) -> SourceSpec {
    match category {
        Category::PressRelease => press_release(),
        Category::PortalNotice => portal_notice(),
        Category::MajorAccident => major_accident(),
        Category::LaborNews => labor_news(),
        Category::KeywordSearch => keyword_search(query),
    }
}

/// Specs for the requested categories, with settings overrides applied.
///
/// Categories disabled in the settings are dropped; duplicates are ignored.
pub fn enabled_specs(requested: &[Category], query: &str, settings: &Settings) -> Vec<SourceSpec> {
    let mut seen = Vec::new();
    requested
        .iter()
        .copied()
        .filter(|c| {
            let fresh = !seen.contains(c);
            seen.push(*c);
            fresh
        })
        .filter(|c| settings.source(*c).is_none_or(|o| o.enabled))
        .map(|c| {
            let mut spec = builtin(c, query);
            if let Some(over) = settings.source(c) {
                apply_override(&mut spec, over);
            }
            spec
        })
        .collect()
}

fn apply_override(spec: &mut SourceSpec, over: &crate::config::SourceOverride) {
    if let Some(max) = over.max_items {
        spec.max_items = max.clamp(MAX_ITEMS_FLOOR, MAX_ITEMS_CEILING);
    }
    if over.keywords.is_none() && over.extra_keywords.is_empty() {
        return;
    }
    let mut keywords = match (&over.keywords, &spec.relevance) {
        (Some(replacement), _) => replacement.clone(),
        (None, Relevance::Keywords(existing)) => existing.clone(),
        (None, Relevance::Any) => Vec::new(),
    };
    keywords.extend(over.extra_keywords.iter().cloned());
    spec.relevance = if keywords.is_empty() {
        Relevance::Any
    } else {
        Relevance::Keywords(keywords)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceOverride;
    use crate::extract::DEFAULT_DATE_MAX_CHARS;
    use scraper::Selector;

    fn all() -> Vec<SourceSpec> {
        Category::ALL
            .iter()
            .map(|c| builtin(*c, DEFAULT_SEARCH_QUERY))
            .collect()
    }

    #[test]
    fn test_builtin_categories_match() {
        for c in Category::ALL {
            assert_eq!(builtin(c, "q").category, c);
        }
    }

    #[test]
    fn test_builtin_selectors_parse() {
        for spec in all() {
            let fields = &spec.fields;
            let queries = spec
                .cascade
                .iter()
                .chain(&fields.title)
                .chain(&fields.date)
                .chain(&fields.publisher)
                .chain(fields.link.iter())
                .chain(spec.marker.iter());
            for query in queries {
                assert!(
                    Selector::parse(query).is_ok(),
                    "{}: bad selector {query}",
                    spec.category
                );
            }
        }
    }

    #[test]
    fn test_builtin_bounds() {
        for spec in all() {
            assert!((MAX_ITEMS_FLOOR..=MAX_ITEMS_CEILING).contains(&spec.max_items));
            assert!(spec.fields.date_max_chars <= DEFAULT_DATE_MAX_CHARS);
            assert!(!spec.cascade.is_empty());
            if spec.strategy == FetchStrategy::Rendered {
                assert!(spec.marker.is_some(), "{} has no marker", spec.category);
            }
        }
    }

    #[test]
    fn test_major_accident_has_no_links() {
        let spec = major_accident();
        assert_eq!(spec.link_join, LinkJoin::None);
        assert_eq!(spec.fields.link, None);
    }

    #[test]
    fn test_keyword_search_carries_query() {
        let spec = keyword_search("추락 사고");
        let form = spec.search.as_ref().unwrap();
        assert_eq!(form.query, "추락 사고");
        assert!(spec.request().static_url().contains("query=%EC%B6%94%EB%9D%BD"));
    }

    #[test]
    fn test_enabled_specs_dedup_and_disable() {
        let mut settings = Settings::default();
        settings.sources.insert(
            Category::LaborNews,
            SourceOverride {
                enabled: false,
                ..SourceOverride::default()
            },
        );
        let specs = enabled_specs(
            &[
                Category::PressRelease,
                Category::LaborNews,
                Category::PressRelease,
                Category::MajorAccident,
            ],
            DEFAULT_SEARCH_QUERY,
            &settings,
        );
        let categories: Vec<Category> = specs.iter().map(|s| s.category).collect();
        assert_eq!(categories, vec![Category::PressRelease, Category::MajorAccident]);
    }

    #[test]
    fn test_override_keywords_and_cap() {
        let mut settings = Settings::default();
        settings.sources.insert(
            Category::PressRelease,
            SourceOverride {
                max_items: Some(40),
                keywords: Some(vec!["안전".to_string()]),
                extra_keywords: vec!["질병".to_string()],
                ..SourceOverride::default()
            },
        );
        settings.sources.insert(
            Category::LaborNews,
            SourceOverride {
                extra_keywords: vec!["산재".to_string()],
                ..SourceOverride::default()
            },
        );
        let specs = enabled_specs(
            &[Category::PressRelease, Category::LaborNews],
            DEFAULT_SEARCH_QUERY,
            &settings,
        );
        assert_eq!(specs[0].max_items, MAX_ITEMS_CEILING);
        assert_eq!(
            specs[0].relevance,
            Relevance::Keywords(vec!["안전".to_string(), "질병".to_string()])
        );
        assert_eq!(
            specs[1].relevance,
            Relevance::Keywords(vec!["산재".to_string()])
        );
    }

    #[test]
    fn test_override_max_items_has_floor() {
        let mut settings = Settings::default();
        settings.sources.insert(
            Category::KeywordSearch,
            SourceOverride {
                max_items: Some(1),
                ..SourceOverride::default()
            },
        );
        let specs = enabled_specs(&[Category::KeywordSearch], DEFAULT_SEARCH_QUERY, &settings);
        assert_eq!(specs[0].max_items, MAX_ITEMS_FLOOR);
    }
}
