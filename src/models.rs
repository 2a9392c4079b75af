//! Data models for collected items and the per-run result set.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Category`]: The fixed set of five source categories
//! - [`Item`]: One normalized entry (title, raw date, optional link, source label)
//! - [`ResultSet`]: Category → ordered items for a single collection run
//! - [`CollectionReport`]: The export envelope written to disk
//!
//! Everything here serializes to plain nested key/value data so the result of
//! a run can be handed to a summarizer or written to a file as-is.

use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The category a source feeds into.
///
/// Each built-in source maps to exactly one category, so the category doubles
/// as the source identifier on the command line.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Category {
    /// Ministry of Employment and Labor press releases.
    PressRelease,
    /// Occupational safety portal notices.
    PortalNotice,
    /// Serious industrial accident alerts.
    MajorAccident,
    /// Labor newspaper "safety and health" section.
    LaborNews,
    /// Free-text search over a news archive.
    KeywordSearch,
}

impl Category {
    /// All categories in their canonical order.
    pub const ALL: [Category; 5] = [
        Category::PressRelease,
        Category::PortalNotice,
        Category::MajorAccident,
        Category::LaborNews,
        Category::KeywordSearch,
    ];

    /// Stable snake_case key used in exports and logs.
    pub fn key(self) -> &'static str {
        match self {
            Category::PressRelease => "press_release",
            Category::PortalNotice => "portal_notice",
            Category::MajorAccident => "major_accident",
            Category::LaborNews => "labor_news",
            Category::KeywordSearch => "keyword_search",
        }
    }

    /// Human-readable heading shown to readers of the digest.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::PressRelease => "고용노동부 보도자료",
            Category::PortalNotice => "산업안전포털 공지사항",
            Category::MajorAccident => "중대재해 발생알림",
            Category::LaborNews => "매일노동뉴스 안전과 건강",
            Category::KeywordSearch => "언론사 뉴스",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A single normalized entry collected from a source.
///
/// `title` is never empty. `date` is the raw text found on the page and is
/// not parsed. `link` is absent for categories without detail pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub source: String,
    pub category: Category,
}

/// Category → items for one collection run.
///
/// All five category keys are always present, possibly with empty lists.
/// Keys serialize in canonical category order, so two runs over the same
/// input produce byte-identical JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResultSet {
    categories: BTreeMap<Category, Vec<Item>>,
}

/// Missing categories come back as empty lists.
impl<'de> Deserialize<'de> for ResultSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let stored = BTreeMap::<Category, Vec<Item>>::deserialize(deserializer)?;
        let mut results = ResultSet::new();
        for (category, items) in stored {
            results.extend(category, items);
        }
        Ok(results)
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSet {
    /// Create a result set with every category present and empty.
    pub fn new() -> Self {
        Self {
            categories: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
        }
    }

    /// Append a source's items under its category, preserving their order.
    pub fn extend(&mut self, category: Category, items: Vec<Item>) {
        self.categories.entry(category).or_default().extend(items);
    }

    /// Items collected for `category`.
    pub fn items(&self, category: Category) -> &[Item] {
        self.categories
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate categories in canonical order together with their items.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Item])> {
        self.categories.iter().map(|(c, items)| (*c, items.as_slice()))
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.categories.keys().copied()
    }

    /// Total number of items across all categories.
    pub fn total(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Per-category counts.
    pub fn summary(&self) -> Summary {
        Summary {
            total: self.total(),
            by_category: self
                .categories
                .iter()
                .map(|(c, items)| (*c, items.len()))
                .collect(),
        }
    }

    /// Flatten into one record per item, in canonical category order.
    pub fn records(&self) -> Vec<&Item> {
        self.categories.values().flatten().collect()
    }
}

/// Item counts of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
}

/// Export envelope for a single collection run.
///
/// The [`ResultSet`] itself carries no timestamps; run metadata lives here.
#[derive(Debug, Serialize, Deserialize)]
pub struct CollectionReport {
    /// The date of collection in `YYYY-MM-DD` format.
    pub local_date: String,
    /// The local time the run finished.
    pub local_time: String,
    /// Whether the headless-browser strategy was available for this run.
    pub rendered_available: bool,
    pub summary: Summary,
    pub results: ResultSet,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, category: Category) -> Item {
        Item {
            title: title.to_string(),
            date: "2025.01.01".to_string(),
            link: None,
            source: "test".to_string(),
            category,
        }
    }

    #[test]
    fn test_new_result_set_has_all_categories() {
        let rs = ResultSet::new();
        let keys: Vec<Category> = rs.categories().collect();
        assert_eq!(keys, Category::ALL.to_vec());
        assert_eq!(rs.total(), 0);
    }

    #[test]
    fn test_extend_preserves_order() {
        let mut rs = ResultSet::new();
        rs.extend(
            Category::LaborNews,
            vec![item("a", Category::LaborNews), item("b", Category::LaborNews)],
        );
        rs.extend(Category::LaborNews, vec![item("c", Category::LaborNews)]);

        let titles: Vec<&str> = rs
            .items(Category::LaborNews)
            .iter()
            .map(|i| i.title.as_str())
            .collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
        assert!(rs.items(Category::PressRelease).is_empty());
    }

    #[test]
    fn test_result_set_serialization_keys() {
        let rs = ResultSet::new();
        let json = serde_json::to_string(&rs).unwrap();
        assert_eq!(
            json,
            r#"{"press_release":[],"portal_notice":[],"major_accident":[],"labor_news":[],"keyword_search":[]}"#
        );
    }

    #[test]
    fn test_item_without_link_omits_field() {
        let json = serde_json::to_string(&item("사고", Category::MajorAccident)).unwrap();
        assert!(!json.contains("link"));
        assert!(json.contains(r#""category":"major_accident""#));
    }

    #[test]
    fn test_summary_counts() {
        let mut rs = ResultSet::new();
        rs.extend(Category::PressRelease, vec![item("a", Category::PressRelease)]);
        rs.extend(
            Category::KeywordSearch,
            vec![item("b", Category::KeywordSearch), item("c", Category::KeywordSearch)],
        );
        let summary = rs.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.by_category[&Category::KeywordSearch], 2);
        assert_eq!(summary.by_category[&Category::MajorAccident], 0);
        assert_eq!(summary.by_category.len(), 5);
    }

    #[test]
    fn test_category_key_matches_serde() {
        for c in Category::ALL {
            let json = serde_json::to_string(&c).unwrap();
            assert_eq!(json, format!("\"{}\"", c.key()));
        }
    }

    #[test]
    fn test_deserialize_fills_missing_categories() {
        let rs: ResultSet = serde_json::from_str("{}").unwrap();
        assert_eq!(rs.categories().collect::<Vec<_>>(), Category::ALL.to_vec());

        let json = r#"{"labor_news":[{"title":"추락","date":"","source":"x","category":"labor_news"}]}"#;
        let rs: ResultSet = serde_json::from_str(json).unwrap();
        assert_eq!(rs.categories().count(), 5);
        assert_eq!(rs.items(Category::LaborNews).len(), 1);
        assert!(rs.items(Category::PressRelease).is_empty());
    }
}
