//! JSON export of a collection run.
//!
//! # Output Structure
//!
//! Files are organized by collection date:
//! ```text
//! output_dir/
//! └── 2025-05-06/
//!     ├── results.json   # CollectionReport: metadata + category → items
//!     └── items.json     # one flat record per item
//! ```
//!
//! Re-running on the same day overwrites that day's files.

use crate::models::{Category, CollectionReport};
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use tokio::fs;
use tracing::{error, info, instrument};

/// One item with its category spelled out, for flat consumers.
#[derive(Debug, Serialize)]
pub struct ItemRecord<'a> {
    pub category: Category,
    pub title: &'a str,
    pub date: &'a str,
    pub link: Option<&'a str>,
    pub source: &'a str,
}

/// Flatten a report's results into records.
pub fn records(report: &CollectionReport) -> Vec<ItemRecord<'_>> {
    report
        .results
        .records()
        .into_iter()
        .map(|item| ItemRecord {
            category: item.category,
            title: &item.title,
            date: &item.date,
            link: item.link.as_deref(),
            source: &item.source,
        })
        .collect()
}

/// Create `{output_dir}/{local_date}` and return its path.
pub async fn dated_dir(output_dir: &str, local_date: &str) -> Result<PathBuf, Box<dyn Error>> {
    let dir = PathBuf::from(output_dir).join(local_date);
    info!(dir = %dir.display(), "Ensuring output directory exists");
    if let Err(e) = fs::create_dir_all(&dir).await {
        error!(dir = %dir.display(), error = %e, "Failed to create output dir");
        return Err(e.into());
    }
    Ok(dir)
}

/// Write `results.json` and `items.json` for a run.
///
/// Returns the paths written.
#[instrument(level = "info", skip_all, fields(%output_dir, date = %report.local_date))]
pub async fn write_report(
    report: &CollectionReport,
    output_dir: &str,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let dir = dated_dir(output_dir, &report.local_date).await?;

    let results_path = dir.join("results.json");
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&results_path, json).await?;
    info!(path = %results_path.display(), "Wrote results JSON");

    let items_path = dir.join("items.json");
    let json = serde_json::to_string_pretty(&records(report))?;
    fs::write(&items_path, json).await?;
    info!(path = %items_path.display(), records = report.results.total(), "Wrote item records");

    Ok(vec![results_path, items_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Item, ResultSet};

    fn report() -> CollectionReport {
        let mut results = ResultSet::new();
        results.extend(
            Category::MajorAccident,
            vec![Item {
                title: "추락 사고".to_string(),
                date: "2025.05.03".to_string(),
                link: None,
                source: "안전보건공단".to_string(),
                category: Category::MajorAccident,
            }],
        );
        results.extend(
            Category::PressRelease,
            vec![Item {
                title: "공장 안전 점검".to_string(),
                date: "2025.01.01".to_string(),
                link: Some("https://x.example/n/1".to_string()),
                source: "고용노동부".to_string(),
                category: Category::PressRelease,
            }],
        );
        CollectionReport {
            local_date: "2025-05-06".to_string(),
            local_time: "09:00:00".to_string(),
            rendered_available: false,
            summary: results.summary(),
            results,
        }
    }

    #[test]
    fn test_records_follow_category_order() {
        let report = report();
        let records = records(&report);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, Category::PressRelease);
        assert_eq!(records[1].category, Category::MajorAccident);
        assert_eq!(records[1].link, None);

        let json = serde_json::to_value(&records).unwrap();
        assert_eq!(json[0]["link"], "https://x.example/n/1");
        assert_eq!(json[1]["link"], serde_json::Value::Null);
        assert_eq!(json[1]["category"], "major_accident");
    }

    #[tokio::test]
    async fn test_write_report_round_trips() {
        let out = std::env::temp_dir().join(format!("snd-json-{}", std::process::id()));
        let out_str = out.to_string_lossy().to_string();
        let report = report();

        let paths = write_report(&report, &out_str).await.unwrap();
        assert_eq!(paths.len(), 2);

        let text = std::fs::read_to_string(out.join("2025-05-06").join("results.json")).unwrap();
        let back: CollectionReport = serde_json::from_str(&text).unwrap();
        assert_eq!(back.results, report.results);
        assert_eq!(back.summary.total, 2);

        let _ = std::fs::remove_dir_all(&out);
    }
}
