//! Markdown digest of a collection run.
//!
//! This is the plain-text layout handed to the briefing writer: one section
//! per non-empty category, numbered by the category's fixed position (so the
//! portal notices are always section 2), each item as `- [date] title` with
//! its link on the following line when it has one.

use crate::models::CollectionReport;
use std::fmt::Write;

/// Render the digest for a report.
pub fn report_to_markdown(report: &CollectionReport) -> String {
    let mut md = String::new();
    let _ = writeln!(
        md,
        "# 오늘 수집된 노동안전보건 동향 자료 ({})\n",
        report.local_date
    );

    let mut written = 0;
    for (section, (category, items)) in (1..).zip(report.results.iter()) {
        if items.is_empty() {
            continue;
        }
        written += 1;
        let _ = writeln!(md, "## {}. {}", section, category.display_name());
        for item in items {
            let _ = writeln!(md, "- [{}] {}", item.date, item.title);
            if let Some(link) = &item.link {
                let _ = writeln!(md, "  링크: {}", link);
            }
            md.push('\n');
        }
    }

    if written == 0 {
        md.push_str("_수집된 자료가 없습니다._\n");
    }
    md
}
