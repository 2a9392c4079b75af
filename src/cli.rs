//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can also come from environment variables; anything given here
//! overrides the YAML settings file.

use crate::models::Category;
use crate::sources::DEFAULT_SEARCH_QUERY;
use clap::Parser;

/// Collect today's workplace-safety notices and news into one result set.
///
/// # Examples
///
/// ```sh
/// # All sources, JSON into ./output
/// safety_news_digest
///
/// # Two sources, custom query, Markdown digest too
/// safety_news_digest -s press_release,keyword_search -q "건설 추락" --markdown
///
/// # No headless browser on this machine
/// safety_news_digest --no-browser
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Sources to collect (comma-separated)
    #[arg(
        short,
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = Category::ALL.to_vec()
    )]
    pub sources: Vec<Category>,

    /// Query for the keyword-search source
    #[arg(short, long, env = "SAFETY_NEWS_QUERY", default_value = DEFAULT_SEARCH_QUERY)]
    pub query: String,

    /// Output directory for exported files
    #[arg(short, long, default_value = "./output")]
    pub output_dir: String,

    /// Optional path to a YAML settings file
    #[arg(short, long, env = "SAFETY_NEWS_CONFIG")]
    pub config: Option<String>,

    /// Maximum number of sources fetched at once
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Give up on unfinished sources after this many seconds
    #[arg(long)]
    pub run_timeout_secs: Option<u64>,

    /// Pause between source launches, in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Never launch a headless browser; rendered sources use plain HTTP
    #[arg(long)]
    pub no_browser: bool,

    /// Also write a Markdown digest
    #[arg(long)]
    pub markdown: bool,
}

impl Cli {
    /// The search query, rejected when blank.
    pub fn validated_query(&self) -> Result<&str, String> {
        let query = self.query.trim();
        if query.is_empty() {
            Err("--query must not be empty".to_string())
        } else {
            Ok(query)
        }
    }
}
