//! # Safety News Digest
//!
//! Collects workplace-safety press releases, portal notices, serious-accident
//! alerts, labor-newspaper articles and keyword search results from Korean
//! public websites, and groups them by category for a daily briefing.
//!
//! ## Usage
//!
//! ```sh
//! safety_news_digest -o ./output --markdown
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Capability probe**: Check once whether a headless browser can start
//! 2. **Collection**: Run each enabled source (fetch → extract → normalize),
//!    a few at a time, each isolated from the others' failures
//! 3. **Output**: Write the JSON export and, optionally, the Markdown digest

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod extract;
mod fetch;
mod models;
mod normalize;
mod orchestrator;
mod outputs;
mod runner;
mod sources;
mod utils;

use cli::Cli;
use config::Settings;
use fetch::{Capabilities, FetcherSet};
use models::CollectionReport;
use orchestrator::Orchestrator;
use outputs::{json, markdown};
use runner::SourceRunner;
use utils::{ensure_writable_dir, local_date};

/// Merge the settings file (if any) with command-line overrides.
fn load_settings(args: &Cli) -> Result<Settings, Box<dyn Error>> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(n) = args.max_concurrency {
        settings.run.max_concurrency = n;
    }
    if let Some(secs) = args.run_timeout_secs {
        settings.run.deadline_secs = secs;
    }
    if let Some(ms) = args.delay_ms {
        settings.run.politeness_delay_ms = ms;
    }
    settings.validate()?;
    Ok(settings)
}

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("safety_news_digest starting up");

    let args = Cli::parse();
    debug!(?args.sources, %args.output_dir, "Parsed CLI arguments");

    let query = args.validated_query()?.to_string();
    let settings = load_settings(&args)?;

    // Early check: fail before any fetching if results cannot be saved
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let capabilities = Capabilities::detect(&settings.fetch, args.no_browser).await;
    let fetchers = FetcherSet::from_settings(&settings.fetch, capabilities)?;
    let rendered_available = fetchers.rendered_available();

    let specs = sources::enabled_specs(&args.sources, &query, &settings);
    if specs.is_empty() {
        warn!("No sources enabled; the result set will be empty");
    }
    info!(
        sources = ?specs.iter().map(|s| s.category.key()).collect::<Vec<_>>(),
        rendered = rendered_available,
        "Starting collection"
    );

    let today = local_date();
    let orchestrator = Orchestrator::new(SourceRunner::new(fetchers, today.clone()), &settings.run);
    let results = orchestrator.run(&specs).await;

    let report = CollectionReport {
        local_date: today,
        local_time: Local::now().time().format("%H:%M:%S").to_string(),
        rendered_available,
        summary: results.summary(),
        results,
    };

    for category in report.results.categories() {
        info!(
            category = %category,
            name = category.display_name(),
            count = report.results.items(category).len(),
            "Collected"
        );
    }

    // ---- JSON output ----
    if let Err(e) = json::write_report(&report, &args.output_dir).await {
        error!(error = %e, "Failed to write JSON export");
    }

    // ---- Markdown output ----
    if args.markdown {
        let md = markdown::report_to_markdown(&report);
        match json::dated_dir(&args.output_dir, &report.local_date).await {
            Ok(dir) => {
                let path = dir.join("digest.md");
                if let Err(e) = tokio::fs::write(&path, md).await {
                    error!(path = %path.display(), error = %e, "Failed writing Markdown digest");
                } else {
                    info!(path = %path.display(), "Wrote Markdown digest");
                }
            }
            Err(e) => error!(error = %e, "Failed to prepare Markdown output directory"),
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        total_items = report.summary.total,
        "Execution complete"
    );

    Ok(())
}
