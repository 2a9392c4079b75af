//! Running every enabled source and merging the results.
//!
//! Sources run concurrently up to a small limit, with a politeness pause
//! between launches. The orchestrator's own loop is the only writer of the
//! [`ResultSet`]: runner futures hand their items back through the stream and
//! are merged in completion order, which is safe because each source owns
//! exactly one category.
//!
//! A run-level deadline stops everything still pending. Sources that finished
//! before it keep their items; the rest stay empty.

use crate::config::RunSettings;
use crate::models::ResultSet;
use crate::runner::SourceRunner;
use crate::sources::SourceSpec;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::time::Duration;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{error, info, instrument, warn};

const MAX_JITTER_MS: u64 = 250;

pub struct Orchestrator {
    runner: SourceRunner,
    max_concurrency: usize,
    politeness_delay: Duration,
    deadline: Duration,
}

impl Orchestrator {
    pub fn new(runner: SourceRunner, settings: &RunSettings) -> Self {
        Self {
            runner,
            max_concurrency: settings.max_concurrency.max(1),
            politeness_delay: settings.politeness_delay(),
            deadline: settings.deadline(),
        }
    }

    /// Run each spec once and collect a complete [`ResultSet`].
    ///
    /// Always returns all five categories; failed, panicked or timed-out
    /// sources simply contribute nothing.
    #[instrument(level = "info", skip_all, fields(sources = specs.len()))]
    pub async fn run(&self, specs: &[SourceSpec]) -> ResultSet {
        let started = Instant::now();
        let deadline = started + self.deadline;
        let delay = self.politeness_delay;
        let runner = &self.runner;

        let mut outcomes = pin!(
            stream::iter(specs.iter().enumerate())
                .then(move |(index, spec)| async move {
                    if index > 0 && !delay.is_zero() {
                        sleep(delay + jitter()).await;
                    }
                    spec
                })
                .map(move |spec| async move {
                    let outcome = AssertUnwindSafe(runner.run(spec)).catch_unwind().await;
                    (spec, outcome)
                })
                .buffer_unordered(self.max_concurrency)
        );

        let mut results = ResultSet::new();
        let mut completed = 0usize;
        loop {
            match timeout_at(deadline, outcomes.next()).await {
                Ok(Some((spec, Ok(items)))) => {
                    completed += 1;
                    results.extend(spec.category, items);
                }
                Ok(Some((spec, Err(_)))) => {
                    completed += 1;
                    error!(
                        category = %spec.category,
                        source = %spec.label,
                        "Source runner panicked; contributing zero items"
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        completed,
                        abandoned = specs.len() - completed,
                        "Run deadline reached; returning partial results"
                    );
                    break;
                }
            }
        }

        info!(
            completed,
            total_items = results.total(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection run finished"
        );
        results
    }
}

fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(0..=MAX_JITTER_MS))
}
