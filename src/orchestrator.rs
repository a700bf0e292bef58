use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::aggregator;
use crate::categorizer;
use crate::dedup::{self, KeyIndex};
use crate::delay_manager::DelayPolicy;
use crate::error::Result;
use crate::output;
use crate::record::Place;
use crate::report::{SessionSummary, REPORT_FILE};
use crate::resume_manager::{SessionStore, TaskStatus};
use crate::scraper::PlaceSource;

/// Drives the keyword queue of one session, strictly in list order.
pub struct Orchestrator<S> {
    source: S,
    store: SessionStore,
    max_per_keyword: Option<usize>,
    delays: DelayPolicy,
}

impl<S: PlaceSource> Orchestrator<S> {
    pub fn new(source: S, store: SessionStore) -> Self {
        Orchestrator {
            source,
            store,
            max_per_keyword: None,
            delays: DelayPolicy::none(),
        }
    }

    pub fn with_max_per_keyword(mut self, max: Option<usize>) -> Self {
        self.max_per_keyword = max;
        self
    }

    pub fn with_delays(mut self, delays: DelayPolicy) -> Self {
        self.delays = delays;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn into_store(self) -> SessionStore {
        self.store
    }

    /// Processes every pending task, then finalizes outputs and the report.
    ///
    /// A keyword whose extraction fails is marked failed and the run moves
    /// on; fatal errors (persistence, invalid transitions) stop the run with
    /// the state as last persisted.
    pub fn run(&mut self) -> Result<SessionSummary> {
        let total = self.store.state().tasks.len();
        let mut processed = 0;

        for index in 0..total {
            let task = &self.store.state().tasks[index];
            if task.status != TaskStatus::Pending {
                continue;
            }
            let keyword = task.keyword.clone();
            let category = task.category.clone();

            if processed > 0 {
                self.delays.keyword_delay();
            }
            processed += 1;

            info!("{}", "=".repeat(50));
            info!("Processing {}/{}: {} [{}]", index + 1, total, keyword, category);
            self.store.mark(index, TaskStatus::InProgress, 0)?;

            match self.scrape_keyword(&keyword, &category) {
                Ok(places) => {
                    let path = output::keyword_file(self.store.output_dir(), &category, &keyword);
                    output::write_places(&path, &places)?;
                    self.store.mark(index, TaskStatus::Done, places.len())?;
                    if places.is_empty() {
                        warn!("{}: No places found", keyword);
                    } else {
                        info!("{}: Found {} places", keyword, places.len());
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!("Failed to process {}: {}", keyword, e);
                    self.store.fail(index, e.to_string())?;
                }
            }

            self.refresh_outputs()?;
        }

        self.store.finish()?;
        let summary = self.refresh_outputs()?;
        info!(
            "SCRAPING FINISHED: {} places kept, {} duplicates removed. Results in {:?}",
            summary.total_accepted,
            summary.total_duplicates,
            self.store.output_dir()
        );
        Ok(summary)
    }

    fn scrape_keyword(&mut self, keyword: &str, category: &str) -> Result<Vec<Place>> {
        collect_places(&mut self.source, keyword, category, self.max_per_keyword)
    }

    /// Rebuilds every master file and the summary report from the
    /// per-keyword files on disk.
    pub fn refresh_outputs(&self) -> Result<SessionSummary> {
        let state = self.store.state();
        let batches = aggregator::load_batches(state);
        let aggregation = aggregator::aggregate(&batches);
        aggregator::write_masters(&state.output_dir, &aggregation)?;

        let summary = SessionSummary::build(state, &aggregation);
        summary.write(&state.output_dir.join(REPORT_FILE))?;
        Ok(summary)
    }
}

/// Pulls listings for one keyword, dropping empty entries and repeats
/// within the keyword, up to `cap` accepted records.
pub fn collect_places<S: PlaceSource + ?Sized>(
    source: &mut S,
    keyword: &str,
    category: &str,
    cap: Option<usize>,
) -> Result<Vec<Place>> {
    let mut accepted = Vec::new();
    if cap == Some(0) {
        return Ok(accepted);
    }

    let mut keys = KeyIndex::new();
    let stream = source.search(keyword, cap)?;
    for (idx, item) in stream.enumerate() {
        let raw = item?;
        if !raw.has_useful_data() {
            warn!("[{}] [FAIL] No useful data for listing {}", keyword, idx + 1);
            continue;
        }

        let place = raw.into_place(keyword, category);
        let label = place.name.clone();
        if dedup::accept(place, &mut keys, &mut accepted) {
            info!("[{}] [OK] {}: {}", keyword, accepted.len(), label);
        } else {
            info!("[{}] [SKIP] Duplicate: {}", keyword, label);
        }

        if cap.map_or(false, |max| accepted.len() >= max) {
            info!("[{}] Reached max results: {}", keyword, accepted.len());
            break;
        }
    }
    Ok(accepted)
}

/// Result of scraping a single keyword outside any session.
#[derive(Debug)]
pub struct SingleKeywordRun {
    pub category: String,
    pub places: Vec<Place>,
    /// Written only when something was found.
    pub output: Option<PathBuf>,
}

/// Quick check of one keyword: no session state, no masters, results in
/// `<base_dir>/test_results/test_<keyword>.csv`.
pub fn run_single_keyword<S: PlaceSource + ?Sized>(
    source: &mut S,
    keyword: &str,
    base_dir: &Path,
    cap: Option<usize>,
) -> Result<SingleKeywordRun> {
    let category = categorizer::categorize(keyword).to_string();
    info!("TEST MODE: Scraping '{}' [{}]", keyword, category);

    let places = collect_places(source, keyword, &category, cap)?;
    if places.is_empty() {
        warn!("No places found for '{}'", keyword);
        return Ok(SingleKeywordRun {
            category,
            places,
            output: None,
        });
    }

    let path = output::single_keyword_file(base_dir, keyword);
    output::write_places(&path, &places)?;
    info!("Found {} places. Results saved to: {:?}", places.len(), path);
    Ok(SingleKeywordRun {
        category,
        places,
        output: Some(path),
    })
}
