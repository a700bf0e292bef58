use std::collections::BTreeMap;
use std::path::Path;

use log::warn;

use crate::dedup::{self, KeyIndex};
use crate::error::Result;
use crate::output;
use crate::record::Place;
use crate::resume_manager::{SessionState, TaskStatus};

/// Accepted records of one keyword, as written to its per-keyword file.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordBatch {
    pub keyword: String,
    pub category: String,
    pub places: Vec<Place>,
}

/// Deduplicated union of every batch of one category, in keyword order.
#[derive(Debug, Clone, Default)]
pub struct CategoryMaster {
    pub places: Vec<Place>,
    pub keys: KeyIndex,
    pub keywords: usize,
    pub scraped: usize,
    pub duplicates: usize,
}

impl CategoryMaster {
    pub fn accepted(&self) -> usize {
        self.places.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Aggregation {
    pub categories: BTreeMap<String, CategoryMaster>,
    /// Records read back per keyword, before cross-keyword dedup.
    pub keyword_counts: BTreeMap<String, usize>,
}

impl Aggregation {
    pub fn total_scraped(&self) -> usize {
        self.categories.values().map(|m| m.scraped).sum()
    }

    pub fn total_accepted(&self) -> usize {
        self.categories.values().map(CategoryMaster::accepted).sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.categories.values().map(|m| m.duplicates).sum()
    }
}

/// Folds batches, in the order given, into per-category master sets.
/// Records whose identity key is already in the category are counted as
/// duplicates and dropped.
pub fn aggregate(batches: &[KeywordBatch]) -> Aggregation {
    let mut aggregation = Aggregation::default();
    for batch in batches {
        let master = aggregation
            .categories
            .entry(batch.category.clone())
            .or_default();
        master.keywords += 1;
        aggregation
            .keyword_counts
            .insert(batch.keyword.clone(), batch.places.len());
        for place in &batch.places {
            master.scraped += 1;
            if !dedup::accept(place.clone(), &mut master.keys, &mut master.places) {
                master.duplicates += 1;
            }
        }
    }
    aggregation
}

/// Reads the per-keyword files of every done task, in task order.
/// Unreadable or missing files count as empty batches.
pub fn load_batches(state: &SessionState) -> Vec<KeywordBatch> {
    state
        .tasks
        .iter()
        .filter(|task| task.status == TaskStatus::Done)
        .map(|task| {
            let path = output::keyword_file(&state.output_dir, &task.category, &task.keyword);
            let places = if path.exists() {
                output::read_places(&path).unwrap_or_else(|e| {
                    warn!("Ignoring unreadable results for '{}': {}", task.keyword, e);
                    Vec::new()
                })
            } else {
                if task.skipped {
                    warn!("Skipped keyword '{}' has no results in this session", task.keyword);
                } else {
                    warn!("Missing results file {:?}", path);
                }
                Vec::new()
            };
            KeywordBatch {
                keyword: task.keyword.clone(),
                category: task.category.clone(),
                places,
            }
        })
        .collect()
}

/// Rewrites the master file of every aggregated category.
pub fn write_masters(output_dir: &Path, aggregation: &Aggregation) -> Result<()> {
    for (category, master) in &aggregation.categories {
        output::write_places(&output::master_file(output_dir, category), &master.places)?;
    }
    Ok(())
}
