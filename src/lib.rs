pub mod aggregator;
pub mod categorizer;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod delay_manager;
pub mod error;
pub mod extractor;
pub mod input_loader;
pub mod logger;
pub mod orchestrator;
pub mod output;
pub mod record;
pub mod report;
pub mod resume_manager;
pub mod scraper;
pub mod search_engine;

// Exporting types for convenience
pub use aggregator::{aggregate, Aggregation, CategoryMaster, KeywordBatch};
pub use categorizer::categorize;
pub use config::ScrapeConfig;
pub use error::{Result, ScraperError};
pub use extractor::Extractor;
pub use input_loader::KeywordEntry;
pub use orchestrator::{collect_places, run_single_keyword, Orchestrator, SingleKeywordRun};
pub use record::{Feature, IdentityKey, Place, RawPlace};
pub use report::SessionSummary;
pub use resume_manager::{KeywordTask, SessionState, SessionStore, TaskStatus};
pub use scraper::{FixtureSource, MapsScraper, PlaceSource, PlaceStream};
pub use search_engine::SearchEngine;
