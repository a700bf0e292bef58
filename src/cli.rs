use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::{
    ScrapeConfig, DEFAULT_BASE_DIR, DEFAULT_KEYWORDS_FILE, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SEARCH_URL,
};
use crate::delay_manager::DelayPolicy;

/// Resumable map-search business scraper.
///
/// Processes a keyword batch in order, writes one CSV per keyword and one
/// deduplicated master CSV per category. Re-running with the same keyword
/// file continues an unfinished session.
#[derive(Parser, Debug, Clone)]
#[command(name = "maps-scraper")]
#[command(version)]
pub struct Args {
    /// Keyword file (.csv with keyword[,category], .xlsx, or one keyword per line)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_KEYWORDS_FILE)]
    pub keywords: PathBuf,

    /// Base directory for session state and results
    #[arg(long, value_name = "PATH", default_value = DEFAULT_BASE_DIR)]
    pub base_dir: PathBuf,

    /// Maximum accepted results per keyword (default: unlimited)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_per_keyword: Option<u64>,

    /// Treat every keyword before this index as already done
    #[arg(long, value_name = "INDEX")]
    pub start_from: Option<usize>,

    /// Only process the first 3 keywords
    #[arg(long)]
    pub test_mode: bool,

    /// Start a new session even if an unfinished one exists
    #[arg(long)]
    pub fresh: bool,

    /// Scrape just this keyword into <base-dir>/test_results, outside any session
    #[arg(
        long,
        value_name = "KEYWORD",
        conflicts_with_all = ["start_from", "test_mode", "fresh"]
    )]
    pub single_keyword: Option<String>,

    /// Replay listings from a JSON file instead of fetching them
    #[arg(long, value_name = "PATH")]
    pub replay: Option<PathBuf>,

    /// Search URL template; {query} is replaced by the encoded keyword
    #[arg(long, value_name = "URL", default_value = DEFAULT_SEARCH_URL)]
    pub search_url: String,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Disable pauses between pages and keywords
    #[arg(long)]
    pub no_delay: bool,
}

impl Args {
    pub fn into_config(self) -> ScrapeConfig {
        ScrapeConfig {
            keywords_file: self.keywords,
            base_dir: self.base_dir,
            max_per_keyword: self.max_per_keyword.map(|n| n as usize),
            start_from: self.start_from,
            test_mode: self.test_mode,
            fresh: self.fresh,
            single_keyword: self.single_keyword,
            replay_file: self.replay,
            search_url: self.search_url,
            request_timeout: Duration::from_secs(self.timeout),
            delays: if self.no_delay {
                DelayPolicy::none()
            } else {
                DelayPolicy::default()
            },
        }
    }
}
