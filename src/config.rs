use std::path::PathBuf;
use std::time::Duration;

use crate::delay_manager::DelayPolicy;
use crate::error::{Result, ScraperError};
use crate::input_loader::KeywordEntry;
use crate::search_engine::QUERY_PLACEHOLDER;

/// Keywords kept by `--test-mode`.
pub const TEST_MODE_KEYWORDS: usize = 3;

pub const DEFAULT_KEYWORDS_FILE: &str = "keywords.csv";
pub const DEFAULT_BASE_DIR: &str = "scraping_results";
pub const DEFAULT_SEARCH_URL: &str = "https://www.google.com/maps/search/{query}";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub keywords_file: PathBuf,
    pub base_dir: PathBuf,
    pub max_per_keyword: Option<usize>,
    pub start_from: Option<usize>,
    pub test_mode: bool,
    pub fresh: bool,
    pub single_keyword: Option<String>,
    pub replay_file: Option<PathBuf>,
    pub search_url: String,
    pub request_timeout: Duration,
    pub delays: DelayPolicy,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            keywords_file: PathBuf::from(DEFAULT_KEYWORDS_FILE),
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            max_per_keyword: None,
            start_from: None,
            test_mode: false,
            fresh: false,
            single_keyword: None,
            replay_file: None,
            search_url: DEFAULT_SEARCH_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            delays: DelayPolicy::default(),
        }
    }
}

impl ScrapeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_per_keyword == Some(0) {
            return Err(ScraperError::InvalidArgument(
                "--max-per-keyword must be at least 1".to_string(),
            ));
        }
        if matches!(&self.single_keyword, Some(keyword) if keyword.trim().is_empty()) {
            return Err(ScraperError::InvalidArgument(
                "--single-keyword must not be blank".to_string(),
            ));
        }
        if !self.search_url.contains(QUERY_PLACEHOLDER) {
            return Err(ScraperError::InvalidArgument(format!(
                "--search-url must contain {}",
                QUERY_PLACEHOLDER
            )));
        }
        Ok(())
    }

    /// Applies test mode to the loaded keyword list.
    pub fn select_keywords(&self, mut entries: Vec<KeywordEntry>) -> Vec<KeywordEntry> {
        if self.test_mode {
            entries.truncate(TEST_MODE_KEYWORDS);
        }
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(n: usize) -> Vec<KeywordEntry> {
        (0..n).map(|i| KeywordEntry::new(format!("bakery {}", i))).collect()
    }

    #[test]
    fn test_mode_keeps_first_three() {
        let config = ScrapeConfig {
            test_mode: true,
            ..ScrapeConfig::default()
        };
        let selected = config.select_keywords(keywords(10));
        assert_eq!(selected, keywords(3));
        assert_eq!(config.select_keywords(keywords(2)).len(), 2);
        assert_eq!(ScrapeConfig::default().select_keywords(keywords(10)).len(), 10);
    }

    #[test]
    fn rejects_zero_cap_and_template_without_query() {
        let zero = ScrapeConfig {
            max_per_keyword: Some(0),
            ..ScrapeConfig::default()
        };
        assert!(matches!(zero.validate(), Err(ScraperError::InvalidArgument(_))));

        let bad_url = ScrapeConfig {
            search_url: "https://maps.example/search".into(),
            ..ScrapeConfig::default()
        };
        assert!(bad_url.validate().is_err());

        let blank_keyword = ScrapeConfig {
            single_keyword: Some("  ".into()),
            ..ScrapeConfig::default()
        };
        assert!(blank_keyword.validate().is_err());
        assert!(ScrapeConfig::default().validate().is_ok());
    }
}
