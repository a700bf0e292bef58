use std::path::PathBuf;

use thiserror::Error;

use crate::resume_manager::TaskStatus;

/// Errors raised while running a scraping session.
#[derive(Debug, Error)]
pub enum ScraperError {
    /// A page load or request exceeded its timeout.
    #[error("extraction timed out: {context}")]
    ExtractionTimeout { context: String },

    /// A single field could not be read from an entry.
    #[error("could not parse {field} from '{raw}'")]
    ExtractionParseFailure { field: &'static str, raw: String },

    /// Navigation or HTTP failure for one keyword.
    #[error("extraction failed: {reason}")]
    Extraction { reason: String },

    #[error("request to {url} blocked with status {status}")]
    Blocked { url: String, status: u16 },

    #[error("failed to write {}: {source}", path.display())]
    PersistenceWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("task {index} cannot move from {from} to {to}")]
    InvalidTransition {
        index: usize,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("failed to read {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ScraperError {
    /// Fatal errors abort the whole session; anything else only fails the
    /// keyword being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScraperError::PersistenceWriteFailure { .. }
                | ScraperError::InvalidArgument(_)
                | ScraperError::InvalidTransition { .. }
        )
    }

    pub(crate) fn write_failure(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ScraperError::PersistenceWriteFailure {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
