use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, Local};

use crate::aggregator::Aggregation;
use crate::error::Result;
use crate::resume_manager::{write_atomic, SessionState, TaskStatus};

pub const REPORT_FILE: &str = "SUMMARY_REPORT.txt";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    pub category: String,
    pub keywords: usize,
    pub scraped: usize,
    pub accepted: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeywordStats {
    pub keyword: String,
    pub category: String,
    pub status: TaskStatus,
    pub result_count: usize,
    pub skipped: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub started_at: DateTime<Local>,
    pub finished_at: Option<DateTime<Local>>,
    pub duration: Duration,
    pub categories: Vec<CategoryStats>,
    pub keywords: Vec<KeywordStats>,
    pub total_scraped: usize,
    pub total_accepted: usize,
    pub total_duplicates: usize,
}

impl SessionSummary {
    pub fn build(state: &SessionState, aggregation: &Aggregation) -> Self {
        let end = state.finished_at.unwrap_or_else(Local::now);
        let categories = aggregation
            .categories
            .iter()
            .map(|(category, master)| CategoryStats {
                category: category.clone(),
                keywords: master.keywords,
                scraped: master.scraped,
                accepted: master.accepted(),
                duplicates: master.duplicates,
            })
            .collect();
        let keywords = state
            .tasks
            .iter()
            .map(|task| KeywordStats {
                keyword: task.keyword.clone(),
                category: task.category.clone(),
                status: task.status,
                // Skipped keywords report whatever earlier data still feeds
                // the masters.
                result_count: if task.skipped {
                    aggregation
                        .keyword_counts
                        .get(&task.keyword)
                        .copied()
                        .unwrap_or(0)
                } else {
                    task.result_count
                },
                skipped: task.skipped,
                error: task.error.clone(),
            })
            .collect();

        SessionSummary {
            session_id: state.session_id.clone(),
            started_at: state.started_at,
            finished_at: state.finished_at,
            duration: end.signed_duration_since(state.started_at),
            categories,
            keywords,
            total_scraped: aggregation.total_scraped(),
            total_accepted: aggregation.total_accepted(),
            total_duplicates: aggregation.total_duplicates(),
        }
    }

    pub fn completed(&self) -> usize {
        self.keywords
            .iter()
            .filter(|k| k.status == TaskStatus::Done && !k.skipped)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.count_status(TaskStatus::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.keywords.iter().filter(|k| k.skipped).count()
    }

    pub fn pending(&self) -> usize {
        self.count_status(TaskStatus::Pending) + self.count_status(TaskStatus::InProgress)
    }

    fn count_status(&self, status: TaskStatus) -> usize {
        self.keywords.iter().filter(|k| k.status == status).count()
    }

    pub fn render(&self) -> String {
        self.to_string()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.render().as_bytes())
    }
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "BUSINESS SCRAPING SUMMARY")?;
        writeln!(f, "{}\n", rule)?;
        writeln!(f, "Session: {}", self.session_id)?;
        writeln!(f, "Started: {}", self.started_at.format("%Y-%m-%d %H:%M:%S"))?;
        match self.finished_at {
            Some(at) => writeln!(f, "Finished: {}", at.format("%Y-%m-%d %H:%M:%S"))?,
            None => writeln!(f, "Finished: (in progress)")?,
        }
        writeln!(f, "Duration: {}\n", format_duration(self.duration))?;

        writeln!(
            f,
            "Keywords: {} total, {} completed, {} failed, {} skipped, {} pending",
            self.keywords.len(),
            self.completed(),
            self.failed(),
            self.skipped(),
            self.pending()
        )?;
        writeln!(f, "Places scraped: {}", self.total_scraped)?;
        writeln!(f, "Places accepted: {}", self.total_accepted)?;
        writeln!(f, "Duplicates removed: {}\n", self.total_duplicates)?;

        writeln!(f, "RESULTS BY CATEGORY:")?;
        writeln!(f, "{}", "-".repeat(30))?;
        for stats in &self.categories {
            writeln!(
                f,
                "{}: {} places ({} scraped, {} duplicates, {} keywords)",
                stats.category, stats.accepted, stats.scraped, stats.duplicates, stats.keywords
            )?;
        }

        writeln!(f, "\nRESULTS BY KEYWORD:")?;
        writeln!(f, "{}", "-".repeat(30))?;
        for stats in &self.keywords {
            let status = if stats.skipped {
                "skipped".to_string()
            } else {
                stats.status.to_string()
            };
            writeln!(
                f,
                "[{}] {} ({}): {} places",
                status, stats.keyword, stats.category, stats.result_count
            )?;
        }

        let mut failed = self
            .keywords
            .iter()
            .filter(|k| k.status == TaskStatus::Failed)
            .peekable();
        if failed.peek().is_some() {
            writeln!(f, "\nFAILED KEYWORDS:")?;
            writeln!(f, "{}", "-".repeat(20))?;
            for stats in failed {
                writeln!(
                    f,
                    "- {}: {}",
                    stats.keyword,
                    stats.error.as_deref().unwrap_or("unknown error")
                )?;
            }
        }
        Ok(())
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.num_seconds().max(0);
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
