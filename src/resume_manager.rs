use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::categorizer;
use crate::error::{Result, ScraperError};
use crate::input_loader::KeywordEntry;
use crate::output;

pub const STATE_FILE: &str = "session_state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed)
    }

    fn can_move_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::InProgress)
                | (TaskStatus::InProgress, TaskStatus::Done)
                | (TaskStatus::InProgress, TaskStatus::Failed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordTask {
    pub keyword: String,
    pub category: String,
    pub status: TaskStatus,
    pub result_count: usize,
    /// Forced to done by `start_from` without being scraped.
    #[serde(default)]
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl KeywordTask {
    fn from_entry(entry: &KeywordEntry) -> Self {
        let category = entry
            .category
            .clone()
            .unwrap_or_else(|| categorizer::categorize(&entry.keyword).to_string());
        KeywordTask {
            keyword: entry.keyword.clone(),
            category,
            status: TaskStatus::Pending,
            result_count: 0,
            skipped: false,
            error: None,
        }
    }
}

/// Builds the pending task list for a keyword batch, rejecting batches
/// whose outputs would overwrite each other on disk.
pub fn build_tasks(entries: &[KeywordEntry]) -> Result<Vec<KeywordTask>> {
    let tasks: Vec<KeywordTask> = entries.iter().map(KeywordTask::from_entry).collect();
    check_output_paths(&tasks)?;
    Ok(tasks)
}

/// Category directories and keyword files are compared case-insensitively.
fn check_output_paths(tasks: &[KeywordTask]) -> Result<()> {
    let mut dirs: HashMap<String, &str> = HashMap::new();
    let mut files: HashMap<String, &str> = HashMap::new();

    for task in tasks {
        let dir = output::safe_name(&task.category).to_lowercase();
        match dirs.entry(dir) {
            Entry::Occupied(seen) if *seen.get() != task.category => {
                return Err(ScraperError::InvalidArgument(format!(
                    "categories '{}' and '{}' would share the directory '{}'",
                    seen.get(),
                    task.category,
                    seen.key()
                )));
            }
            Entry::Occupied(_) => {}
            Entry::Vacant(slot) => {
                slot.insert(&task.category);
            }
        }

        let file = output::keyword_file(Path::new(""), &task.category, &task.keyword)
            .to_string_lossy()
            .to_lowercase();
        if let Some(other) = files.insert(file.clone(), &task.keyword) {
            return Err(ScraperError::InvalidArgument(format!(
                "keywords '{}' and '{}' would share the output file '{}'",
                other, task.keyword, file
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub base_dir: PathBuf,
    pub output_dir: PathBuf,
    pub started_at: DateTime<Local>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Local>>,
    pub tasks: Vec<KeywordTask>,
    /// Highest index of the contiguous done/failed prefix.
    pub last_completed_index: Option<usize>,
}

impl SessionState {
    fn refresh_last_completed(&mut self) {
        self.last_completed_index = self
            .tasks
            .iter()
            .position(|task| !task.status.is_terminal())
            .unwrap_or(self.tasks.len())
            .checked_sub(1);
    }

    /// True for an unfinished session over exactly these keywords and
    /// categories.
    fn continues(&self, tasks: &[KeywordTask]) -> bool {
        self.finished_at.is_none() && self.same_batch(tasks)
    }

    fn same_batch(&self, tasks: &[KeywordTask]) -> bool {
        self.tasks.len() == tasks.len()
            && self
                .tasks
                .iter()
                .zip(tasks)
                .all(|(a, b)| a.keyword == b.keyword && a.category == b.category)
    }
}

/// Durable owner of the session state. Every transition is written to disk
/// before the call returns.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    state: SessionState,
}

impl SessionStore {
    /// Starts a new session over `entries` and persists it immediately.
    pub fn initialize(entries: &[KeywordEntry], base_dir: &Path) -> Result<Self> {
        Self::create(build_tasks(entries)?, base_dir)
    }

    fn create(tasks: Vec<KeywordTask>, base_dir: &Path) -> Result<Self> {
        let started_at = Local::now();
        let session_id = started_at.format("%Y%m%d_%H%M%S").to_string();
        let output_dir = base_dir.join(format!("businesses_{}", session_id));
        fs::create_dir_all(&output_dir).map_err(|e| ScraperError::write_failure(&output_dir, e))?;

        let mut state = SessionState {
            session_id,
            base_dir: base_dir.to_path_buf(),
            output_dir,
            started_at,
            finished_at: None,
            tasks,
            last_completed_index: None,
        };
        state.refresh_last_completed();

        let store = SessionStore {
            path: base_dir.join(STATE_FILE),
            state,
        };
        store.persist()?;
        info!(
            "Started session {} with {} keywords in {:?}",
            store.state.session_id,
            store.state.tasks.len(),
            store.state.output_dir
        );
        Ok(store)
    }

    /// Loads the persisted session under `base_dir`, if any, and reopens it.
    ///
    /// Interrupted and failed tasks go back to pending and the session is
    /// unfinished again. With `start_from`, every earlier task that is not
    /// already done is forced to done and flagged as skipped.
    pub fn resume(base_dir: &Path, start_from: Option<usize>) -> Result<Option<Self>> {
        let path = base_dir.join(STATE_FILE);
        match load_state(&path)? {
            Some(state) => Self::reopen(path, state, start_from).map(Some),
            None => Ok(None),
        }
    }

    fn reopen(path: PathBuf, mut state: SessionState, start_from: Option<usize>) -> Result<Self> {
        for task in state.tasks.iter_mut() {
            if matches!(task.status, TaskStatus::InProgress | TaskStatus::Failed) {
                task.status = TaskStatus::Pending;
                task.result_count = 0;
                task.error = None;
            }
        }
        state.finished_at = None;

        let mut store = SessionStore { path, state };
        if let Some(start) = start_from {
            store.skip_before(start);
        }
        store.state.refresh_last_completed();
        store.persist()?;

        let done = store
            .state
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        info!(
            "Resumed session {}: {}/{} keywords already done.",
            store.state.session_id,
            done,
            store.state.tasks.len()
        );
        Ok(store)
    }

    /// Resumes the unfinished session for this exact batch, or initializes a
    /// new one. A persisted session that is finished or covers another batch
    /// is left untouched on disk until the new session replaces it.
    pub fn open(
        entries: &[KeywordEntry],
        base_dir: &Path,
        start_from: Option<usize>,
        fresh: bool,
    ) -> Result<Self> {
        let tasks = build_tasks(entries)?;
        if let Some(start) = start_from {
            if start >= tasks.len() {
                return Err(ScraperError::InvalidArgument(format!(
                    "--start-from {} is out of range for {} keywords",
                    start,
                    tasks.len()
                )));
            }
        }

        if !fresh {
            let path = base_dir.join(STATE_FILE);
            if let Some(state) = load_state(&path)? {
                if state.continues(&tasks) {
                    return Self::reopen(path, state, start_from);
                }
                info!(
                    "Session {} is finished or covers another batch. Starting a new one.",
                    state.session_id
                );
            }
        }

        let mut store = Self::create(tasks, base_dir)?;
        if let Some(start) = start_from {
            store.skip_before(start);
            store.state.refresh_last_completed();
            store.persist()?;
        }
        Ok(store)
    }

    fn skip_before(&mut self, start: usize) {
        let mut skipped = 0;
        for task in self.state.tasks.iter_mut().take(start) {
            if task.status != TaskStatus::Done {
                task.status = TaskStatus::Done;
                task.result_count = 0;
                task.skipped = true;
                task.error = None;
                skipped += 1;
            }
        }
        if skipped > 0 {
            info!("Skipping {} keywords before index {}", skipped, start);
        }
    }

    /// Moves one task to `status` and persists the full state.
    pub fn mark(&mut self, index: usize, status: TaskStatus, result_count: usize) -> Result<()> {
        let task = self
            .state
            .tasks
            .get_mut(index)
            .ok_or_else(|| ScraperError::InvalidArgument(format!("no task at index {}", index)))?;
        if !task.status.can_move_to(status) {
            return Err(ScraperError::InvalidTransition {
                index,
                from: task.status,
                to: status,
            });
        }
        task.status = status;
        task.result_count = result_count;
        self.state.refresh_last_completed();
        self.persist()
    }

    /// Marks a task failed with the reason kept in the state.
    pub fn fail(&mut self, index: usize, reason: String) -> Result<()> {
        if let Some(task) = self.state.tasks.get_mut(index) {
            task.error = Some(reason);
        }
        self.mark(index, TaskStatus::Failed, 0)
    }

    pub fn finish(&mut self) -> Result<()> {
        self.state.finished_at = Some(Local::now());
        self.persist()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn output_dir(&self) -> &Path {
        &self.state.output_dir
    }

    pub fn state_path(&self) -> &Path {
        &self.path
    }

    /// Whole-state rewrite through a temp file and rename.
    fn persist(&self) -> Result<()> {
        let json = serde_json::to_vec_pretty(&self.state)?;
        write_atomic(&self.path, &json)
    }
}

/// Reads a persisted state. An unparseable file is ignored with a warning.
fn load_state(path: &Path) -> Result<Option<SessionState>> {
    if !path.exists() {
        info!("No session state at {:?}", path);
        return Ok(None);
    }
    let content = fs::read_to_string(path).map_err(|e| ScraperError::Input {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    match serde_json::from_str(&content) {
        Ok(state) => Ok(Some(state)),
        Err(e) => {
            warn!("Unreadable session state {:?}: {}. Ignoring it.", path, e);
            Ok(None)
        }
    }
}

/// Writes `bytes` to a sibling temp file, syncs it and renames it over
/// `path`.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| ScraperError::write_failure(parent, e))?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = File::create(&tmp_path).map_err(|e| ScraperError::write_failure(&tmp_path, e))?;
    file.write_all(bytes)
        .and_then(|_| file.sync_all())
        .map_err(|e| ScraperError::write_failure(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| ScraperError::write_failure(path, e))
}
