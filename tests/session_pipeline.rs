use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use maps_scraper_lib::config::ScrapeConfig;
use maps_scraper_lib::output::{keyword_file, master_file, read_places};
use maps_scraper_lib::report::REPORT_FILE;
use maps_scraper_lib::resume_manager::STATE_FILE;
use maps_scraper_lib::{
    run_single_keyword, KeywordEntry, Orchestrator, PlaceSource, PlaceStream, RawPlace, Result,
    ScraperError, SessionStore, TaskStatus,
};

#[derive(Clone)]
enum Step {
    Place(RawPlace),
    Timeout,
    Crash,
}

/// In-memory listing source driven by a per-keyword script.
#[derive(Default)]
struct ScriptedSource {
    script: HashMap<String, Vec<Step>>,
    failing_searches: HashSet<String>,
    searched: Vec<String>,
    pulled: usize,
}

impl ScriptedSource {
    fn with(mut self, keyword: &str, steps: Vec<Step>) -> Self {
        self.script.insert(keyword.to_string(), steps);
        self
    }

    fn failing(mut self, keyword: &str) -> Self {
        self.failing_searches.insert(keyword.to_string());
        self
    }
}

impl PlaceSource for ScriptedSource {
    fn search<'a>(&'a mut self, keyword: &str, _limit: Option<usize>) -> Result<PlaceStream<'a>> {
        self.searched.push(keyword.to_string());
        if self.failing_searches.contains(keyword) {
            return Err(ScraperError::ExtractionTimeout {
                context: format!("search {}", keyword),
            });
        }
        let steps = self.script.get(keyword).cloned().unwrap_or_default();
        let pulled = &mut self.pulled;
        Ok(Box::new(steps.into_iter().map(move |step| {
            *pulled += 1;
            match step {
                Step::Place(place) => Ok(place),
                Step::Timeout => Err(ScraperError::ExtractionTimeout {
                    context: "listing".into(),
                }),
                Step::Crash => Err(ScraperError::PersistenceWriteFailure {
                    path: "disk".into(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "killed"),
                }),
            }
        })))
    }
}

fn place(name: &str, address: &str) -> Step {
    Step::Place(RawPlace {
        name: Some(name.to_string()),
        address: Some(address.to_string()),
        ..RawPlace::default()
    })
}

fn entries(keywords: &[&str]) -> Vec<KeywordEntry> {
    keywords.iter().map(|k| KeywordEntry::new(*k)).collect()
}

fn names(path: &Path) -> Vec<String> {
    read_places(path)
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect()
}

#[test]
fn same_business_under_two_keywords_lands_once_in_master() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&entries(&["bakery X", "hotel X"]), dir.path(), None, false).unwrap();
    let source = ScriptedSource::default()
        .with("bakery X", vec![place("A", "1 Main St"), place("a", "1 main st.")])
        .with("hotel X", vec![place("A", "1 Main St")]);

    let mut orchestrator = Orchestrator::new(source, store);
    let summary = orchestrator.run().unwrap();
    let out = orchestrator.store().output_dir().to_path_buf();

    assert_eq!(names(&keyword_file(&out, "Food_Businesses", "bakery X")), vec!["A"]);
    assert_eq!(names(&keyword_file(&out, "Food_Businesses", "hotel X")), vec!["A"]);
    assert_eq!(names(&master_file(&out, "Food_Businesses")), vec!["A"]);

    assert_eq!(summary.total_accepted, 1);
    assert_eq!(summary.total_duplicates, 1);
    assert_eq!(summary.completed(), 2);
    assert!(orchestrator.store().state().finished_at.is_some());
    assert!(out.join(REPORT_FILE).exists());
}

#[test]
fn cap_limits_accepted_records_per_keyword() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&entries(&["catering X"]), dir.path(), None, false).unwrap();
    let source = ScriptedSource::default().with(
        "catering X",
        vec![
            place("A", "1"),
            place("A", "1"),
            place("B", "2"),
            place("C", "3"),
            place("D", "4"),
        ],
    );

    let mut orchestrator = Orchestrator::new(source, store).with_max_per_keyword(Some(2));
    orchestrator.run().unwrap();
    let out = orchestrator.store().output_dir().to_path_buf();

    assert_eq!(names(&keyword_file(&out, "Event_Catering", "catering X")), vec!["A", "B"]);
    assert_eq!(orchestrator.store().state().tasks[0].result_count, 2);
}

#[test]
fn stream_stops_once_cap_is_reached() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&entries(&["mess X"]), dir.path(), None, false).unwrap();
    let mut source = ScriptedSource::default().with(
        "mess X",
        vec![place("A", "1"), place("B", "2"), place("C", "3")],
    );

    {
        let mut orchestrator = Orchestrator::new(&mut source, store).with_max_per_keyword(Some(1));
        orchestrator.run().unwrap();
    }
    assert_eq!(source.pulled, 1);
}

#[test]
fn failed_keyword_does_not_halt_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(
        &entries(&["bakery X", "hotel X", "biryani X"]),
        dir.path(),
        None,
        false,
    )
    .unwrap();
    let source = ScriptedSource::default()
        .with("bakery X", vec![place("A", "1")])
        .with("hotel X", vec![place("B", "2"), Step::Timeout])
        .with("biryani X", vec![place("C", "3")]);

    let mut orchestrator = Orchestrator::new(source, store);
    let summary = orchestrator.run().unwrap();
    let state = orchestrator.store().state();

    let statuses: Vec<_> = state.tasks.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Done, TaskStatus::Failed, TaskStatus::Done]
    );
    assert_eq!(state.tasks[1].result_count, 0);
    assert!(state.tasks[1].error.as_deref().unwrap().contains("timed out"));
    assert_eq!(state.last_completed_index, Some(2));
    assert_eq!(summary.failed(), 1);
    assert!(!keyword_file(&state.output_dir, "Food_Businesses", "hotel X").exists());

    let report = fs::read_to_string(state.output_dir.join(REPORT_FILE)).unwrap();
    assert!(report.contains("FAILED KEYWORDS"));
    assert!(report.contains("hotel X"));
}

#[test]
fn search_failure_marks_keyword_failed() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&entries(&["bakery X", "hotel X"]), dir.path(), None, false).unwrap();
    let source = ScriptedSource::default()
        .failing("bakery X")
        .with("hotel X", vec![place("B", "2")]);

    let mut orchestrator = Orchestrator::new(source, store);
    let summary = orchestrator.run().unwrap();
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.completed(), 1);
}

#[test]
fn entries_without_name_address_or_phone_are_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&entries(&["bakery X"]), dir.path(), None, false).unwrap();
    let blank = Step::Place(RawPlace {
        website: Some("https://nothing.example".into()),
        ..RawPlace::default()
    });
    let source = ScriptedSource::default().with("bakery X", vec![blank, place("A", "1")]);

    let mut orchestrator = Orchestrator::new(source, store);
    orchestrator.run().unwrap();
    assert_eq!(orchestrator.store().state().tasks[0].result_count, 1);
}

fn full_script() -> ScriptedSource {
    ScriptedSource::default()
        .with("bakery X", vec![place("A", "1 Main St"), place("B", "2 Main St")])
        .with("catering X", vec![place("E", "5 Hill Rd")])
        .with("hotel X", vec![place("B", "2 Main St"), place("C", "3 Main St")])
}

#[test]
fn resumed_session_matches_uninterrupted_run() {
    let batch = entries(&["bakery X", "catering X", "hotel X"]);

    let clean_dir = tempfile::tempdir().unwrap();
    let clean_store = SessionStore::open(&batch, clean_dir.path(), None, false).unwrap();
    let mut clean = Orchestrator::new(full_script(), clean_store);
    clean.run().unwrap();
    let clean_out = clean.store().output_dir().to_path_buf();

    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&batch, dir.path(), None, false).unwrap();
    let session_id = store.state().session_id.clone();
    let crashing = full_script().with("catering X", vec![place("E", "5 Hill Rd"), Step::Crash]);
    let mut first = Orchestrator::new(crashing, store);
    assert!(first.run().unwrap_err().is_fatal());
    drop(first);

    let resumed_store = SessionStore::open(&batch, dir.path(), None, false).unwrap();
    assert_eq!(resumed_store.state().session_id, session_id);
    let statuses: Vec<_> = resumed_store.state().tasks.iter().map(|t| t.status).collect();
    assert_eq!(
        statuses,
        vec![TaskStatus::Done, TaskStatus::Pending, TaskStatus::Pending]
    );

    let mut resumed = Orchestrator::new(full_script(), resumed_store);
    resumed.run().unwrap();
    let out = resumed.store().output_dir().to_path_buf();

    for category in ["Food_Businesses", "Event_Catering"] {
        assert_eq!(
            fs::read(master_file(&out, category)).unwrap(),
            fs::read(master_file(&clean_out, category)).unwrap(),
            "master for {} differs",
            category
        );
    }
    assert_eq!(names(&master_file(&out, "Food_Businesses")), vec!["A", "B", "C"]);
}

#[test]
fn resume_does_not_search_completed_keywords_again() {
    let batch = entries(&["bakery X", "hotel X"]);
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&batch, dir.path(), None, false).unwrap();
    let crashing = full_script().with("hotel X", vec![Step::Crash]);
    assert!(Orchestrator::new(crashing, store).run().is_err());

    let store = SessionStore::open(&batch, dir.path(), None, false).unwrap();
    let mut source = full_script();
    Orchestrator::new(&mut source, store).run().unwrap();
    assert_eq!(source.searched, vec!["hotel X"]);
}

#[test]
fn start_from_skips_earlier_keywords() {
    let dir = tempfile::tempdir().unwrap();
    let batch = entries(&["bakery X", "catering X", "hotel X"]);
    let store = SessionStore::open(&batch, dir.path(), Some(2), false).unwrap();
    let mut source = full_script();

    let summary = Orchestrator::new(&mut source, store).run().unwrap();
    assert_eq!(source.searched, vec!["hotel X"]);
    assert_eq!(summary.skipped(), 2);
    assert_eq!(summary.completed(), 1);
    assert_eq!(summary.total_accepted, 2);
}

#[test]
fn test_mode_builds_three_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let config = ScrapeConfig {
        test_mode: true,
        ..ScrapeConfig::default()
    };
    let batch = config.select_keywords(entries(&["bakery X", "catering X", "hotel X", "mess X"]));
    let store = SessionStore::open(&batch, dir.path(), None, false).unwrap();
    let keywords: Vec<_> = store.state().tasks.iter().map(|t| t.keyword.as_str()).collect();
    assert_eq!(keywords, vec!["bakery X", "catering X", "hotel X"]);
}

#[test]
fn keyword_named_after_the_master_keeps_its_own_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::open(&entries(&["Other all", "gym X"]), dir.path(), None, false).unwrap();
    let source = ScriptedSource::default()
        .with("Other all", vec![place("A", "1")])
        .with("gym X", vec![place("B", "2")]);

    let mut orchestrator = Orchestrator::new(source, store);
    let summary = orchestrator.run().unwrap();
    let out = orchestrator.store().output_dir().to_path_buf();

    assert_eq!(summary.total_scraped, 2);
    assert_eq!(summary.total_duplicates, 0);
    assert_eq!(names(&keyword_file(&out, "Other", "Other all")), vec!["A"]);
    assert_eq!(names(&master_file(&out, "Other")), vec!["A", "B"]);

    // A second pass over the same files must not pick up the master.
    let summary = Orchestrator::new(
        ScriptedSource::default(),
        SessionStore::resume(dir.path(), None).unwrap().unwrap(),
    )
    .run()
    .unwrap();
    assert_eq!(summary.total_scraped, 2);
}

#[test]
fn categories_sharing_a_directory_are_rejected_before_any_state() {
    let dir = tempfile::tempdir().unwrap();
    let batch = vec![
        KeywordEntry::with_category("bakery X", "Food Businesses"),
        KeywordEntry::with_category("hotel X", "Food_Businesses"),
    ];
    let err = SessionStore::open(&batch, dir.path(), None, false).unwrap_err();
    assert!(matches!(err, ScraperError::InvalidArgument(_)));
    assert!(!dir.path().join(STATE_FILE).exists());
}

#[test]
fn finished_session_with_a_failure_starts_over() {
    let dir = tempfile::tempdir().unwrap();
    let batch = entries(&["bakery X", "hotel X"]);
    let store = SessionStore::open(&batch, dir.path(), None, false).unwrap();
    let source = ScriptedSource::default()
        .with("bakery X", vec![place("A", "1")])
        .failing("hotel X");
    let mut orchestrator = Orchestrator::new(source, store);
    orchestrator.run().unwrap();
    assert!(orchestrator.store().state().finished_at.is_some());

    let reopened = SessionStore::open(&batch, dir.path(), None, false).unwrap();
    let state = reopened.state();
    assert!(state.finished_at.is_none());
    assert!(state.tasks.iter().all(|t| t.error.is_none() && t.result_count == 0));
    assert!(state.tasks.iter().all(|t| t.status == TaskStatus::Pending));
}

#[test]
fn single_keyword_run_writes_only_its_test_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = ScriptedSource::default()
        .with("bakery X", vec![place("A", "1"), place("a", "1."), place("B", "2")]);

    let run = run_single_keyword(&mut source, "bakery X", dir.path(), None).unwrap();
    assert_eq!(run.category, "Food_Businesses");
    let path = run.output.unwrap();
    assert_eq!(path, dir.path().join("test_results").join("test_bakery_X.csv"));
    assert_eq!(names(&path), vec!["A", "B"]);
    assert!(!dir.path().join(STATE_FILE).exists());

    let empty = run_single_keyword(&mut source, "mess X", dir.path(), Some(5)).unwrap();
    assert!(empty.places.is_empty());
    assert!(empty.output.is_none());
    assert!(!dir.path().join("test_results").join("test_mess_X.csv").exists());
}
