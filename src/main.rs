use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use maps_scraper_lib::cli::Args;
use maps_scraper_lib::{input_loader, logger};
use maps_scraper_lib::{
    run_single_keyword, FixtureSource, MapsScraper, Orchestrator, PlaceSource, Result,
    ScrapeConfig, SessionStore, SessionSummary, SingleKeywordRun,
};

fn main() -> ExitCode {
    let config = Args::parse().into_config();
    logger::init();

    let outcome = match config.single_keyword.clone() {
        Some(keyword) => single(&config, &keyword).map(|run| print_sample(&keyword, &run)),
        None => run(config).map(|summary| println!("\n{}", summary.render())),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Scraping aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_source(config: &ScrapeConfig) -> Result<Box<dyn PlaceSource>> {
    Ok(match &config.replay_file {
        Some(path) => Box::new(FixtureSource::from_file(path)?),
        None => Box::new(MapsScraper::new(
            &config.search_url,
            config.request_timeout,
            config.delays.clone(),
        )?),
    })
}

fn single(config: &ScrapeConfig, keyword: &str) -> Result<SingleKeywordRun> {
    config.validate()?;
    let mut source = build_source(config)?;
    run_single_keyword(
        source.as_mut(),
        keyword.trim(),
        &config.base_dir,
        config.max_per_keyword,
    )
}

fn print_sample(keyword: &str, run: &SingleKeywordRun) {
    let Some(path) = &run.output else {
        println!("No places found for '{}' [{}]", keyword, run.category);
        return;
    };
    println!("Found {} places for '{}' [{}]", run.places.len(), keyword, run.category);
    println!("Results saved to: {}", path.display());
    println!("\nSample Results:\n{}", "-".repeat(30));
    for (i, place) in run.places.iter().take(3).enumerate() {
        println!("{}. {}", i + 1, place.name);
        println!("   Address: {}", place.address);
        println!("   Phone: {}", place.phone.as_deref().unwrap_or("-"));
        println!("   Website: {}", place.website.as_deref().unwrap_or("-"));
        match (place.rating, place.review_count) {
            (Some(rating), Some(count)) => println!("   Rating: {} ({} reviews)", rating, count),
            (Some(rating), None) => println!("   Rating: {}", rating),
            _ => println!("   Rating: -"),
        }
    }
}

fn run(config: ScrapeConfig) -> Result<SessionSummary> {
    config.validate()?;

    let entries = config.select_keywords(input_loader::load_keywords(&config.keywords_file)?);
    if config.test_mode {
        info!("TEST MODE: Processing only {} keywords", entries.len());
    }

    // Build the source before touching session state so bad inputs fail early.
    let source = build_source(&config)?;

    let store = SessionStore::open(&entries, &config.base_dir, config.start_from, config.fresh)?;
    let log_path = store.output_dir().join("scraping_log.txt");
    if let Err(e) = logger::attach_session_log(&log_path) {
        error!("Could not open session log {:?}: {}", log_path, e);
    }

    info!("Starting batch scrape of {} keywords", entries.len());
    info!("Results will be saved to: {:?}", store.output_dir());
    if let Some(max) = config.max_per_keyword {
        info!("Max results per keyword: {}", max);
    }

    Orchestrator::new(source, store)
        .with_max_per_keyword(config.max_per_keyword)
        .with_delays(config.delays.clone())
        .run()
}
