use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScraperError};
use crate::record::{Place, PlaceRow};
use crate::resume_manager::write_atomic;

/// Column order of every CSV output. Matches the field order of `PlaceRow`.
pub const PLACE_COLUMNS: [&str; 25] = [
    "name",
    "address",
    "phone",
    "website",
    "business_type",
    "category",
    "rating",
    "review_count",
    "price_range",
    "in_store",
    "pickup",
    "delivery",
    "dine_in",
    "takeaway",
    "reservations",
    "opens_at",
    "full_hours",
    "introduction",
    "services_offered",
    "photos_count",
    "maps_url",
    "place_id",
    "coordinates",
    "source_keyword",
    "scraped_at",
];

/// File-system friendly form of a keyword or category: keeps word
/// characters, whitespace and '-', then turns whitespace into '_'.
pub fn safe_name(value: &str) -> String {
    let kept: String = value
        .trim()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if kept.is_empty() {
        "unnamed".to_string()
    } else {
        kept
    }
}

pub fn category_dir(output_dir: &Path, category: &str) -> PathBuf {
    output_dir.join(safe_name(category))
}

pub fn keyword_file(output_dir: &Path, category: &str, keyword: &str) -> PathBuf {
    category_dir(output_dir, category).join(format!("{}.csv", safe_name(keyword)))
}

/// `<Category>/<Category>.all.csv`. `safe_name` never yields a '.', so no
/// keyword file can land on this path.
pub fn master_file(output_dir: &Path, category: &str) -> PathBuf {
    let name = safe_name(category);
    category_dir(output_dir, category).join(format!("{}.all.csv", name))
}

/// Output of a `--single-keyword` run, outside any session.
pub fn single_keyword_file(base_dir: &Path, keyword: &str) -> PathBuf {
    base_dir
        .join("test_results")
        .join(format!("test_{}.csv", safe_name(keyword)))
}

/// Writes `places` with a header row, replacing `path` atomically. An empty
/// slice produces a header-only file.
pub fn write_places(path: &Path, places: &[Place]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.write_record(PLACE_COLUMNS)?;
    for place in places {
        wtr.serialize(PlaceRow::from(place))?;
    }
    let bytes = wtr
        .into_inner()
        .map_err(|e| ScraperError::write_failure(path, e.into_error()))?;
    write_atomic(path, &bytes)
}

pub fn read_places(path: &Path) -> Result<Vec<Place>> {
    let file = File::open(path).map_err(|e| ScraperError::Input {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut places = Vec::new();
    for row in rdr.deserialize::<PlaceRow>() {
        places.push(Place::from(row?));
    }
    Ok(places)
}
