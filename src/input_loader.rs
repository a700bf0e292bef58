use std::fs::{self, File};
use std::path::Path;

use calamine::{open_workbook_auto, Reader};
use log::{info, warn};
use serde::Deserialize;

use crate::error::{Result, ScraperError};

/// One line of the keyword batch, with an optional category override.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct KeywordEntry {
    #[serde(rename = "keyword", alias = "Keyword", alias = "search", alias = "Search Keyword")]
    pub keyword: String,
    #[serde(rename = "category", alias = "Category", default)]
    pub category: Option<String>,
}

impl KeywordEntry {
    pub fn new(keyword: impl Into<String>) -> Self {
        KeywordEntry {
            keyword: keyword.into(),
            category: None,
        }
    }

    pub fn with_category(keyword: impl Into<String>, category: impl Into<String>) -> Self {
        KeywordEntry {
            keyword: keyword.into(),
            category: Some(category.into()),
        }
    }
}

/// Loads the keyword batch from a CSV file, a spreadsheet (xlsx, xls, ods)
/// or a plain-text file.
pub fn load_keywords<P: AsRef<Path>>(filename: P) -> Result<Vec<KeywordEntry>> {
    let path = filename.as_ref();
    if !path.exists() {
        return Err(ScraperError::Input {
            path: path.to_path_buf(),
            reason: "file does not exist".to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    let entries = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(path)?,
        "csv" => load_csv(path)?,
        _ => load_text(path)?,
    };

    let entries: Vec<KeywordEntry> = entries
        .into_iter()
        .map(|entry| KeywordEntry {
            keyword: entry.keyword.trim().to_string(),
            category: entry
                .category
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        })
        .filter(|entry| !entry.keyword.is_empty())
        .collect();

    if entries.is_empty() {
        return Err(ScraperError::InvalidArgument(format!(
            "no keywords found in {}",
            path.display()
        )));
    }
    info!("Loaded {} keywords from {:?}", entries.len(), path);
    Ok(entries)
}

fn input_error(path: &Path, reason: impl ToString) -> ScraperError {
    ScraperError::Input {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn load_csv(path: &Path) -> Result<Vec<KeywordEntry>> {
    let file = File::open(path).map_err(|e| input_error(path, e))?;
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut entries = Vec::new();
    for (row, result) in rdr.deserialize().enumerate() {
        match result {
            Ok(entry) => entries.push(entry),
            // Header is row 1, so data rows start at 2.
            Err(e) => warn!("Skipping keyword row {}: {}", row + 2, e),
        }
    }
    Ok(entries)
}

/// First sheet of any workbook format calamine recognizes.
fn load_workbook(path: &Path) -> Result<Vec<KeywordEntry>> {
    let mut workbook = open_workbook_auto(path).map_err(|e| input_error(path, e))?;
    let worksheets = workbook.worksheets();
    let Some((_name, range)) = worksheets.first() else {
        return Err(input_error(path, "workbook has no sheets"));
    };

    let mut keyword_idx = None;
    let mut category_idx = None;
    let mut entries = Vec::new();

    for (row_idx, row) in range.rows().enumerate() {
        if row_idx == 0 {
            for (col_idx, cell) in row.iter().enumerate() {
                let header = cell.to_string().to_lowercase();
                if header.contains("keyword") || header.contains("search") {
                    keyword_idx = Some(col_idx);
                } else if header.contains("category") {
                    category_idx = Some(col_idx);
                }
            }
            if keyword_idx.is_none() {
                return Err(input_error(path, "header row has no 'keyword' column"));
            }
            continue;
        }

        let keyword = keyword_idx
            .and_then(|i| row.get(i))
            .map(|c| c.to_string())
            .unwrap_or_default();
        let category = category_idx
            .and_then(|i| row.get(i))
            .map(|c| c.to_string())
            .filter(|s| !s.is_empty());
        entries.push(KeywordEntry { keyword, category });
    }
    Ok(entries)
}

fn load_text(path: &Path) -> Result<Vec<KeywordEntry>> {
    let content = fs::read_to_string(path).map_err(|e| input_error(path, e))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(KeywordEntry::new)
        .collect())
}
