//! Raw extract import
//!
//! Loads the four extract collections from a directory holding the dataset
//! export, one file per extract named after it (`studentInfo.csv`,
//! `assessments.json`, `studentAssessment.jsonl`, ...). Supported formats:
//!
//! - `.csv` with a header row; cells are typed by inference (integer,
//!   float, `true`/`false`, otherwise string) and empty cells are left out
//!   of the document
//! - `.json` holding an array of objects
//! - `.jsonl` holding one object per line
//!
//! Each extract collection is replaced as a whole; destination collections
//! are never touched.

use crate::db::store::DocumentStore;
use crate::etl::raw::RawSource;
use crate::{Document, Error, Result};
use serde_json::{Number, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Extensions looked up for each extract, in order of preference
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["csv", "json", "jsonl"];

/// One loaded extract file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedFile {
    pub source: RawSource,
    pub path: PathBuf,
    pub documents: u64,
}

/// Result of [`import_raw_directory`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: Vec<ImportedFile>,
    /// Extracts with no file in the directory
    pub missing: Vec<RawSource>,
}

impl ImportReport {
    pub fn total_documents(&self) -> u64 {
        self.imported.iter().map(|f| f.documents).sum()
    }
}

/// Import every extract found in `dir`
pub async fn import_raw_directory(store: &DocumentStore, dir: &Path) -> Result<ImportReport> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "Import directory not found: {}",
            dir.display()
        )));
    }

    info!("=== Import: loading raw extracts from {} ===", dir.display());
    let mut report = ImportReport::default();

    for source in RawSource::ALL {
        let Some(path) = find_extract(dir, source) else {
            warn!(
                "No {} file for '{}' in {}, skipping",
                SUPPORTED_EXTENSIONS.join("/"),
                source,
                dir.display()
            );
            report.missing.push(source);
            continue;
        };

        let docs = read_raw_file(&path)?;
        let documents = store.replace_contents(source.collection(), &docs).await?;
        info!("  ✓ {} <- {} ({} documents)", source, path.display(), documents);

        report.imported.push(ImportedFile {
            source,
            path,
            documents,
        });
    }

    info!(
        "=== Import complete: {} documents in {} collections ===",
        report.total_documents(),
        report.imported.len()
    );
    Ok(report)
}

fn find_extract(dir: &Path, source: RawSource) -> Option<PathBuf> {
    SUPPORTED_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", source.file_stem(), ext)))
        .find(|path| path.is_file())
}

/// Read one extract file into documents, choosing the format by extension
pub fn read_raw_file(path: &Path) -> Result<Vec<Document>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("csv") => read_csv(path),
        Some("json") => read_json_array(path),
        Some("jsonl") => read_json_lines(path),
        _ => Err(Error::InvalidInput(format!(
            "Unsupported extract format: {}",
            path.display()
        ))),
    }
}

fn read_csv(path: &Path) -> Result<Vec<Document>> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut docs = Vec::new();
    for row in reader.records() {
        let row = row?;
        let doc: Document = headers
            .iter()
            .zip(row.iter())
            .filter_map(|(name, cell)| infer_cell(cell).map(|value| (name.to_string(), value)))
            .collect();
        docs.push(doc);
    }
    Ok(docs)
}

/// Type a CSV cell; `None` for an empty cell
pub fn infer_cell(cell: &str) -> Option<Value> {
    if cell.is_empty() {
        return None;
    }

    if let Ok(i) = cell.parse::<i64>() {
        return Some(Value::from(i));
    }
    if let Some(number) = cell.parse::<f64>().ok().and_then(Number::from_f64) {
        // Number::from_f64 rejects NaN and infinities, which stay strings
        return Some(Value::Number(number));
    }

    Some(match cell {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        text => Value::String(text.to_string()),
    })
}

fn read_json_array(path: &Path) -> Result<Vec<Document>> {
    let content = fs::read_to_string(path)?;
    let items: Vec<Value> = serde_json::from_str(&content)?;
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| into_document(item, path, idx + 1))
        .collect()
}

fn read_json_lines(path: &Path) -> Result<Vec<Document>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| into_document(serde_json::from_str(line)?, path, idx + 1))
        .collect()
}

fn into_document(value: Value, path: &Path, position: usize) -> Result<Document> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::InvalidInput(format!(
            "{}: entry {} is not a JSON object",
            path.display(),
            position
        ))),
    }
}
