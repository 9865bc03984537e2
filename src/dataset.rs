//! CSV datasets on disk: the write/read pair and the data-directory sweep
//! the bulk uploader works from.

use crate::record::DatasetRow;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Column order of every dataset file.
pub const CSV_COLUMNS: [&str; 5] = ["date", "title", "url", "transcript", "description"];

/// Conventional location of a creator's dataset inside the data directory.
pub fn dataset_path(data_dir: &Path, table: &str) -> PathBuf {
    data_dir.join(format!("{table}.csv"))
}

/// Writes rows to `path`, truncating any previous file. The header is always
/// emitted, even for an empty run, so downstream readers see the schema.
pub fn write_dataset(path: &Path, rows: &[DatasetRow]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating dataset directory {}", parent.display()))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("opening {} for writing", path.display()))?;
    writer
        .write_record(CSV_COLUMNS)
        .with_context(|| format!("writing header to {}", path.display()))?;
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("writing row for {}", row.url))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing {}", path.display()))?;
    Ok(())
}

/// Reads a dataset file back into rows, mapping columns by header name.
pub fn read_dataset(path: &Path) -> Result<Vec<DatasetRow>> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: DatasetRow = result.with_context(|| format!("parsing {}", path.display()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// The `*.csv` files directly inside the data directory, sorted by name so
/// upload runs visit tables in a stable order. A missing directory is an
/// empty listing.
pub fn list_dataset_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.with_context(|| format!("scanning {}", dir.display()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|ext| ext.to_str()) == Some("csv")
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Table name for a dataset file: its file stem.
pub fn table_name_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
}
