#![forbid(unsafe_code)]

//! Bulk uploader that pushes every CSV dataset in the data directory into
//! its Supabase table. The table name comes from the file stem; a creator in
//! `creators.toml` whose table matches contributes credential overrides.
//! Acts like the publish step after a scraping session.

use anyhow::{Result, anyhow, bail};
use std::env;
use std::path::{Path, PathBuf};
use tubescribe::config::{
    CreatorRegistry, DEFAULT_CREATORS_PATH, DEFAULT_DATA_DIR, SUPABASE_KEY_VAR, SUPABASE_URL_VAR,
    StoreCredentials, StoreOverrides, maybe_store_credentials,
};
use tubescribe::dataset::{dataset_path, list_dataset_files, read_dataset, table_name_for};
use tubescribe::events::ConsoleReporter;
use tubescribe::store::{DEFAULT_BATCH_SIZE, TableStore, UploadSummary, upload_in_batches};

const VERIFY_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone)]
struct UploadArgs {
    data_dir: PathBuf,
    creator: Option<String>,
    batch_size: usize,
    creators_path: PathBuf,
    skip_verify: bool,
    store: StoreOverrides,
}

impl UploadArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(env::args().skip(1))
    }

    #[cfg(test)]
    fn from_slice(values: &[&str]) -> Result<Self> {
        Self::from_iter(values.iter().map(|value| value.to_string()))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut data_dir = PathBuf::from(DEFAULT_DATA_DIR);
        let mut creator: Option<String> = None;
        let mut batch_size = DEFAULT_BATCH_SIZE;
        let mut creators_path = PathBuf::from(DEFAULT_CREATORS_PATH);
        let mut skip_verify = false;
        let mut store = StoreOverrides::default();
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if let Some(value) = arg.strip_prefix("--data-dir=") {
                data_dir = PathBuf::from(value);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--creator=") {
                creator = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--batch-size=") {
                batch_size = parse_batch_size(value)?;
                continue;
            }
            if let Some(value) = arg.strip_prefix("--creators=") {
                creators_path = PathBuf::from(value);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--env-file=") {
                store.env_path = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--supabase-url=") {
                store.url = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--supabase-key=") {
                store.key = Some(value.to_string());
                continue;
            }

            match arg.as_str() {
                "--data-dir" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--data-dir requires a value"))?;
                    data_dir = PathBuf::from(value);
                }
                "--creator" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--creator requires a value"))?;
                    creator = Some(value);
                }
                "--batch-size" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--batch-size requires a value"))?;
                    batch_size = parse_batch_size(&value)?;
                }
                "--creators" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--creators requires a value"))?;
                    creators_path = PathBuf::from(value);
                }
                "--env-file" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--env-file requires a value"))?;
                    store.env_path = Some(PathBuf::from(value));
                }
                "--supabase-url" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--supabase-url requires a value"))?;
                    store.url = Some(value);
                }
                "--supabase-key" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--supabase-key requires a value"))?;
                    store.key = Some(value);
                }
                "--skip-verify" => {
                    skip_verify = true;
                }
                _ => {
                    bail!("unknown argument: {arg}");
                }
            }
        }

        Ok(Self {
            data_dir,
            creator,
            batch_size,
            creators_path,
            skip_verify,
            store,
        })
    }
}

fn parse_batch_size(value: &str) -> Result<usize> {
    let parsed: usize = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("invalid --batch-size value: {value}"))?;
    if parsed == 0 {
        bail!("--batch-size must be at least 1");
    }
    Ok(parsed)
}

/// Effective credentials for a table: a registry creator whose table matches
/// contributes overrides, otherwise the defaults apply.
fn credentials_for(
    registry: &CreatorRegistry,
    table: &str,
    defaults: Option<&StoreCredentials>,
) -> Option<StoreCredentials> {
    match registry.by_table(table) {
        Some(config) => config.credentials(defaults),
        None => defaults.cloned(),
    }
}

/// Uploads one dataset file and, unless disabled, probes the table afterwards
/// to confirm rows are visible.
fn upload_file(
    path: &Path,
    table: &str,
    credentials: &StoreCredentials,
    batch_size: usize,
    skip_verify: bool,
) -> Result<UploadSummary> {
    let rows = read_dataset(path)?;
    let mut sink = TableStore::new(credentials);
    let mut events = ConsoleReporter;
    let summary = upload_in_batches(&mut sink, table, &rows, batch_size, &mut events);
    if !skip_verify {
        match sink.fetch_rows(table, VERIFY_SAMPLE_ROWS) {
            Ok(sample) => println!("Verification: {} returned {} row(s)", table, sample.len()),
            Err(err) => eprintln!("  Warning: could not verify {}: {}", table, err),
        }
    }
    Ok(summary)
}

fn report_overall(summaries: &[UploadSummary]) {
    let total_rows: usize = summaries.iter().map(|summary| summary.total_rows).sum();
    let successful: usize = summaries
        .iter()
        .map(|summary| summary.successful_inserts)
        .sum();
    let failed: usize = summaries.iter().map(|summary| summary.failed_inserts).sum();
    println!();
    println!("All dataset uploads complete.");
    println!("Tables: {}", summaries.len());
    println!("Total rows: {}", total_rows);
    println!("Successful: {}", successful);
    println!("Failed: {}", failed);
}

/// Scans the data directory for datasets and uploads each to the table named
/// by its file stem.
fn main() -> Result<()> {
    let UploadArgs {
        data_dir,
        creator,
        batch_size,
        creators_path,
        skip_verify,
        store,
    } = UploadArgs::parse()?;

    let registry = CreatorRegistry::load(&creators_path)?;
    let defaults = maybe_store_credentials(store)?;

    println!("Data directory: {}", data_dir.display());
    println!("Creator registry: {}", creators_path.display());

    if let Some(slug) = &creator {
        let config = registry.get(slug).ok_or_else(|| {
            anyhow!(
                "creator `{}` is not listed in {}",
                slug,
                creators_path.display()
            )
        })?;
        let credentials = config.credentials(defaults.as_ref()).ok_or_else(|| {
            anyhow!(
                "creator `{}` has no store credentials; set {} and {} or add overrides to {}",
                slug,
                SUPABASE_URL_VAR,
                SUPABASE_KEY_VAR,
                creators_path.display()
            )
        })?;
        let path = dataset_path(&data_dir, &config.table);
        println!();
        println!("Uploading {} to table {}", path.display(), config.table);
        let summary = upload_file(&path, &config.table, &credentials, batch_size, skip_verify)?;
        report_overall(&[summary]);
        return Ok(());
    }

    let files = list_dataset_files(&data_dir)?;
    if files.is_empty() {
        println!("No dataset files found in {}.", data_dir.display());
        return Ok(());
    }

    println!("Found {} dataset file(s) to upload.", files.len());
    for file in &files {
        println!("  - {}", file.display());
    }

    let mut summaries = Vec::new();
    let mut skipped_for_credentials = 0usize;

    for (index, path) in files.iter().enumerate() {
        let current = index + 1;
        let Some(table) = table_name_for(path) else {
            eprintln!(
                "  Warning: skipping {}, cannot derive a table name",
                path.display()
            );
            continue;
        };

        let Some(credentials) = credentials_for(&registry, &table, defaults.as_ref()) else {
            skipped_for_credentials += 1;
            eprintln!(
                "  Warning: skipping {}, store credentials are not configured",
                table
            );
            continue;
        };

        println!();
        println!(
            "[{}/{}] Uploading {} to table {}",
            current,
            files.len(),
            path.display(),
            table
        );
        match upload_file(path, &table, &credentials, batch_size, skip_verify) {
            Ok(summary) => summaries.push(summary),
            Err(err) => eprintln!("  Warning: upload failed for {}: {}", table, err),
        }
    }

    if summaries.is_empty() && skipped_for_credentials > 0 {
        bail!(
            "no datasets uploaded; set {} and {} or add per-creator overrides to {}",
            SUPABASE_URL_VAR,
            SUPABASE_KEY_VAR,
            creators_path.display()
        );
    }

    report_overall(&summaries);
    Ok(())
}
