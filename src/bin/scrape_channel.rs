#![forbid(unsafe_code)]

//! Command-line scraper that turns one YouTube channel into a transcript
//! dataset: list the channel with yt-dlp, fetch metadata and captions per
//! video, write the CSV, and optionally push the rows straight into the
//! creator's Supabase table.
//!
//! Channels can be addressed directly by URL or by a slug from
//! `creators.toml`, which also supplies the table name and any per-creator
//! store credentials.

use anyhow::{Context, Result, anyhow, bail};
use std::env;
use std::path::{Path, PathBuf};
use tubescribe::config::{
    CreatorRegistry, DEFAULT_CREATORS_PATH, DEFAULT_DATA_DIR, StoreOverrides,
    maybe_store_credentials, resolve_store_credentials,
};
use tubescribe::dataset::{dataset_path, write_dataset};
use tubescribe::events::{ConsoleReporter, PipelineEvents};
use tubescribe::ingest::{ChannelIngest, IngestOptions};
use tubescribe::record::{DatasetRow, VideoRecord};
use tubescribe::store::{DEFAULT_BATCH_SIZE, TableStore, upload_in_batches};
use tubescribe::transcript::TranscriptFetcher;
use tubescribe::youtube::ensure_program_available;

const VERIFY_SAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone)]
struct ScrapeArgs {
    channel_url: Option<String>,
    creator: Option<String>,
    output: Option<PathBuf>,
    limit: Option<usize>,
    upload: bool,
    table: Option<String>,
    batch_size: usize,
    creators_path: PathBuf,
    store: StoreOverrides,
}

impl ScrapeArgs {
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
        let mut channel_url: Option<String> = None;
        let mut creator: Option<String> = None;
        let mut output: Option<PathBuf> = None;
        let mut limit: Option<usize> = None;
        let mut upload = false;
        let mut table: Option<String> = None;
        let mut batch_size = DEFAULT_BATCH_SIZE;
        let mut creators_path = PathBuf::from(DEFAULT_CREATORS_PATH);
        let mut store = StoreOverrides::default();
        let mut args = iter.into_iter();

        while let Some(arg) = args.next() {
            if arg == "--" {
                for value in args {
                    Self::set_channel(&mut channel_url, value)?;
                }
                break;
            }

            if let Some(value) = arg.strip_prefix("--creator=") {
                creator = Some(value.to_string());
                continue;
            }
            if let Some(value) = arg.strip_prefix("--output=") {
                output = Some(PathBuf::from(value));
                continue;
            }
            if let Some(value) = arg.strip_prefix("--limit=") {
                limit = Some(parse_limit(value)?);
                continue;
            }
            if let Some(value) = arg.strip_prefix("--table=") {
                table = Some(value.to_string());
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
                "--creator" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--creator requires a value"))?;
                    creator = Some(value);
                }
                "--output" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--output requires a value"))?;
                    output = Some(PathBuf::from(value));
                }
                "--limit" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--limit requires a value"))?;
                    limit = Some(parse_limit(&value)?);
                }
                "--upload" => {
                    upload = true;
                }
                "--table" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--table requires a value"))?;
                    table = Some(value);
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
                _ if arg.starts_with('-') => {
                    bail!("unknown argument: {arg}");
                }
                _ => {
                    Self::set_channel(&mut channel_url, arg)?;
                }
            }
        }

        if channel_url.is_some() && creator.is_some() {
            bail!("cannot provide both a channel URL and --creator");
        }
        if channel_url.is_none() && creator.is_none() {
            bail!(
                "Usage: scrape_channel [--output <path>] [--limit <n>] [--upload] [--table <name>] [--batch-size <n>] [--creators <path>] [--env-file <path>] [--supabase-url <url>] [--supabase-key <key>] <channel_url>\n       scrape_channel --creator <slug> [--output <path>] [--limit <n>] [--upload] [--batch-size <n>] [--creators <path>] [--env-file <path>] [--supabase-url <url>] [--supabase-key <key>]"
            );
        }
        if output.is_none() && creator.is_none() {
            bail!("--output is required when scraping a plain channel URL");
        }
        if upload && table.is_none() && creator.is_none() {
            bail!("--upload needs --table or --creator to name the destination table");
        }

        Ok(Self {
            channel_url,
            creator,
            output,
            limit,
            upload,
            table,
            batch_size,
            creators_path,
            store,
        })
    }

    fn set_channel(target: &mut Option<String>, value: String) -> Result<()> {
        if target.is_some() {
            bail!("channel URL specified multiple times");
        }
        *target = Some(value);
        Ok(())
    }
}

fn parse_limit(value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid --limit value: {value}"))
}

fn parse_batch_size(value: &str) -> Result<usize> {
    let parsed: usize = value
        .trim()
        .parse()
        .with_context(|| format!("invalid --batch-size value: {value}"))?;
    if parsed == 0 {
        bail!("--batch-size must be at least 1");
    }
    Ok(parsed)
}

fn verify_table(store: &TableStore, table: &str) {
    match store.fetch_rows(table, VERIFY_SAMPLE_ROWS) {
        Ok(rows) => println!("Verification: {} returned {} row(s)", table, rows.len()),
        Err(err) => eprintln!("  Warning: could not verify {}: {}", table, err),
    }
}

/// CLI entry point. Resolves the target channel and credentials, runs the
/// ingest loop, writes the dataset, and uploads when asked to.
#[tokio::main]
async fn main() -> Result<()> {
    let ScrapeArgs {
        channel_url,
        creator,
        output,
        limit,
        upload,
        table,
        batch_size,
        creators_path,
        store,
    } = ScrapeArgs::parse()?;

    ensure_program_available("yt-dlp")?;

    let registry = CreatorRegistry::load(&creators_path)?;
    let creator_config = match &creator {
        Some(slug) => {
            let config = registry.get(slug).ok_or_else(|| {
                anyhow!(
                    "creator `{}` is not listed in {}",
                    slug,
                    creators_path.display()
                )
            })?;
            Some(config.clone())
        }
        None => None,
    };

    let channel = match (&creator_config, &channel_url) {
        (Some(config), _) => config.channel.clone().ok_or_else(|| {
            anyhow!(
                "creator `{}` has no channel URL configured",
                config.display_name
            )
        })?,
        (None, Some(url)) => url.clone(),
        (None, None) => bail!("a channel URL or --creator <slug> is required"),
    };

    let table_name = table.or_else(|| creator_config.as_ref().map(|config| config.table.clone()));
    let output_path = match (output, &table_name) {
        (Some(path), _) => path,
        (None, Some(table)) => dataset_path(Path::new(DEFAULT_DATA_DIR), table),
        (None, None) => bail!("--output or --creator is required to name the dataset"),
    };

    println!("===================================");
    println!("YouTube Transcript Scraper");
    println!("===================================");
    if let Some(config) = &creator_config {
        println!("Creator: {}", config.display_name);
    }
    println!("Channel: {channel}");
    println!("Dataset: {}", output_path.display());
    if let Some(limit) = limit {
        println!("Limit: {limit} videos");
    }
    println!();

    let transcripts = TranscriptFetcher::new()?;
    let ingest = ChannelIngest::new(transcripts);
    let mut events = ConsoleReporter;

    let options = IngestOptions {
        channel_url: channel,
        limit,
    };
    let records = ingest.ingest_channel(&options, &mut events).await?;
    let rows: Vec<DatasetRow> = records.iter().map(VideoRecord::to_row).collect();

    write_dataset(&output_path, &rows)?;
    events.on_dataset_written(&output_path, rows.len());

    if upload {
        let table = table_name.ok_or_else(|| {
            anyhow!("--upload needs --table or --creator to name the destination table")
        })?;
        let credentials = match &creator_config {
            Some(config) => config.credentials(maybe_store_credentials(store)?.as_ref()),
            None => Some(resolve_store_credentials(store)?),
        };
        match credentials {
            Some(credentials) => {
                let mut sink = TableStore::new(&credentials);
                println!();
                println!("Uploading {} rows to {}...", rows.len(), table);
                upload_in_batches(&mut sink, &table, &rows, batch_size, &mut events);
                verify_table(&sink, &table);
            }
            None => {
                eprintln!(
                    "  Warning: skipping upload for {}, store credentials are not configured",
                    table
                );
            }
        }
    }

    println!();
    println!("===================================");
    println!("Scrape complete!");
    println!("===================================");
    println!("Videos: {}", rows.len());
    println!("Dataset: {}", output_path.display());

    Ok(())
}
