//! Pipeline progress as a structured event stream. Binaries render the
//! stream to the console; tests record it. Pipeline code itself never
//! prints.

use crate::record::VideoRecord;
use crate::store::UploadSummary;
use anyhow::Error;
use std::path::Path;

/// How one insert chunk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The store acknowledged this many inserted rows.
    Inserted(usize),
    /// The call succeeded but returned no rows; the whole chunk counts
    /// failed.
    EmptyResponse,
    /// The call itself failed.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkReport {
    pub number: usize,
    pub total_chunks: usize,
    pub rows: usize,
    pub status: ChunkStatus,
}

/// Observer for everything the pipeline wants to report. Every method has a
/// no-op default so implementations subscribe only to what they render.
pub trait PipelineEvents {
    fn on_channel_listed(&mut self, _list_url: &str, _total: usize) {}
    fn on_video_fetched(&mut self, _current: usize, _total: usize, _record: &VideoRecord) {}
    fn on_video_failed(&mut self, _current: usize, _total: usize, _url: &str, _error: &Error) {}
    fn on_chunk_uploaded(&mut self, _chunk: &ChunkReport) {}
    fn on_batch_uploaded(&mut self, _summary: &UploadSummary) {}
    fn on_dataset_written(&mut self, _path: &Path, _rows: usize) {}
}

/// Renders events as the human-readable status lines the tools print.
pub struct ConsoleReporter;

impl PipelineEvents for ConsoleReporter {
    fn on_channel_listed(&mut self, list_url: &str, total: usize) {
        println!("Found {} videos for {}", total, list_url);
    }

    fn on_video_fetched(&mut self, current: usize, total: usize, record: &VideoRecord) {
        if record.transcript.is_fetched() {
            println!("[{}/{}] Saved: {}", current, total, record.label());
        } else {
            println!(
                "[{}/{}] Saved: {} (transcript unavailable)",
                current,
                total,
                record.label()
            );
        }
    }

    fn on_video_failed(&mut self, current: usize, total: usize, url: &str, error: &Error) {
        eprintln!("  Warning: [{}/{}] failed to fetch {}: {}", current, total, url, error);
    }

    fn on_chunk_uploaded(&mut self, chunk: &ChunkReport) {
        match &chunk.status {
            ChunkStatus::Inserted(acknowledged) => {
                println!(
                    "  Batch {}/{}: inserted {} rows",
                    chunk.number, chunk.total_chunks, chunk.rows
                );
                if *acknowledged != chunk.rows {
                    eprintln!(
                        "  Warning: batch {} acknowledged {} of {} rows",
                        chunk.number, acknowledged, chunk.rows
                    );
                }
            }
            ChunkStatus::EmptyResponse => {
                eprintln!(
                    "  Warning: batch {}/{} returned no data; {} rows counted failed",
                    chunk.number, chunk.total_chunks, chunk.rows
                );
            }
            ChunkStatus::Failed(message) => {
                eprintln!(
                    "  Warning: batch {}/{} failed: {}",
                    chunk.number, chunk.total_chunks, message
                );
            }
        }
    }

    fn on_batch_uploaded(&mut self, summary: &UploadSummary) {
        println!();
        println!("Upload summary for {}", summary.table_name);
        println!("  Total rows: {}", summary.total_rows);
        println!("  Successful: {}", summary.successful_inserts);
        println!("  Failed: {}", summary.failed_inserts);
        println!("  Success rate: {:.1}%", summary.success_rate());
    }

    fn on_dataset_written(&mut self, path: &Path, rows: usize) {
        println!("Dataset saved to {} ({} rows)", path.display(), rows);
    }
}
