//! Hosted table store client and the chunked batch uploader. The store
//! speaks the PostgREST dialect Supabase projects expose; the uploader only
//! sees the `TableSink` trait so its accounting can be tested against fakes.

use crate::config::StoreCredentials;
use crate::events::{ChunkReport, ChunkStatus, PipelineEvents};
use crate::record::DatasetRow;
use anyhow::{Context, Result, bail};
use serde_json::Value;

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// The one operation the uploader needs from a store: insert a chunk into a
/// named table, answering with the acknowledged row count.
pub trait TableSink {
    fn insert_rows(&mut self, table: &str, rows: &[DatasetRow]) -> Result<usize>;
}

/// Blocking client for one project endpoint. Calls carry no timeout, so an
/// unresponsive endpoint blocks the run.
pub struct TableStore {
    agent: ureq::Agent,
    base_url: String,
    key: String,
}

impl TableStore {
    pub fn new(credentials: &StoreCredentials) -> Self {
        Self {
            agent: ureq::agent(),
            base_url: credentials.url.trim_end_matches('/').to_string(),
            key: credentials.key.clone(),
        }
    }

    fn table_endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Bulk insert. The request asks the store to return the inserted
    /// representation; the reply's row count is the acknowledgment the
    /// uploader's accounting is based on.
    pub fn insert_rows(&self, table: &str, rows: &[DatasetRow]) -> Result<usize> {
        let request = self
            .agent
            .post(&self.table_endpoint(table))
            .set("apikey", &self.key)
            .set("Authorization", &format!("Bearer {}", self.key))
            .set("Prefer", "return=representation");

        let response = match request.send_json(rows) {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                bail!("insert into {} rejected (status {})", table, code)
            }
            Err(err) => {
                return Err(err).with_context(|| format!("inserting rows into {}", table));
            }
        };

        let returned: Vec<Value> = response
            .into_json()
            .with_context(|| format!("reading insert response for {}", table))?;
        Ok(returned.len())
    }

    /// Verification probe: the first `limit` rows currently visible in the
    /// table.
    pub fn fetch_rows(&self, table: &str, limit: usize) -> Result<Vec<Value>> {
        let request = self
            .agent
            .get(&self.table_endpoint(table))
            .set("apikey", &self.key)
            .set("Authorization", &format!("Bearer {}", self.key))
            .query("select", "*")
            .query("limit", &limit.to_string());

        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                bail!("select from {} rejected (status {})", table, code)
            }
            Err(err) => {
                return Err(err).with_context(|| format!("selecting rows from {}", table));
            }
        };

        response
            .into_json()
            .with_context(|| format!("reading select response for {}", table))
    }
}

impl TableSink for TableStore {
    fn insert_rows(&mut self, table: &str, rows: &[DatasetRow]) -> Result<usize> {
        TableStore::insert_rows(self, table, rows)
    }
}

/// Accounting for one upload run against one table.
/// `successful_inserts + failed_inserts == total_rows` holds by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub table_name: String,
    pub total_rows: usize,
    pub successful_inserts: usize,
    pub failed_inserts: usize,
}

impl UploadSummary {
    /// Percentage of rows in successful chunks; 0 when there was nothing to
    /// upload.
    pub fn success_rate(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            self.successful_inserts as f64 / self.total_rows as f64 * 100.0
        }
    }
}

/// Uploads rows in consecutive chunks of at most `batch_size`. A chunk
/// counts fully successful only when the store acknowledges a non-empty
/// payload; on an empty acknowledgment or an error every row in the chunk
/// counts failed and the run continues with the next chunk. No retries, no
/// abort.
pub fn upload_in_batches(
    sink: &mut dyn TableSink,
    table_name: &str,
    rows: &[DatasetRow],
    batch_size: usize,
    events: &mut dyn PipelineEvents,
) -> UploadSummary {
    let batch_size = batch_size.max(1);
    let total_rows = rows.len();
    let total_chunks = total_rows.div_ceil(batch_size);
    let mut successful_inserts = 0;
    let mut failed_inserts = 0;

    for (index, chunk) in rows.chunks(batch_size).enumerate() {
        let status = match sink.insert_rows(table_name, chunk) {
            Ok(0) => {
                failed_inserts += chunk.len();
                ChunkStatus::EmptyResponse
            }
            Ok(acknowledged) => {
                successful_inserts += chunk.len();
                ChunkStatus::Inserted(acknowledged)
            }
            Err(err) => {
                failed_inserts += chunk.len();
                ChunkStatus::Failed(err.to_string())
            }
        };
        events.on_chunk_uploaded(&ChunkReport {
            number: index + 1,
            total_chunks,
            rows: chunk.len(),
            status,
        });
    }

    let summary = UploadSummary {
        table_name: table_name.to_string(),
        total_rows,
        successful_inserts,
        failed_inserts,
    };
    events.on_batch_uploaded(&summary);
    summary
}
