//! The per-channel ingest loop: list, fetch metadata, fetch transcript,
//! assemble records. Metadata failures are caught per video so one broken
//! entry cannot abort a channel run.

use crate::events::PipelineEvents;
use crate::record::{NO_DESCRIPTION, UNKNOWN_DATE, UNKNOWN_TITLE, VideoRecord};
use crate::transcript::TranscriptSource;
use crate::youtube;
use anyhow::Result;

/// One channel run: where to list from and how many listed entries to fetch.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub channel_url: String,
    pub limit: Option<usize>,
}

/// Drives fetching for one channel against a transcript backend.
pub struct ChannelIngest<S> {
    transcripts: S,
}

impl<S: TranscriptSource> ChannelIngest<S> {
    pub fn new(transcripts: S) -> Self {
        Self { transcripts }
    }

    /// Fetches one video. An unresolvable URL yields the sentinel record
    /// without touching the network; a failing metadata call is an error the
    /// caller decides how to handle. Transcript failures never surface here,
    /// they ride along inside the record.
    pub async fn fetch_video(&self, url: &str) -> Result<VideoRecord> {
        let Some(video_id) = youtube::resolve_video_id(url) else {
            return Ok(VideoRecord::invalid_url(url));
        };

        let info = youtube::fetch_video_info(url)?;
        let title = info.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string());
        let upload_date = info
            .upload_date
            .as_deref()
            .and_then(youtube::format_upload_date)
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());
        let description = info
            .description
            .map(|text| text.trim().to_string())
            .unwrap_or_else(|| NO_DESCRIPTION.to_string());
        let transcript = self.transcripts.fetch_joined(&video_id).await;

        Ok(VideoRecord {
            url: url.to_string(),
            title: Some(title),
            upload_date: Some(upload_date),
            description: Some(description),
            transcript,
        })
    }

    /// Lists the channel and fetches each video in platform order, reporting
    /// progress through `events`. The listed total reflects the whole
    /// channel even when `limit` caps how many entries are fetched.
    pub async fn ingest_channel(
        &self,
        options: &IngestOptions,
        events: &mut dyn PipelineEvents,
    ) -> Result<Vec<VideoRecord>> {
        let list_url = youtube::normalize_channel_url(&options.channel_url);
        let urls = youtube::list_channel_videos(&options.channel_url)?;
        events.on_channel_listed(&list_url, urls.len());

        let selected = match options.limit {
            Some(limit) if limit < urls.len() => &urls[..limit],
            _ => &urls[..],
        };

        let total = selected.len();
        let mut records = Vec::with_capacity(total);
        for (index, url) in selected.iter().enumerate() {
            match self.fetch_video(url).await {
                Ok(record) => {
                    events.on_video_fetched(index + 1, total, &record);
                    records.push(record);
                }
                Err(err) => {
                    events.on_video_failed(index + 1, total, url, &err);
                }
            }
        }
        Ok(records)
    }
}
