//! Transcript retrieval. Failures on this path never propagate: every
//! outcome is folded into `TranscriptText` so one caption-less video cannot
//! abort a channel run.

use crate::record::TranscriptText;
use anyhow::{Result, anyhow};
use std::future::Future;
use yt_transcript_rs::api::YouTubeTranscriptApi;

/// Languages requested from the platform, in preference order.
pub const TRANSCRIPT_LANGUAGES: &[&str] = &["en"];

/// Seam between the pipeline and the transcript backend so tests can supply
/// canned transcripts instead of touching the network.
pub trait TranscriptSource {
    fn fetch_joined(&self, video_id: &str) -> impl Future<Output = TranscriptText>;
}

pub struct TranscriptFetcher {
    api: YouTubeTranscriptApi,
}

impl TranscriptFetcher {
    pub fn new() -> Result<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|err| anyhow!("initializing transcript client: {err}"))?;
        Ok(Self { api })
    }
}

impl TranscriptSource for TranscriptFetcher {
    /// Fetches the transcript for a video id and joins all segment texts
    /// with single spaces. Any retrieval failure becomes
    /// `TranscriptText::Failed` carrying the backend's message.
    async fn fetch_joined(&self, video_id: &str) -> TranscriptText {
        match self
            .api
            .fetch_transcript(video_id, TRANSCRIPT_LANGUAGES, false)
            .await
        {
            Ok(transcript) => TranscriptText::Fetched(join_segments(
                transcript.snippets.iter().map(|snippet| snippet.text.as_str()),
            )),
            Err(err) => TranscriptText::Failed(err.to_string()),
        }
    }
}

/// Joins transcript segment texts with single spaces, the layout every
/// dataset this toolkit has written uses.
pub fn join_segments<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    segments.collect::<Vec<_>>().join(" ")
}
