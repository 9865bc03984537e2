//! Record types shared by the ingest pipeline, the dataset writer, and the
//! batch uploader.

use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_DATE: &str = "Unknown Date";
pub const NO_DESCRIPTION: &str = "No description available";
pub const INVALID_URL_TEXT: &str = "Invalid YouTube URL";
pub const TRANSCRIPT_ERROR_PREFIX: &str = "Error fetching transcript: ";

/// Outcome of transcript retrieval for one video. The failure reason stays
/// structured until a writer renders the flat dataset field, so callers can
/// tell real text from an error without string matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptText {
    Fetched(String),
    Failed(String),
    InvalidUrl,
}

impl TranscriptText {
    /// Renders the dataset field value. Failures keep the exact sentinel
    /// wording older datasets were written with.
    pub fn render(&self) -> String {
        match self {
            TranscriptText::Fetched(text) => text.clone(),
            TranscriptText::Failed(reason) => format!("{TRANSCRIPT_ERROR_PREFIX}{reason}"),
            TranscriptText::InvalidUrl => INVALID_URL_TEXT.to_string(),
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, TranscriptText::Fetched(_))
    }
}

/// Everything collected for one video. Metadata fields are `None` only on the
/// sentinel record produced for unresolvable URLs; the fetch path always
/// fills them, substituting sentinels where the platform reports nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRecord {
    pub url: String,
    pub title: Option<String>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
    pub transcript: TranscriptText,
}

impl VideoRecord {
    /// Sentinel record for URLs no identifier could be resolved from.
    pub fn invalid_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            title: None,
            upload_date: None,
            description: None,
            transcript: TranscriptText::InvalidUrl,
        }
    }

    /// Flattens the record into the fixed dataset column order. Absent
    /// metadata becomes an empty field, matching what the CSV layer has
    /// always emitted for the invalid-URL sentinel.
    pub fn to_row(&self) -> DatasetRow {
        DatasetRow {
            date: self.upload_date.clone().unwrap_or_default(),
            title: self.title.clone().unwrap_or_default(),
            url: self.url.clone(),
            transcript: self.transcript.render(),
            description: self.description.clone().unwrap_or_default(),
        }
    }

    /// Console label: the title when known, the URL otherwise.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(self.url.as_str())
    }
}

/// One flat dataset row. The field order here is the CSV column order and
/// the JSON key set sent to the table store; reordering fields changes the
/// on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub date: String,
    pub title: String,
    pub url: String,
    pub transcript: String,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> VideoRecord {
        VideoRecord {
            url: "https://www.youtube.com/watch?v=abc123".to_string(),
            title: Some("Sample Video".to_string()),
            upload_date: Some("2024-01-02".to_string()),
            description: Some("A short description".to_string()),
            transcript: TranscriptText::Fetched("hello world".to_string()),
        }
    }

    #[test]
    fn to_row_uses_fixed_field_order() {
        let row = sample_record().to_row();
        assert_eq!(row.date, "2024-01-02");
        assert_eq!(row.title, "Sample Video");
        assert_eq!(row.url, "https://www.youtube.com/watch?v=abc123");
        assert_eq!(row.transcript, "hello world");
        assert_eq!(row.description, "A short description");
    }

    #[test]
    fn invalid_url_record_renders_sentinels() {
        let record = VideoRecord::invalid_url("https://example.com/video");
        assert!(record.title.is_none());
        assert!(record.upload_date.is_none());
        assert!(record.description.is_none());

        let row = record.to_row();
        assert_eq!(row.date, "");
        assert_eq!(row.title, "");
        assert_eq!(row.transcript, INVALID_URL_TEXT);
        assert_eq!(row.description, "");
    }

    #[test]
    fn failed_transcript_renders_with_prefix() {
        let transcript = TranscriptText::Failed("no captions found".to_string());
        let rendered = transcript.render();
        assert!(rendered.starts_with(TRANSCRIPT_ERROR_PREFIX));
        assert!(rendered.ends_with("no captions found"));
        assert!(!transcript.is_fetched());
    }

    #[test]
    fn fetched_transcript_renders_verbatim() {
        let transcript = TranscriptText::Fetched("first second third".to_string());
        assert_eq!(transcript.render(), "first second third");
        assert!(transcript.is_fetched());
    }

    #[test]
    fn label_prefers_title_over_url() {
        let record = sample_record();
        assert_eq!(record.label(), "Sample Video");
        assert_eq!(
            VideoRecord::invalid_url("https://example.com/x").label(),
            "https://example.com/x"
        );
    }
}
