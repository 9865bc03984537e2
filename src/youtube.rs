//! Everything that talks to the video platform: URL shape handling, the
//! flattened channel listing, and the per-video metadata call. Network access
//! goes through `yt-dlp` so the pipeline inherits its extractor coverage.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Deserialize;
use std::process::{Command, Stdio};

#[cfg(test)]
use std::path::PathBuf;
#[cfg(test)]
use std::sync::{Mutex, MutexGuard};

#[cfg(test)]
static YT_DLP_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);
#[cfg(test)]
static OVERRIDE_USE_LOCK: Mutex<()> = Mutex::new(());

fn yt_dlp_command() -> Command {
    #[cfg(test)]
    {
        if let Some(path) = YT_DLP_OVERRIDE.lock().unwrap().clone() {
            return Command::new(path);
        }
    }
    Command::new("yt-dlp")
}

#[cfg(test)]
pub(crate) fn set_yt_dlp_override(path: PathBuf) -> YtDlpOverrideGuard {
    let guard = OVERRIDE_USE_LOCK.lock().unwrap();
    {
        let mut lock = YT_DLP_OVERRIDE.lock().unwrap();
        *lock = Some(path);
    }
    YtDlpOverrideGuard { lock: Some(guard) }
}

#[cfg(test)]
pub(crate) struct YtDlpOverrideGuard {
    lock: Option<MutexGuard<'static, ()>>,
}

#[cfg(test)]
impl Drop for YtDlpOverrideGuard {
    fn drop(&mut self) {
        *YT_DLP_OVERRIDE.lock().unwrap() = None;
        self.lock.take();
    }
}

/// Checks that an external program runs at all before the pipeline depends
/// on it mid-run.
pub fn ensure_program_available(name: &str) -> Result<()> {
    let status = Command::new(name)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!("{} is installed but returned a failure status", name),
        Err(err) => bail!("{} is not installed or not in PATH: {}", name, err),
    }
}

/// Maps a video URL to the platform's canonical identifier by matching the
/// three known URL families, in order. Anything else resolves to `None`; an
/// identifier is never guessed.
pub fn resolve_video_id(url: &str) -> Option<String> {
    if url.contains("youtu.be") {
        let segment = url.rsplit('/').next()?;
        return non_empty_id(segment.split('?').next()?);
    }
    if url.contains("youtube.com")
        && let Some((_, after)) = url.split_once("v=")
    {
        return non_empty_id(after.split('&').next()?);
    }
    if let Some((_, after)) = url.split_once("embed/") {
        return non_empty_id(after.split('/').next()?);
    }
    None
}

fn non_empty_id(candidate: &str) -> Option<String> {
    if candidate.is_empty() {
        None
    } else {
        Some(candidate.to_string())
    }
}

/// Normalizes a channel URL to its videos tab. Trailing slashes are dropped
/// first, so normalizing an already-normalized URL changes nothing.
pub fn normalize_channel_url(channel_url: &str) -> String {
    let base = channel_url.trim_end_matches('/');
    if base.ends_with("videos") {
        base.to_string()
    } else {
        format!("{base}/videos")
    }
}

#[derive(Deserialize)]
struct ChannelDump {
    #[serde(default)]
    entries: Vec<Option<ListingEntry>>,
}

#[derive(Deserialize)]
struct ListingEntry {
    url: Option<String>,
}

/// Returns the channel's video URLs in platform-reported order using a
/// flattened listing. Entries without a URL are skipped. A dump that cannot
/// be parsed yields an empty listing with a console warning; a failing
/// yt-dlp invocation is an error.
pub fn list_channel_videos(channel_url: &str) -> Result<Vec<String>> {
    let list_url = normalize_channel_url(channel_url);
    let output = yt_dlp_command()
        .arg("--flat-playlist")
        .arg("--dump-single-json")
        .arg("--no-warnings")
        .arg(&list_url)
        .output()
        .with_context(|| format!("listing videos for {}", list_url))?;

    if !output.status.success() {
        bail!(
            "failed to list videos for {} (status: {})",
            list_url,
            output.status
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let dump: ChannelDump = match serde_json::from_str(&raw) {
        Ok(dump) => dump,
        Err(err) => {
            eprintln!("  Warning: could not parse channel listing for {list_url}: {err}");
            return Ok(Vec::new());
        }
    };

    Ok(dump
        .entries
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.url)
        .collect())
}

/// The slice of yt-dlp's single-video JSON this pipeline reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    pub title: Option<String>,
    pub upload_date: Option<String>,
    pub description: Option<String>,
}

/// Performs the one metadata call for a video. Failures here are real
/// errors; the orchestrating loop decides whether the run continues.
pub fn fetch_video_info(video_url: &str) -> Result<VideoInfo> {
    let output = yt_dlp_command()
        .arg("--dump-single-json")
        .arg("--skip-download")
        .arg("--no-warnings")
        .arg("--no-progress")
        .arg(video_url)
        .output()
        .with_context(|| format!("fetching metadata for {}", video_url))?;

    if !output.status.success() {
        bail!(
            "metadata command failed for {} (status {})",
            video_url,
            output.status
        );
    }

    let raw_json =
        String::from_utf8(output.stdout).context("parsing metadata JSON response as UTF-8")?;
    serde_json::from_str(&raw_json).context("deserializing metadata JSON")
}

/// Reformats yt-dlp's `YYYYMMDD` upload date as `YYYY-MM-DD`. Returns `None`
/// for anything that is not a valid calendar date in that layout.
pub fn format_upload_date(value: &str) -> Option<String> {
    if value.len() != 8 || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let year = value[0..4].parse().ok()?;
    let month = value[4..6].parse().ok()?;
    let day = value[6..8].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[cfg(unix)]
    use std::os::unix::fs::PermissionsExt;

    fn install_stub(dir: &Path, body: &str) -> PathBuf {
        let script_path = dir.join("yt-dlp");
        let script = format!("#!/bin/sh\n{body}\n");
        fs::write(&script_path, script).unwrap();
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&script_path).unwrap().permissions();
            perms.set_mode(0o755);
            fs::set_permissions(&script_path, perms).unwrap();
        }
        script_path
    }

    fn stub_emitting(dir: &Path, payload: &str) -> PathBuf {
        install_stub(dir, &format!("cat <<'EOF'\n{payload}\nEOF"))
    }

    #[test]
    fn resolve_video_id_handles_short_links() {
        assert_eq!(
            resolve_video_id("https://youtu.be/abc123?t=5").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            resolve_video_id("https://youtu.be/abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn resolve_video_id_handles_watch_links() {
        assert_eq!(
            resolve_video_id("https://www.youtube.com/watch?v=Psp3YarOKVw").as_deref(),
            Some("Psp3YarOKVw")
        );
        assert_eq!(
            resolve_video_id("https://www.youtube.com/watch?v=abc123&list=PL1").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn resolve_video_id_handles_embed_links() {
        assert_eq!(
            resolve_video_id("https://www.youtube.com/embed/abc123/extra").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            resolve_video_id("https://www.youtube.com/embed/abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn resolve_video_id_rejects_unknown_shapes() {
        assert!(resolve_video_id("https://example.com/video").is_none());
        assert!(resolve_video_id("not a url at all").is_none());
        assert!(resolve_video_id("https://www.youtube.com/@somechannel").is_none());
    }

    #[test]
    fn normalize_channel_url_is_idempotent() {
        let expected = "https://site/@user/videos";
        assert_eq!(normalize_channel_url("https://site/@user"), expected);
        assert_eq!(normalize_channel_url("https://site/@user/"), expected);
        assert_eq!(normalize_channel_url("https://site/@user/videos"), expected);
        assert_eq!(normalize_channel_url("https://site/@user/videos/"), expected);
        assert_eq!(
            normalize_channel_url(&normalize_channel_url("https://site/@user")),
            expected
        );
    }

    #[test]
    fn format_upload_date_reformats_valid_dates() {
        assert_eq!(format_upload_date("20240102").as_deref(), Some("2024-01-02"));
        assert_eq!(format_upload_date("19991231").as_deref(), Some("1999-12-31"));
    }

    #[test]
    fn format_upload_date_rejects_invalid_input() {
        assert!(format_upload_date("2024").is_none());
        assert!(format_upload_date("20241301").is_none());
        assert!(format_upload_date("20240230").is_none());
        assert!(format_upload_date("2024010x").is_none());
        assert!(format_upload_date("").is_none());
    }

    #[test]
    fn list_channel_videos_collects_entry_urls_in_order() -> Result<()> {
        let dir = tempdir()?;
        let stub = stub_emitting(
            dir.path(),
            r#"{"entries": [
                {"url": "https://www.youtube.com/watch?v=first"},
                null,
                {"title": "no url here"},
                {"url": "https://www.youtube.com/watch?v=second"}
            ]}"#,
        );
        let _guard = set_yt_dlp_override(stub);

        let urls = list_channel_videos("https://www.youtube.com/@chan")?;
        assert_eq!(
            urls,
            vec![
                "https://www.youtube.com/watch?v=first".to_string(),
                "https://www.youtube.com/watch?v=second".to_string(),
            ]
        );
        Ok(())
    }

    #[test]
    fn list_channel_videos_without_entries_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let stub = stub_emitting(dir.path(), r#"{"id": "chan", "title": "empty channel"}"#);
        let _guard = set_yt_dlp_override(stub);

        let urls = list_channel_videos("https://www.youtube.com/@chan")?;
        assert!(urls.is_empty());
        Ok(())
    }

    #[test]
    fn list_channel_videos_unparseable_dump_is_empty() -> Result<()> {
        let dir = tempdir()?;
        let stub = install_stub(dir.path(), "echo 'this is not json'");
        let _guard = set_yt_dlp_override(stub);

        let urls = list_channel_videos("https://www.youtube.com/@chan")?;
        assert!(urls.is_empty());
        Ok(())
    }

    #[test]
    fn list_channel_videos_surfaces_command_failure() {
        let dir = tempdir().unwrap();
        let stub = install_stub(dir.path(), "exit 5");
        let _guard = set_yt_dlp_override(stub);

        assert!(list_channel_videos("https://www.youtube.com/@chan").is_err());
    }

    #[test]
    fn fetch_video_info_reads_metadata_fields() -> Result<()> {
        let dir = tempdir()?;
        let stub = stub_emitting(
            dir.path(),
            r#"{"title": "Alpha Title", "upload_date": "20240101", "description": "  padded  "}"#,
        );
        let _guard = set_yt_dlp_override(stub);

        let info = fetch_video_info("https://www.youtube.com/watch?v=alpha")?;
        assert_eq!(info.title.as_deref(), Some("Alpha Title"));
        assert_eq!(info.upload_date.as_deref(), Some("20240101"));
        assert_eq!(info.description.as_deref(), Some("  padded  "));
        Ok(())
    }

    #[test]
    fn fetch_video_info_tolerates_missing_fields() -> Result<()> {
        let dir = tempdir()?;
        let stub = stub_emitting(dir.path(), r#"{"id": "alpha"}"#);
        let _guard = set_yt_dlp_override(stub);

        let info = fetch_video_info("https://www.youtube.com/watch?v=alpha")?;
        assert!(info.title.is_none());
        assert!(info.upload_date.is_none());
        assert!(info.description.is_none());
        Ok(())
    }

    #[test]
    fn fetch_video_info_surfaces_command_failure() {
        let dir = tempdir().unwrap();
        let stub = install_stub(dir.path(), "exit 3");
        let _guard = set_yt_dlp_override(stub);

        assert!(fetch_video_info("https://www.youtube.com/watch?v=alpha").is_err());
    }
}
