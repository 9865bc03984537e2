//! Shared library for the TubeScribe pipeline: channel listing and video
//! metadata via yt-dlp, transcript fetching, CSV dataset files, and batched
//! uploads into Supabase tables. The binaries under `src/bin` wire these
//! pieces into the scrape and upload commands.

pub mod config;
pub mod dataset;
pub mod events;
pub mod ingest;
pub mod record;
pub mod store;
pub mod transcript;
pub mod youtube;
