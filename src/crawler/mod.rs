//! Crawler module for chapter discovery and image download
//!
//! This module contains the download half of the pipeline, including:
//! - HTTP fetching with retry logic and rate-limit backoff
//! - HTML parsing and chapter/image link extraction
//! - Concurrent, bounded image downloads
//! - Overall run coordination

mod coordinator;
mod downloader;
mod fetcher;
mod parser;

pub use coordinator::{ChapterReport, Coordinator, RunSummary};
pub use downloader::{BatchReport, ImageDownloader};
pub use fetcher::{build_http_client, user_agent, FetchOutcome, Fetcher, RetryPolicy};
pub use parser::{extract_chapter_links, extract_image_links, Extraction, LinkExtractor, Selectors};

use crate::config::Config;
use crate::Result;

/// Runs a complete download
///
/// This is the main entry point for downloading a manga. It will:
/// 1. Check the data folder (clearing it when `forced`)
/// 2. Extract the chapter list
/// 3. Download every chapter's images, one chapter at a time
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `manga_url` - Manga page URL, absolute or relative to the listing
/// * `forced` - Overwrite a non-empty data folder
pub async fn download(config: Config, manga_url: &str, forced: bool) -> Result<RunSummary> {
    Coordinator::new(config)?.run(manga_url, forced).await
}
