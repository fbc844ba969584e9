//! Chapter coordinator - main download orchestration logic
//!
//! This module drives a whole download run:
//! - Checking the data folder before any network activity
//! - Enumerating chapters from the manga page
//! - Creating one numbered directory per chapter
//! - Extracting each chapter's image links and downloading them
//! - Aggregating progress, timing and failures

use crate::config::{Config, OutputPaths};
use crate::crawler::downloader::{BatchReport, ImageDownloader};
use crate::crawler::fetcher::{build_http_client, Fetcher, RetryPolicy};
use crate::crawler::parser::{LinkExtractor, Selectors};
use crate::output::{claim_folder, format_elapsed};
use crate::state::{Chapter, ErrorLog, PageImage};
use crate::url::{join_url, manga_slug, parse_base_url, resolve_manga_url};
use crate::{BinderError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Download outcome for one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterReport {
    pub ordinal: u32,
    pub dir: PathBuf,
    pub images_found: usize,
    pub images_downloaded: usize,
    pub images_failed: usize,
}

/// Outcome of a complete download run
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Resolved manga page URL
    pub manga_url: Url,

    /// Root folder holding one directory per chapter
    pub data_folder: PathBuf,

    /// Per-chapter results in chapter order
    pub chapters: Vec<ChapterReport>,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// Every failure recorded during the run
    pub errors: ErrorLog,
}

impl RunSummary {
    pub fn images_downloaded(&self) -> usize {
        self.chapters.iter().map(|c| c.images_downloaded).sum()
    }

    pub fn images_failed(&self) -> usize {
        self.chapters.iter().map(|c| c.images_failed).sum()
    }
}

/// Main download coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    base_url: Url,
    fetcher: Fetcher,
    extractor: LinkExtractor,
    downloader: ImageDownloader,
    errors: ErrorLog,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The run configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(BinderError)` - Invalid base URL, selectors or HTTP client setup
    pub fn new(config: Config) -> Result<Self> {
        let base_url = parse_base_url(&config.site.base_url)?;
        let selectors = Selectors::from_config(&config.site)?;

        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.download.request_timeout),
        )?;
        let fetcher = Fetcher::new(client, RetryPolicy::from_config(&config.download));

        let extractor = LinkExtractor::new(fetcher.clone(), selectors);
        let downloader = ImageDownloader::new(
            fetcher.clone(),
            base_url.clone(),
            config.download.max_concurrent_downloads,
        );

        Ok(Self {
            config: Arc::new(config),
            base_url,
            fetcher,
            extractor,
            downloader,
            errors: ErrorLog::new(),
        })
    }

    /// Failures recorded by every run of this coordinator
    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Resolves the manga URL and the output locations derived from its slug
    pub fn resolve(&self, manga_url: &str) -> Result<(Url, OutputPaths)> {
        let url = resolve_manga_url(manga_url, &self.config.site)?;
        let paths = self.config.output.resolve(&manga_slug(&url)?);
        Ok((url, paths))
    }

    /// Downloads every chapter of a manga
    ///
    /// 1. Refuses a non-empty data folder unless `forced` (then clears it)
    /// 2. Extracts the chapter list
    /// 3. For each chapter in order: creates `<data>/<ordinal>`, extracts the
    ///    image links and downloads them concurrently
    ///
    /// A chapter whose links cannot be extracted aborts the run.
    pub async fn run(&self, manga_url: &str, forced: bool) -> Result<RunSummary> {
        let (manga_url, paths) = self.resolve(manga_url)?;
        self.run_into(&manga_url, &paths.data_folder, forced).await
    }

    /// Same as [`Coordinator::run`] with an explicit data folder
    pub async fn run_into(
        &self,
        manga_url: &Url,
        data_folder: &Path,
        forced: bool,
    ) -> Result<RunSummary> {
        claim_folder(data_folder, forced)?;

        let chapter_urls = self.extractor.chapter_links(manga_url).await?;
        tracing::info!("Found {} chapters at {}", chapter_urls.len(), manga_url);

        tokio::fs::create_dir_all(data_folder).await?;
        let global_start = Instant::now();
        let run_errors = ErrorLog::new();
        let total = chapter_urls.len();
        let mut chapters = Vec::with_capacity(total);

        for (index, url) in chapter_urls.into_iter().enumerate() {
            let chapter = Chapter::new(index as u32 + 1, url, data_folder);
            let label = format!("{}/{}", chapter.ordinal, total);
            tokio::fs::create_dir_all(&chapter.dir).await?;

            let report = self.download_chapter(&chapter, &label).await?;
            run_errors.extend(&report.errors);

            chapters.push(ChapterReport {
                ordinal: chapter.ordinal,
                dir: chapter.dir,
                images_found: report.pages.len(),
                images_downloaded: report.succeeded(),
                images_failed: report.failed(),
            });
        }

        let elapsed = global_start.elapsed();
        tracing::info!(
            "All chapters({}) downloaded within {}.",
            total,
            format_elapsed(elapsed)
        );

        self.errors.extend(&run_errors);

        Ok(RunSummary {
            manga_url: manga_url.clone(),
            data_folder: data_folder.to_path_buf(),
            chapters,
            elapsed,
            errors: run_errors,
        })
    }

    /// Extracts one chapter's image links and downloads them
    async fn download_chapter(&self, chapter: &Chapter, label: &str) -> Result<BatchReport> {
        let start = Instant::now();
        let image_urls = self.extractor.image_links(&chapter.url).await?;

        let report = self
            .downloader
            .download_all(&image_urls, &chapter.dir, label)
            .await;

        tracing::info!(
            "Chapter {} downloaded, {} images within {:.2} sec.",
            label,
            image_urls.len(),
            start.elapsed().as_secs_f64()
        );
        if report.failed() > 0 {
            tracing::warn!("Chapter {}: {} images failed", label, report.failed());
        }

        Ok(report)
    }

    /// Re-downloads a single page image into `<data>/<chapter>/<page>.<ext>`
    ///
    /// `chapter` and `page` are 1-based.
    pub async fn download_page(
        &self,
        manga_url: &str,
        chapter: u32,
        page: u32,
    ) -> Result<PageImage> {
        let (manga_url, paths) = self.resolve(manga_url)?;

        let chapter_urls = self.extractor.chapter_links(&manga_url).await?;
        let chapter_url = chapter_urls
            .get((chapter as usize).wrapping_sub(1))
            .cloned()
            .ok_or(BinderError::ChapterOutOfRange {
                chapter,
                total: chapter_urls.len(),
            })?;
        let chapter = Chapter::new(chapter, chapter_url, &paths.data_folder);

        let image_urls = self.extractor.image_links(&chapter.url).await?;
        let raw = image_urls
            .get((page as usize).wrapping_sub(1))
            .ok_or(BinderError::PageOutOfRange {
                chapter: chapter.ordinal,
                page,
                total: image_urls.len(),
            })?;

        tokio::fs::create_dir_all(&chapter.dir).await?;
        let mut image = PageImage::new(page, join_url(&self.base_url, raw)?, &chapter.dir);
        tracing::info!(
            "Downloading image {}-{}({}) to {}",
            chapter.ordinal,
            page,
            image.url,
            image.path.display()
        );

        let status = self
            .downloader
            .download_one(&image.url, &image.path, &self.errors)
            .await;
        image.transition(status)?;
        Ok(image)
    }

    /// Status code returned by the site's base URL
    pub async fn ping(&self) -> Result<u16> {
        Ok(self.fetcher.ping(self.base_url.as_str()).await?)
    }
}
