//! Concurrent image downloader
//!
//! All images of one chapter are fetched on a single stream with a bounded
//! number of requests in flight. One image failing never cancels its
//! siblings: failures end up in the batch's [`ErrorLog`] and the image is
//! left without a file.

use crate::crawler::fetcher::Fetcher;
use crate::state::{DownloadStatus, ErrorLog, PageImage};
use crate::url::join_url;
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::time::Instant;
use url::Url;

/// Result of downloading one chapter's images
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Page images in source order, each in a terminal state
    pub pages: Vec<PageImage>,

    /// Failures recorded while downloading this batch
    pub errors: ErrorLog,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| page.status().is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.pages
            .iter()
            .filter(|page| page.status().is_error())
            .count()
    }
}

/// Downloads page images into a chapter directory
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    fetcher: Fetcher,
    base_url: Url,
    max_concurrent: usize,
}

impl ImageDownloader {
    /// Creates a downloader
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Fetcher carrying the retry policy
    /// * `base_url` - Base that relative image URLs are joined onto
    /// * `max_concurrent` - Upper bound on requests in flight
    pub fn new(fetcher: Fetcher, base_url: Url, max_concurrent: usize) -> Self {
        Self {
            fetcher,
            base_url,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Builds the page images for a chapter, numbered from 1 in source order
    ///
    /// URLs that cannot be joined onto the base URL are recorded in `errors`
    /// and skipped; their position is still consumed so later pages keep
    /// their source ordinal.
    pub fn plan(&self, image_urls: &[String], dest_dir: &Path, errors: &ErrorLog) -> Vec<PageImage> {
        image_urls
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| match join_url(&self.base_url, raw) {
                Ok(url) => Some(PageImage::new(index as u32 + 1, url, dest_dir)),
                Err(e) => {
                    tracing::error!("Skipping image {}: {}", raw, e);
                    errors.record(raw.clone(), e.to_string());
                    None
                }
            })
            .collect()
    }

    /// Downloads every image concurrently into `dest_dir`
    ///
    /// `label` prefixes progress lines, e.g. `3/120` for the third chapter.
    pub async fn download_all(
        &self,
        image_urls: &[String],
        dest_dir: &Path,
        label: &str,
    ) -> BatchReport {
        let errors = ErrorLog::new();
        let planned = self.plan(image_urls, dest_dir, &errors);
        let total = image_urls.len();

        let mut pages: Vec<PageImage> = stream::iter(planned.into_iter().map(|mut page| {
            let errors = errors.clone();
            async move {
                let progress = format!("{} - image {}/{}", label, page.ordinal, total);
                let status = self.download_one(&page.url, &page.path, &errors).await;
                if status.is_success() {
                    tracing::debug!("Downloaded {}", progress);
                }
                if let Err(e) = page.transition(status) {
                    tracing::error!("{}: {}", progress, e);
                }
                page
            }
        }))
        .buffer_unordered(self.max_concurrent)
        .collect()
        .await;

        pages.sort_by_key(|page| page.ordinal);

        BatchReport { pages, errors }
    }

    /// Downloads a single image to an explicit path
    pub async fn download_one(&self, url: &Url, path: &Path, errors: &ErrorLog) -> DownloadStatus {
        let start = Instant::now();
        match self.fetcher.fetch(url.as_str()).await {
            Ok(body) => match tokio::fs::write(path, &body).await {
                Ok(()) => {
                    tracing::debug!(
                        "Downloaded {} ({:.2} sec)",
                        path.display(),
                        start.elapsed().as_secs_f64()
                    );
                    DownloadStatus::Success
                }
                Err(e) => {
                    tracing::error!("Failed to save {}: {}", path.display(), e);
                    errors.record(url.as_str(), format!("failed to save: {}", e));
                    DownloadStatus::FailedPermanent
                }
            },
            Err(e) if e.is_permanent() => {
                tracing::error!("Unable to download {} ({})", url, e);
                errors.record(url.as_str(), e.to_string());
                DownloadStatus::FailedPermanent
            }
            Err(e) => {
                tracing::error!("Failed to download: {} ({})", url, e);
                errors.record(url.as_str(), e.to_string());
                DownloadStatus::FailedExhaustedRetries
            }
        }
    }
}
