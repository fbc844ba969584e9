//! HTML parser for extracting chapter and image links
//!
//! Two extraction modes share one parsing primitive:
//! - chapter-list mode: elements carrying the chapter class marker, their
//!   link attribute in document order
//! - chapter-content mode: elements carrying the lazy-load image attribute,
//!   that attribute's value in document order
//!
//! Both are pure functions over HTML. [`LinkExtractor`] wraps them in the
//! fetcher's retry policy, treating a page without matches like a transient
//! HTTP failure.

use crate::config::SiteConfig;
use crate::crawler::fetcher::{FetchOutcome, Fetcher};
use crate::{ConfigError, FetchError};
use scraper::{Html, Selector};
use url::Url;

/// Compiled selectors for the site's extraction schema
#[derive(Debug, Clone)]
pub struct Selectors {
    chapter_links: Selector,
    chapter_url_attr: String,
    images: Selector,
    image_url_attr: String,
}

impl Selectors {
    /// Compiles the selectors described by the site configuration
    ///
    /// `chapter-link-class = "forfastnavigation chapterscalc"` selects
    /// elements carrying both classes.
    pub fn from_config(site: &SiteConfig) -> Result<Self, ConfigError> {
        let class_selector: String = site
            .chapter_link_class
            .split_whitespace()
            .map(|class| format!(".{}", class))
            .collect();

        let chapter_links = Selector::parse(&class_selector).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid chapter-link-class '{}': {:?}",
                site.chapter_link_class, e
            ))
        })?;

        let images = Selector::parse(&format!("[{}]", site.image_url_attr)).map_err(|e| {
            ConfigError::Validation(format!(
                "Invalid image-url-attr '{}': {:?}",
                site.image_url_attr, e
            ))
        })?;

        Ok(Self {
            chapter_links,
            chapter_url_attr: site.chapter_url_attr.clone(),
            images,
            image_url_attr: site.image_url_attr.clone(),
        })
    }
}

/// Outcome of fetching a page and extracting links from it
#[derive(Debug)]
pub enum Extraction<T> {
    /// At least one matching element
    Found(Vec<T>),

    /// The page was fetched but contains no matching element
    Empty,

    /// The request failed transiently
    TransportError(FetchOutcome),
}

impl<T> Extraction<T> {
    /// Classifies a single fetch outcome
    ///
    /// Non-retryable statuses are returned as `Err` so callers stop at once.
    pub fn classify<F>(url: &str, outcome: FetchOutcome, extract: F) -> Result<Self, FetchError>
    where
        F: FnOnce(&str) -> Vec<T>,
    {
        match outcome {
            FetchOutcome::Success { body, .. } => {
                let html = String::from_utf8_lossy(&body);
                let links = extract(&html);
                if links.is_empty() {
                    Ok(Self::Empty)
                } else {
                    Ok(Self::Found(links))
                }
            }
            FetchOutcome::NotFound => Err(FetchError::Permanent {
                url: url.to_string(),
                status: 404,
            }),
            FetchOutcome::ClientError { status } => Err(FetchError::Permanent {
                url: url.to_string(),
                status,
            }),
            transient => Ok(Self::TransportError(transient)),
        }
    }
}

/// Extracts chapter links from a manga page, in document order
///
/// Relative link targets are resolved against `page_url`. Elements without
/// the link attribute, or with one that does not resolve, are skipped.
pub fn extract_chapter_links(html: &str, selectors: &Selectors, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);

    document
        .select(&selectors.chapter_links)
        .filter_map(|element| element.value().attr(&selectors.chapter_url_attr))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .filter_map(|href| page_url.join(href).ok())
        .collect()
}

/// Extracts page image URLs from a chapter page, in document order
///
/// Values are returned verbatim; the downloader joins them onto the base URL.
pub fn extract_image_links(html: &str, selectors: &Selectors) -> Vec<String> {
    let document = Html::parse_document(html);

    document
        .select(&selectors.images)
        .filter_map(|element| element.value().attr(&selectors.image_url_attr))
        .map(|src| src.trim().to_string())
        .filter(|src| !src.is_empty())
        .collect()
}

/// Fetches pages and extracts links with a uniform retry policy
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    fetcher: Fetcher,
    selectors: Selectors,
}

impl LinkExtractor {
    pub fn new(fetcher: Fetcher, selectors: Selectors) -> Self {
        Self { fetcher, selectors }
    }

    /// Chapter URLs listed on a manga page
    pub async fn chapter_links(&self, manga_url: &Url) -> Result<Vec<Url>, FetchError> {
        let links = self
            .retry_extraction(manga_url.as_str(), "chapters", |html| {
                extract_chapter_links(html, &self.selectors, manga_url)
            })
            .await?;

        tracing::debug!(
            "Found links: {}",
            links.iter().map(Url::as_str).collect::<Vec<_>>().join(", ")
        );
        Ok(links)
    }

    /// Image URLs of a chapter page
    pub async fn image_links(&self, chapter_url: &Url) -> Result<Vec<String>, FetchError> {
        self.retry_extraction(chapter_url.as_str(), "images", |html| {
            extract_image_links(html, &self.selectors)
        })
        .await
    }

    /// Runs the fetch-and-extract loop for one page
    ///
    /// `Empty` and transient failures are retried up to the policy ceiling;
    /// rate-limited attempts sleep the backoff first unless they are final.
    async fn retry_extraction<T, F>(
        &self,
        url: &str,
        what: &str,
        extract: F,
    ) -> Result<Vec<T>, FetchError>
    where
        F: Fn(&str) -> Vec<T>,
    {
        let policy = self.fetcher.policy();
        let mut last = String::new();

        for attempt in 0..=policy.attempts {
            let outcome = self.fetcher.fetch_once(url).await;
            let status = outcome.describe();

            let rate_limited = match Extraction::classify(url, outcome, &extract)? {
                Extraction::Found(links) => return Ok(links),
                Extraction::Empty => {
                    last = format!("no {} found ({})", what, status);
                    false
                }
                Extraction::TransportError(outcome) => {
                    last = format!("no {} found ({})", what, status);
                    matches!(outcome, FetchOutcome::RateLimited)
                }
            };

            tracing::warn!("{} - {} {}/{}", last, url, attempt, policy.attempts);

            if rate_limited && !policy.is_final(attempt) {
                tracing::warn!("Too many requests {}. Sleep.", url);
                tokio::time::sleep(policy.backoff).await;
            }
        }

        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: policy.total_tries(),
            last,
        })
    }
}
