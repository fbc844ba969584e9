use serde::Deserialize;
use std::path::PathBuf;

/// Site base URL the scraper targets by default
pub const DEFAULT_BASE_URL: &str = "https://manga.in.ua";

/// Class tokens carried by every chapter link on a manga page
pub const DEFAULT_CHAPTER_LINK_CLASS: &str = "forfastnavigation chapterscalc";

/// Attempt ceiling for every fetch; the retry loop runs `0..=DOWNLOAD_ATTEMPTS`
pub const DOWNLOAD_ATTEMPTS: u32 = 10;

/// Delay before retrying after `429 Too Many Requests`
pub const RATE_LIMIT_BACKOFF_MS: u64 = 5000;

/// Main configuration structure for Manga-Binder
///
/// Every table is optional; missing keys fall back to the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub download: DownloadConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Source site and its extraction schema
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL that relative manga and image URLs are joined onto
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path under the base URL where manga listings live
    #[serde(rename = "mangas-path")]
    pub mangas_path: String,

    /// Whitespace-separated class tokens marking chapter links
    #[serde(rename = "chapter-link-class")]
    pub chapter_link_class: String,

    /// Attribute holding a chapter link target
    #[serde(rename = "chapter-url-attr")]
    pub chapter_url_attr: String,

    /// Lazy-load attribute holding a page image URL
    #[serde(rename = "image-url-attr")]
    pub image_url_attr: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mangas_path: "mangas".to_string(),
            chapter_link_class: DEFAULT_CHAPTER_LINK_CLASS.to_string(),
            chapter_url_attr: "href".to_string(),
            image_url_attr: "data-src".to_string(),
        }
    }
}

/// Network behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Attempt ceiling (total tries is one more than this)
    pub attempts: u32,

    /// Sleep before retrying a rate-limited request (milliseconds)
    #[serde(rename = "rate-limit-backoff")]
    pub rate_limit_backoff: u64,

    /// Upper bound on in-flight image downloads per chapter
    #[serde(rename = "max-concurrent-downloads")]
    pub max_concurrent_downloads: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            attempts: DOWNLOAD_ATTEMPTS,
            rate_limit_backoff: RATE_LIMIT_BACKOFF_MS,
            max_concurrent_downloads: 16,
            request_timeout: 60,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserAgentConfig {
    /// Name sent in the User-Agent header
    pub name: String,

    /// Version sent in the User-Agent header
    pub version: String,

    /// Optional contact URL appended to the User-Agent header
    #[serde(rename = "contact-url")]
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            name: "manga-binder".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

/// What to do with a page image that cannot be decoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorruptPagePolicy {
    /// Leave the page out of the chapter PDF and record it in the error log
    #[default]
    Skip,
    /// Fail the chapter's assembly
    Abort,
}

/// Output locations and PDF settings
///
/// Unset folders are derived from the manga URL slug at run time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Where raw page images are stored
    #[serde(rename = "data-folder")]
    pub data_folder: Option<PathBuf>,

    /// Where intermediate single-page PDFs are stored
    #[serde(rename = "temp-folder")]
    pub temp_folder: Option<PathBuf>,

    /// Where per-chapter PDFs are written
    #[serde(rename = "result-folder")]
    pub result_folder: Option<PathBuf>,

    /// Combined PDF path
    #[serde(rename = "result-pdf")]
    pub result_pdf: Option<PathBuf>,

    /// Merge every chapter into the combined PDF
    #[serde(rename = "one-file")]
    pub one_file: bool,

    /// Keep intermediate single-page PDFs
    #[serde(rename = "keep-temp")]
    pub keep_temp: bool,

    /// Keep downloaded images after assembly
    #[serde(rename = "keep-data")]
    pub keep_data: bool,

    /// Image resolution in dots per inch
    pub resolution: f32,

    /// Size of the conversion pool (0 uses available parallelism)
    #[serde(rename = "converter-threads")]
    pub converter_threads: usize,

    #[serde(rename = "on-corrupt-page")]
    pub on_corrupt_page: CorruptPagePolicy,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            data_folder: None,
            temp_folder: None,
            result_folder: None,
            result_pdf: None,
            one_file: false,
            keep_temp: false,
            keep_data: false,
            resolution: 100.0,
            converter_threads: 0,
            on_corrupt_page: CorruptPagePolicy::Skip,
        }
    }
}

/// Concrete output locations for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub data_folder: PathBuf,
    pub temp_folder: PathBuf,
    pub result_folder: PathBuf,
    pub result_pdf: PathBuf,
}

impl OutputConfig {
    /// Fills unset locations from the manga slug
    ///
    /// `<slug>_data` for images, `temp` next to the data folder, `<slug>` for
    /// chapter PDFs and `<slug>.pdf` for the combined document.
    pub fn resolve(&self, slug: &str) -> OutputPaths {
        let data_folder = self
            .data_folder
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}_data", slug)));

        let temp_folder = self.temp_folder.clone().unwrap_or_else(|| {
            data_folder
                .parent()
                .map(|parent| parent.join("temp"))
                .unwrap_or_else(|| PathBuf::from("temp"))
        });

        OutputPaths {
            temp_folder,
            result_folder: self
                .result_folder
                .clone()
                .unwrap_or_else(|| PathBuf::from(slug)),
            result_pdf: self
                .result_pdf
                .clone()
                .unwrap_or_else(|| PathBuf::from(format!("{}.pdf", slug))),
            data_folder,
        }
    }
}
