//! Manga-Binder: chapter downloader and PDF binder
//!
//! This crate scrapes a chaptered image-comic site, downloads every page image
//! of every chapter concurrently, and binds the images into per-chapter and
//! combined PDF documents.

pub mod config;
pub mod crawler;
pub mod output;
pub mod pdf;
pub mod state;
pub mod url;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Manga-Binder operations
#[derive(Debug, Error)]
pub enum BinderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Folder {} already exists and contains files (use --force to overwrite)", path.display())]
    StorageConflict { path: PathBuf },

    #[error("Chapter {chapter} not found (manga has {total} chapters)")]
    ChapterOutOfRange { chapter: u32, total: usize },

    #[error("Page {page} not found in chapter {chapter} ({total} pages)")]
    PageOutOfRange { chapter: u32, page: u32, total: usize },

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::DownloadStatus,
        to: state::DownloadStatus,
    },

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetch failures, split into the ones worth retrying and the ones that are not
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("No content found at {url} after {attempts} attempts (last: {last})")]
    Exhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    #[error("Unable to download {url} (status {status})")]
    Permanent { url: String, status: u16 },
}

impl FetchError {
    /// Returns true for failures that were never retried
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    /// The URL the failure refers to
    pub fn url(&self) -> &str {
        match self {
            Self::Exhausted { url, .. } | Self::Permanent { url, .. } => url,
        }
    }
}

/// Image conversion and PDF merging errors
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Empty or corrupt image {}: {reason}", path.display())]
    EmptyOrCorruptImage { path: PathBuf, reason: String },

    #[error("Unmergeable document {}: {reason}", path.display())]
    UnmergeableDocument { path: PathBuf, reason: String },

    #[error("Failed to write PDF {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    #[error("Failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Manga-Binder operations
pub type Result<T> = std::result::Result<T, BinderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for PDF operations
pub type PdfResult<T> = std::result::Result<T, PdfError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, RunSummary};
pub use pdf::{Assembler, AssemblySummary};
pub use state::{Chapter, DownloadStatus, ErrorLog, PageImage};
