/// Chapter and page image definitions for tracking download progress
///
/// This module defines the units a run works on and the states a page image
/// moves through while it is downloaded.
use crate::BinderError;
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Multiplier separating chapter ordinals from page ordinals in sort keys
pub const PAGE_KEY_STRIDE: u64 = 1000;

/// Global reading-order key for a page: `chapter * 1000 + page`
pub fn page_key(chapter: u32, page: u32) -> u64 {
    chapter as u64 * PAGE_KEY_STRIDE + page as u64
}

/// Represents the download state of a page image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadStatus {
    /// Not downloaded yet
    Pending,

    /// Image bytes were written to disk
    Success,

    /// Server answered 404 or another non-retryable status
    FailedPermanent,

    /// Every attempt failed with a transient error
    FailedExhaustedRetries,
}

impl DownloadStatus {
    /// Returns true if no further processing will happen
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Returns true if the image file exists on disk
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the image was given up on
    pub fn is_error(&self) -> bool {
        matches!(self, Self::FailedPermanent | Self::FailedExhaustedRetries)
    }

    /// Only a pending image may change state
    pub fn can_transition_to(&self, next: DownloadStatus) -> bool {
        matches!(self, Self::Pending) && next.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::FailedPermanent => "failed_permanent",
            Self::FailedExhaustedRetries => "failed_exhausted_retries",
        }
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One chapter of the manga, in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based position in the chapter list
    pub ordinal: u32,

    /// Chapter page URL
    pub url: Url,

    /// Directory holding the chapter's images
    pub dir: PathBuf,
}

impl Chapter {
    pub fn new(ordinal: u32, url: Url, data_folder: &std::path::Path) -> Self {
        Self {
            ordinal,
            url,
            dir: data_folder.join(ordinal.to_string()),
        }
    }
}

/// One page image of a chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based position within the chapter
    pub ordinal: u32,

    /// Absolute image URL
    pub url: Url,

    /// Destination file, `<chapter dir>/<ordinal>.<extension>`
    pub path: PathBuf,

    /// File extension taken from the URL
    pub extension: String,

    status: DownloadStatus,
}

impl PageImage {
    /// Creates a pending page image inside `dir`
    pub fn new(ordinal: u32, url: Url, dir: &std::path::Path) -> Self {
        let extension = crate::url::file_extension(&url);
        let path = dir.join(format!("{}.{}", ordinal, extension));
        Self {
            ordinal,
            url,
            path,
            extension,
            status: DownloadStatus::Pending,
        }
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    /// Moves the image to a terminal state
    pub fn transition(&mut self, next: DownloadStatus) -> Result<(), BinderError> {
        if !self.status.can_transition_to(next) {
            return Err(BinderError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
