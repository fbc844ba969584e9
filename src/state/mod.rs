//! State module for tracking download progress
//!
//! # Components
//!
//! - `Chapter` / `PageImage`: the units of a run and their on-disk locations
//! - `DownloadStatus`: the lifecycle of a single page image
//! - `ErrorLog`: failures accumulated across a run

mod error_log;
mod page_state;

// Re-export main types
pub use error_log::{ErrorEntry, ErrorLog};
pub use page_state::{page_key, Chapter, DownloadStatus, PageImage, PAGE_KEY_STRIDE};
