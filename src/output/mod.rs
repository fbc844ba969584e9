//! Output module for run folders and end-of-run reports
//!
//! This module handles:
//! - Claiming output folders (refusing or clearing populated ones)
//! - Formatting durations the way progress lines report them
//! - Collecting and printing run statistics

pub mod stats;

pub use stats::{print_statistics, RunStatistics};

use crate::BinderError;
use std::path::Path;
use std::time::Duration;

/// Makes sure `path` holds no files before a run writes into it
///
/// A missing or empty folder is fine. A populated one is deleted when
/// `forced`, and is otherwise a `StorageConflict`.
pub fn claim_folder(path: &Path, forced: bool) -> Result<(), BinderError> {
    if !folder_has_content(path)? {
        return Ok(());
    }

    if !forced {
        return Err(BinderError::StorageConflict {
            path: path.to_path_buf(),
        });
    }

    tracing::info!("Deleting {}", path.display());
    std::fs::remove_dir_all(path)?;
    Ok(())
}

/// Returns true if `path` is a directory with at least one entry
pub fn folder_has_content(path: &Path) -> Result<bool, BinderError> {
    if !path.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(path)?.next().is_some())
}

/// Formats a duration as `HHh MMm SSs`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!(
        "{:02}h {:02}m {:02}s",
        secs / 3600,
        (secs % 3600) / 60,
        secs % 60
    )
}
