//! End-of-run statistics
//!
//! This module folds the download and assembly summaries into one report
//! and prints it, together with the error log.

use crate::crawler::RunSummary;
use crate::output::format_elapsed;
use crate::pdf::AssemblySummary;
use crate::state::ErrorEntry;
use std::path::PathBuf;
use std::time::Duration;

/// Run statistics summary
#[derive(Debug, Clone, Default)]
pub struct RunStatistics {
    /// Number of chapters found on the manga page
    pub chapters: usize,

    /// Images listed across all chapters
    pub images_found: usize,

    /// Images written to disk
    pub images_downloaded: usize,

    /// Images given up on
    pub images_failed: usize,

    /// Chapter PDFs written
    pub chapter_pdfs: usize,

    /// Pages across all chapter PDFs
    pub pdf_pages: usize,

    /// Pages left out because their image could not be decoded
    pub pages_skipped: usize,

    /// Combined PDF, when one was requested
    pub combined_pdf: Option<PathBuf>,

    /// Total wall-clock time
    pub elapsed: Duration,

    /// Every recorded failure
    pub errors: Vec<ErrorEntry>,
}

impl RunStatistics {
    /// Builds statistics from the phases that actually ran
    pub fn collect(
        download: Option<&RunSummary>,
        assembly: Option<&AssemblySummary>,
        elapsed: Duration,
        errors: Vec<ErrorEntry>,
    ) -> Self {
        let mut stats = Self {
            elapsed,
            errors,
            ..Self::default()
        };

        if let Some(download) = download {
            stats.chapters = download.chapters.len();
            stats.images_found = download.chapters.iter().map(|c| c.images_found).sum();
            stats.images_downloaded = download.images_downloaded();
            stats.images_failed = download.images_failed();
        }

        if let Some(assembly) = assembly {
            stats.chapter_pdfs = assembly.chapter_pdfs.len();
            stats.pdf_pages = assembly.pages;
            stats.pages_skipped = assembly.skipped_pages;
            stats.combined_pdf = assembly.combined_pdf.clone();
        }

        stats
    }

    /// Share of listed images that were downloaded, in percent
    pub fn success_rate(&self) -> f64 {
        if self.images_found == 0 {
            return 0.0;
        }
        self.images_downloaded as f64 / self.images_found as f64 * 100.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Run Statistics ===\n");

    println!("Download:");
    println!("  Chapters: {}", stats.chapters);
    println!("  Images found: {}", stats.images_found);
    println!("  Images downloaded: {}", stats.images_downloaded);
    println!("  Images failed: {}", stats.images_failed);
    println!();

    println!("PDF:");
    println!("  Chapter PDFs: {}", stats.chapter_pdfs);
    println!("  Pages: {}", stats.pdf_pages);
    if stats.pages_skipped > 0 {
        println!("  Pages skipped (corrupt image): {}", stats.pages_skipped);
    }
    if let Some(combined) = &stats.combined_pdf {
        println!("  Combined PDF: {}", combined.display());
    }
    println!();

    if !stats.errors.is_empty() {
        println!("Errors ({}):", stats.errors.len());
        for entry in &stats.errors {
            println!("  - {}", entry);
        }
        println!();
    }

    println!(
        "Success Rate: {:.1}% ({} / {} images) in {}",
        stats.success_rate(),
        stats.images_downloaded,
        stats.images_found,
        format_elapsed(stats.elapsed)
    );
}
