//! PDF module for binding downloaded images
//!
//! This module contains the assembly half of the pipeline:
//! - Converting page images into single-page PDFs on a worker pool
//! - Merging PDFs in order without re-encoding pages
//! - Walking a data folder chapter by chapter

mod assembler;
mod converter;
mod merge;

pub use assembler::{chapter_dirs, Assembler, AssemblySummary, ChapterPdf, PageFile};
pub use converter::{convert, page_size, ConversionJob, ConverterPool, JPEG_QUALITY, POINTS_PER_INCH};
pub use merge::{load_document, merge_documents, merge_pdfs};

use crate::config::Config;
use crate::{ErrorLog, Result};

/// Binds a downloaded manga into PDFs
///
/// Runs on a blocking thread so it can be awaited from the download runtime.
///
/// # Arguments
///
/// * `config` - The run configuration
/// * `slug` - Manga slug the default output locations derive from
/// * `forced` - Overwrite existing result files
/// * `errors` - Log that skipped pages are recorded into
pub async fn assemble(
    config: &Config,
    slug: &str,
    forced: bool,
    errors: ErrorLog,
) -> Result<AssemblySummary> {
    let output = &config.output;
    let assembler = Assembler::new(output, output.resolve(slug))?.with_error_log(errors);
    let delete_temp = !output.keep_temp;
    let one_file = output.one_file;

    tokio::task::spawn_blocking(move || assembler.run(forced, delete_temp, one_file)).await?
}
