//! PDF assembly from a downloaded data folder
//!
//! Layout consumed:
//!
//! ```text
//! <data>/<page>.<ext>             loose pages, bound as chapter 0
//! <data>/<chapter>/<page>.<ext>   one directory per chapter
//! ```
//!
//! Layout produced:
//!
//! ```text
//! <temp>/<chapter>/<page>.pdf     single-page PDFs (removed afterwards)
//! <result>/<chapter>.pdf          one PDF per chapter
//! <result-pdf>                    every chapter in order (one-file mode)
//! ```

use crate::config::{CorruptPagePolicy, OutputConfig, OutputPaths};
use crate::output::{claim_folder, format_elapsed};
use crate::pdf::converter::{ConversionJob, ConverterPool};
use crate::pdf::merge::merge_pdfs;
use crate::state::{page_key, ErrorLog};
use crate::{BinderError, PdfError, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// A page image found on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFile {
    /// Global sort key, `chapter * 1000 + page`
    pub key: u64,
    pub page: u32,
    pub path: PathBuf,
}

/// One bound chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPdf {
    pub chapter: u32,
    pub path: PathBuf,
    pub pages: usize,
    pub skipped: usize,
}

/// Outcome of an assembly run
#[derive(Debug, Clone, Default)]
pub struct AssemblySummary {
    /// Chapter PDFs in chapter order
    pub chapter_pdfs: Vec<ChapterPdf>,

    /// Combined document, when one-file mode produced one
    pub combined_pdf: Option<PathBuf>,

    /// Pages bound across every chapter
    pub pages: usize,

    /// Page images skipped because they could not be decoded
    pub skipped_pages: usize,

    pub elapsed: Duration,
}

/// Converts chapter directories into PDFs
#[derive(Debug)]
pub struct Assembler {
    paths: OutputPaths,
    resolution: f32,
    on_corrupt_page: CorruptPagePolicy,
    pool: ConverterPool,
    errors: ErrorLog,
}

impl Assembler {
    /// Creates an assembler writing to `paths`
    pub fn new(output: &OutputConfig, paths: OutputPaths) -> Result<Self> {
        Ok(Self {
            paths,
            resolution: output.resolution,
            on_corrupt_page: output.on_corrupt_page,
            pool: ConverterPool::new(output.converter_threads)?,
            errors: ErrorLog::new(),
        })
    }

    /// Records skipped pages into an existing log instead of a private one
    pub fn with_error_log(mut self, errors: ErrorLog) -> Self {
        self.errors = errors;
        self
    }

    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Page images directly inside `dir`, in page order
    ///
    /// Every file named `<number>` or `<number>.<ext>` is a page, whatever
    /// its extension: the downloader keeps the source URL's suffix and the
    /// converter sniffs the real format. Pages that fail to decode go through
    /// the corrupt-page policy instead of being dropped here.
    pub fn collect_images(&self, dir: &Path, chapter: u32) -> Result<Vec<PageFile>> {
        let mut images = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            let page = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.parse::<u32>().ok());
            if let Some(page) = page {
                images.push(PageFile {
                    key: page_key(chapter, page),
                    page,
                    path,
                });
            }
        }

        images.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.path.cmp(&b.path)));
        Ok(images)
    }

    /// Binds the page images of `image_dir` into `<result>/<chapter>.pdf`
    ///
    /// Returns `None` when the directory holds no usable image.
    pub fn assemble(&self, image_dir: &Path, chapter: u32) -> Result<Option<ChapterPdf>> {
        let images = self.collect_images(image_dir, chapter)?;
        if images.is_empty() {
            tracing::warn!("No images in {}, skipping chapter {}", image_dir.display(), chapter);
            return Ok(None);
        }

        let temp_dir = self.paths.temp_folder.join(chapter.to_string());
        std::fs::create_dir_all(&temp_dir)?;

        let jobs: Vec<ConversionJob> = images
            .iter()
            .map(|image| {
                ConversionJob::new(&image.path, temp_dir.join(format!("{}.pdf", image.page)))
            })
            .collect();

        let start = Instant::now();
        let results = self.pool.convert_all(&jobs, self.resolution);

        let mut single_pages = Vec::with_capacity(jobs.len());
        let mut skipped = 0;
        for result in results {
            match result {
                Ok(pdf) => single_pages.push(pdf),
                Err(PdfError::EmptyOrCorruptImage { path, reason })
                    if self.on_corrupt_page == CorruptPagePolicy::Skip =>
                {
                    tracing::warn!("Skipping page {}: {}", path.display(), reason);
                    self.errors.record(path.display().to_string(), reason);
                    skipped += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if single_pages.is_empty() {
            tracing::warn!("Every page of chapter {} was skipped", chapter);
            return Ok(None);
        }

        let output = self.paths.result_folder.join(format!("{}.pdf", chapter));
        let pages = merge_pdfs(&single_pages, &output)?;

        tracing::info!(
            "Chapter {} bound, {} pages within {:.2} sec.",
            chapter,
            pages,
            start.elapsed().as_secs_f64()
        );

        Ok(Some(ChapterPdf {
            chapter,
            path: output,
            pages,
            skipped,
        }))
    }

    /// Merges chapter PDFs, in the given order, into the combined PDF
    pub fn merge_all(&self, pdf_paths: &[PathBuf]) -> Result<PathBuf> {
        let output = self.paths.result_pdf.clone();
        let pages = merge_pdfs(pdf_paths, &output)?;
        tracing::info!("Merged {} chapters into {} ({} pages)", pdf_paths.len(), output.display(), pages);
        Ok(output)
    }

    /// Binds every chapter of the data folder
    ///
    /// Refuses a populated result or temp folder, or an existing combined PDF
    /// in one-file mode, unless `forced`. The temp folder is removed
    /// afterwards when `delete_temp` is set, whether or not assembly
    /// succeeded.
    pub fn run(&self, forced: bool, delete_temp: bool, one_file: bool) -> Result<AssemblySummary> {
        claim_folder(&self.paths.result_folder, forced)?;
        if one_file && self.paths.result_pdf.is_file() {
            if !forced {
                return Err(BinderError::StorageConflict {
                    path: self.paths.result_pdf.clone(),
                });
            }
            std::fs::remove_file(&self.paths.result_pdf)?;
        }

        claim_folder(&self.paths.temp_folder, forced)?;
        std::fs::create_dir_all(&self.paths.temp_folder)?;
        std::fs::create_dir_all(&self.paths.result_folder)?;

        let outcome = self.assemble_all(one_file);

        if delete_temp {
            if let Err(e) = std::fs::remove_dir_all(&self.paths.temp_folder) {
                tracing::warn!("Failed to remove {}: {}", self.paths.temp_folder.display(), e);
            }
        }

        outcome
    }

    fn assemble_all(&self, one_file: bool) -> Result<AssemblySummary> {
        let start = Instant::now();
        let data_folder = &self.paths.data_folder;
        let mut summary = AssemblySummary::default();

        let mut chapters = vec![(0, data_folder.clone())];
        chapters.extend(chapter_dirs(data_folder)?);

        for (chapter, dir) in chapters {
            if let Some(pdf) = self.assemble(&dir, chapter)? {
                summary.pages += pdf.pages;
                summary.skipped_pages += pdf.skipped;
                summary.chapter_pdfs.push(pdf);
            }
        }

        if one_file {
            if summary.chapter_pdfs.is_empty() {
                tracing::warn!("Nothing to merge into {}", self.paths.result_pdf.display());
            } else {
                let paths: Vec<PathBuf> = summary.chapter_pdfs.iter().map(|c| c.path.clone()).collect();
                summary.combined_pdf = Some(self.merge_all(&paths)?);
            }
        }

        summary.elapsed = start.elapsed();
        tracing::info!(
            "All chapters({}) bound within {}.",
            summary.chapter_pdfs.len(),
            format_elapsed(summary.elapsed)
        );

        Ok(summary)
    }
}

/// Numbered chapter directories of `data_folder`, in numeric order
pub fn chapter_dirs(data_folder: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut dirs = Vec::new();

    for entry in std::fs::read_dir(data_folder)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let chapter = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.parse::<u32>().ok());
        if let Some(chapter) = chapter {
            dirs.push((chapter, path));
        }
    }

    dirs.sort();
    Ok(dirs)
}
