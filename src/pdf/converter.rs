//! Image-to-PDF conversion
//!
//! Each page image becomes a one-page PDF holding the image as a single
//! JPEG (`DCTDecode`) XObject. Page size follows the image size at the
//! requested resolution, so a 1000 px wide image at 100 dpi yields a
//! 720 pt (10 in) wide page.
//!
//! Conversion is CPU-bound and embarrassingly parallel; [`ConverterPool`]
//! runs one task per image on a fixed-size rayon pool.

use crate::{PdfError, PdfResult};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageReader};
use lopdf::{dictionary, Document, Object, Stream};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::path::{Path, PathBuf};

/// PDF user-space units per inch
pub const POINTS_PER_INCH: f32 = 72.0;

/// Quality used when re-encoding pages as JPEG
pub const JPEG_QUALITY: u8 = 90;

/// One image to convert and where its PDF goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionJob {
    pub image: PathBuf,
    pub pdf: PathBuf,
}

impl ConversionJob {
    pub fn new(image: impl Into<PathBuf>, pdf: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            pdf: pdf.into(),
        }
    }
}

/// Converts one image file into a single-page PDF
///
/// The image is normalized to 8-bit RGB (alpha is dropped) before encoding.
/// The output is deterministic: converting the same image twice yields the
/// same bytes.
///
/// # Errors
///
/// * `EmptyOrCorruptImage` - the file cannot be decoded or has no pixels
/// * `Write` - the PDF cannot be written
pub fn convert(image_path: &Path, pdf_path: &Path, resolution: f32) -> PdfResult<PathBuf> {
    let image = decode(image_path)?;
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();

    if width == 0 || height == 0 {
        return Err(PdfError::EmptyOrCorruptImage {
            path: image_path.to_path_buf(),
            reason: "image has no pixels".to_string(),
        });
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| PdfError::EmptyOrCorruptImage {
            path: image_path.to_path_buf(),
            reason: format!("failed to encode: {}", e),
        })?;

    let mut document = single_page_document(jpeg, width, height, resolution);

    if let Some(parent) = pdf_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    document
        .save(pdf_path)
        .map_err(|e| PdfError::Write {
            path: pdf_path.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(pdf_path.to_path_buf())
}

/// Decodes an image, sniffing the format from its content
fn decode(path: &Path) -> PdfResult<DynamicImage> {
    let corrupt = |reason: String| PdfError::EmptyOrCorruptImage {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(path)?;
    if metadata.len() == 0 {
        return Err(corrupt("file is empty".to_string()));
    }

    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| corrupt(e.to_string()))
}

/// Page size in points for an image at `resolution` dpi
pub fn page_size(width: u32, height: u32, resolution: f32) -> (f32, f32) {
    let scale = POINTS_PER_INCH / resolution;
    (width as f32 * scale, height as f32 * scale)
}

/// Builds a one-page document showing a JPEG over the whole page
fn single_page_document(jpeg: Vec<u8>, width: u32, height: u32, resolution: f32) -> Document {
    let (page_width, page_height) = page_size(width, height, resolution);

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
    .with_compression(false);
    let image_id = doc.add_object(image);

    let content = format!(
        "q\n{:.4} 0 0 {:.4} 0 0 cm\n/Im0 Do\nQ\n",
        page_width, page_height
    );
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(page_width),
            Object::Real(page_height),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                "Im0" => image_id,
            },
        },
    });

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![Object::Reference(page_id)],
        "Count" => 1_i64,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

/// Fixed-size worker pool for image conversion
pub struct ConverterPool {
    pool: ThreadPool,
}

impl ConverterPool {
    /// Creates a pool with `threads` workers; 0 uses the available parallelism
    pub fn new(threads: usize) -> PdfResult<Self> {
        let threads = if threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            threads
        };

        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("pdf-convert-{}", index))
            .build()?;

        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Converts every job, one task per image, and waits for all of them
    ///
    /// Results come back in job order regardless of completion order.
    pub fn convert_all(&self, jobs: &[ConversionJob], resolution: f32) -> Vec<PdfResult<PathBuf>> {
        self.pool.install(|| {
            jobs.par_iter()
                .map(|job| {
                    let result = convert(&job.image, &job.pdf, resolution);
                    if result.is_ok() {
                        tracing::debug!("Converted {} to pdf", job.image.display());
                    }
                    result
                })
                .collect()
        })
    }
}

impl std::fmt::Debug for ConverterPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterPool")
            .field("threads", &self.threads())
            .finish()
    }
}
