//! URL handling module for Manga-Binder
//!
//! This module turns user input into absolute manga URLs, joins scraped
//! links onto the site base URL, and derives local names (manga slug and
//! page file extension) from URLs.

mod normalize;

pub use normalize::{file_extension, join_url, manga_slug, parse_base_url, resolve_manga_url};

/// Extension used when an image URL carries none
pub const FALLBACK_EXTENSION: &str = "jpg";
