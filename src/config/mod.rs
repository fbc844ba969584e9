//! Configuration module for Manga-Binder
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A configuration file is optional: every key has a default matching the
//! manga.in.ua markup, and command-line flags override whatever is loaded.
//!
//! # Example
//!
//! ```no_run
//! use manga_binder::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("binder.toml")).unwrap();
//! println!("Attempt ceiling: {}", config.download.attempts);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CorruptPagePolicy, DownloadConfig, OutputConfig, OutputPaths, SiteConfig,
    UserAgentConfig, DEFAULT_BASE_URL, DEFAULT_CHAPTER_LINK_CLASS, DOWNLOAD_ATTEMPTS,
    RATE_LIMIT_BACKOFF_MS,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
