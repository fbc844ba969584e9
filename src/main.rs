//! Manga-Binder main entry point
//!
//! This is the command-line interface for the Manga-Binder downloader.

use anyhow::{bail, Context};
use clap::Parser;
use manga_binder::config::{load_config, validate, Config};
use manga_binder::output::{print_statistics, RunStatistics};
use manga_binder::url::manga_slug;
use manga_binder::{pdf, Coordinator};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Manga-Binder: download a manga and bind it into PDFs
///
/// Manga-Binder lists every chapter of a manga page, downloads each
/// chapter's page images concurrently and converts them into one PDF per
/// chapter, optionally merged into a single document.
#[derive(Parser, Debug)]
#[command(name = "manga-binder")]
#[command(version = "1.0.0")]
#[command(about = "Download a manga and bind it into PDFs", long_about = None)]
struct Cli {
    /// Manga page URL, absolute or relative to the site's manga listing
    #[arg(value_name = "MANGA_URL", required_unless_present = "ping")]
    manga_url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Site base URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Folder for downloaded images
    #[arg(long, value_name = "DIR")]
    data_folder: Option<PathBuf>,

    /// Folder for chapter PDFs
    #[arg(long, value_name = "DIR")]
    result_folder: Option<PathBuf>,

    /// Combined PDF path
    #[arg(long, value_name = "FILE")]
    result_pdf: Option<PathBuf>,

    /// Merge every chapter into one PDF
    #[arg(long)]
    one_file: bool,

    /// Keep intermediate single-page PDFs
    #[arg(long)]
    keep_temp: bool,

    /// Keep downloaded images after binding
    #[arg(long)]
    keep_data: bool,

    /// Overwrite existing data and result folders
    #[arg(short, long)]
    force: bool,

    /// Image resolution in dots per inch
    #[arg(long, value_name = "DPI")]
    resolution: Option<f32>,

    /// Maximum concurrent image downloads
    #[arg(long, value_name = "N")]
    max_concurrent: Option<usize>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print the status code of the site's base URL and exit
    #[arg(long, conflicts_with = "page")]
    ping: bool,

    /// Download a single page image, e.g. `3:12`, and exit
    #[arg(long, value_name = "CHAPTER:PAGE", value_parser = parse_page_ref)]
    page: Option<(u32, u32)>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;

    if cli.ping {
        return handle_ping(config).await;
    }

    let Some(manga_url) = cli.manga_url.as_deref() else {
        bail!("MANGA_URL is required");
    };

    if let Some((chapter, page)) = cli.page {
        return handle_page(config, manga_url, chapter, page).await;
    }

    handle_run(config, manga_url, cli.force).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("manga_binder=info,warn"),
            1 => EnvFilter::new("manga_binder=debug,info"),
            2 => EnvFilter::new("manga_binder=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, if any, and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(base_url) = &cli.base_url {
        config.site.base_url = base_url.clone();
    }
    if let Some(max_concurrent) = cli.max_concurrent {
        config.download.max_concurrent_downloads = max_concurrent;
    }

    let output = &mut config.output;
    if cli.data_folder.is_some() {
        output.data_folder = cli.data_folder.clone();
    }
    if cli.result_folder.is_some() {
        output.result_folder = cli.result_folder.clone();
    }
    if cli.result_pdf.is_some() {
        output.result_pdf = cli.result_pdf.clone();
    }
    if let Some(resolution) = cli.resolution {
        output.resolution = resolution;
    }
    output.one_file |= cli.one_file;
    output.keep_temp |= cli.keep_temp;
    output.keep_data |= cli.keep_data;

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Parses `CHAPTER:PAGE`, both 1-based
fn parse_page_ref(value: &str) -> Result<(u32, u32), String> {
    let (chapter, page) = value
        .split_once(':')
        .ok_or_else(|| format!("expected CHAPTER:PAGE, got '{}'", value))?;

    let parse = |part: &str| match part.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{}' is not a positive number", part)),
    };

    Ok((parse(chapter)?, parse(page)?))
}

/// Handles --ping: reports the status code of the base URL
async fn handle_ping(config: Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;
    let status = coordinator.ping().await?;
    println!("{}", status);
    Ok(())
}

/// Handles --page: downloads one page image
async fn handle_page(config: Config, manga_url: &str, chapter: u32, page: u32) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config)?;
    let image = coordinator.download_page(manga_url, chapter, page).await?;

    if image.status().is_success() {
        println!("{}", image.path.display());
        Ok(())
    } else {
        for entry in coordinator.errors().entries() {
            eprintln!("{}", entry);
        }
        bail!("Failed to download page {}:{}", chapter, page)
    }
}

/// Handles a full run: download, bind, clean up, report
async fn handle_run(config: Config, manga_url: &str, forced: bool) -> anyhow::Result<()> {
    let start = Instant::now();
    let coordinator = Coordinator::new(config.clone())?;

    let (manga_url, paths) = coordinator.resolve(manga_url)?;
    let slug = manga_slug(&manga_url)?;
    tracing::info!("Downloading {} into {}", manga_url, paths.data_folder.display());

    let download = coordinator
        .run_into(&manga_url, &paths.data_folder, forced)
        .await?;

    let assembly = pdf::assemble(&config, &slug, forced, coordinator.errors().clone()).await?;

    if !config.output.keep_data {
        tracing::info!("Deleting {}", paths.data_folder.display());
        if let Err(e) = tokio::fs::remove_dir_all(&paths.data_folder).await {
            tracing::warn!("Failed to remove {}: {}", paths.data_folder.display(), e);
        }
    }

    let stats = RunStatistics::collect(
        Some(&download),
        Some(&assembly),
        start.elapsed(),
        coordinator.errors().entries(),
    );
    print_statistics(&stats);

    Ok(())
}
