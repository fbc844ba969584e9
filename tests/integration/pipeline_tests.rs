//! Integration tests for the download and binding pipeline
//!
//! These tests use wiremock to stand in for the manga site and run the
//! chapter listing, image download and PDF binding end-to-end.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::Document;
use manga_binder::config::{Config, DownloadConfig, OutputConfig, SiteConfig};
use manga_binder::crawler::{build_http_client, Coordinator, Fetcher, ImageDownloader, RetryPolicy};
use manga_binder::{pdf, BinderError, DownloadStatus, ErrorLog, FetchError};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANGA_PATH: &str = "/mangas/boyovik/1-test.html";

/// Creates a test configuration pointing every folder into `root`
fn create_test_config(base_url: &str, root: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: base_url.to_string(),
            ..SiteConfig::default()
        },
        download: DownloadConfig {
            attempts: 2,
            rate_limit_backoff: 10, // Very short for testing
            max_concurrent_downloads: 4,
            request_timeout: 5,
        },
        output: OutputConfig {
            data_folder: Some(root.join("data")),
            temp_folder: Some(root.join("temp")),
            result_folder: Some(root.join("result")),
            result_pdf: Some(root.join("all.pdf")),
            one_file: true,
            resolution: 72.0,
            ..OutputConfig::default()
        },
        ..Config::default()
    }
}

/// PNG bytes of a blank image `width` pixels wide
fn png(width: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 8, Rgb([255, 255, 255])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode png");
    bytes
}

fn downloader(server: &MockServer, attempts: u32) -> ImageDownloader {
    let client = build_http_client(&Default::default(), Duration::from_secs(5))
        .expect("Failed to build client");
    let policy = RetryPolicy {
        attempts,
        backoff: Duration::from_millis(10),
    };
    let base = Url::parse(&server.uri()).expect("Failed to parse base URL");
    ImageDownloader::new(Fetcher::new(client, policy), base, 4)
}

/// Page widths of a PDF, in page order
fn page_widths(path: &Path) -> Vec<f32> {
    let doc = Document::load(path).expect("Failed to load pdf");
    doc.get_pages()
        .into_values()
        .map(|id| {
            let page = doc.get_dictionary(id).expect("Missing page");
            let media_box = page
                .get(b"MediaBox")
                .and_then(|b| b.as_array())
                .expect("Missing MediaBox");
            media_box[2].as_float().expect("Bad MediaBox")
        })
        .collect()
}

#[tokio::test]
async fn test_full_pipeline_three_chapters() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(MANGA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
                <a class="forfastnavigation chapterscalc" href="/chapters/1.html">1</a>
                <a class="forfastnavigation chapterscalc" href="/chapters/2.html">2</a>
                <a class="forfastnavigation chapterscalc" href="/chapters/3.html">3</a>
            </body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Page widths encode chapter and page: 10 * chapter + page
    for chapter in 1..=3u32 {
        Mock::given(method("GET"))
            .and(path(format!("/chapters/{}.html", chapter)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<html><body>
                    <img data-src="/img/{c}/1.png">
                    <img data-src="/img/{c}/2.png">
                </body></html>"#,
                c = chapter
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        for page in 1..=2u32 {
            Mock::given(method("GET"))
                .and(path(format!("/img/{}/{}.png", chapter, page)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(png(10 * chapter + page)))
                .expect(1)
                .mount(&mock_server)
                .await;
        }
    }

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config.clone()).expect("Failed to create coordinator");
    let summary = coordinator
        .run("boyovik/1-test.html", false)
        .await
        .expect("Download failed");

    assert_eq!(summary.chapters.len(), 3);
    assert_eq!(summary.images_downloaded(), 6);
    assert!(coordinator.errors().is_empty());
    for chapter in 1..=3 {
        let dir = root.path().join("data").join(chapter.to_string());
        assert!(dir.join("1.png").is_file());
        assert!(dir.join("2.png").is_file());
    }

    let assembly = pdf::assemble(&config, "1-test", false, coordinator.errors().clone())
        .await
        .expect("Assembly failed");

    assert_eq!(assembly.chapter_pdfs.len(), 3);
    assert_eq!(assembly.pages, 6);
    for chapter in 1..=3u32 {
        let widths = page_widths(&root.path().join(format!("result/{}.pdf", chapter)));
        let expected = vec![(10 * chapter + 1) as f32, (10 * chapter + 2) as f32];
        assert_eq!(widths, expected);
    }

    assert_eq!(
        page_widths(&root.path().join("all.pdf")),
        vec![11.0, 12.0, 21.0, 22.0, 31.0, 32.0]
    );
    assert!(!root.path().join("temp").exists());
}

#[tokio::test]
async fn test_rate_limited_image_exhausts_retries() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    // attempts = 3 means 4 requests in total
    Mock::given(method("GET"))
        .and(path("/img/1.jpg"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&mock_server)
        .await;

    let downloader = downloader(&mock_server, 3);
    let errors = ErrorLog::new();
    let url = Url::parse(&format!("{}/img/1.jpg", mock_server.uri())).unwrap();
    let target = dir.path().join("1.jpg");

    let status = downloader.download_one(&url, &target, &errors).await;

    assert_eq!(status, DownloadStatus::FailedExhaustedRetries);
    assert!(!target.exists());
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_fetch_reports_exhausted_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = build_http_client(&Default::default(), Duration::from_secs(5)).unwrap();
    let fetcher = Fetcher::new(
        client,
        RetryPolicy {
            attempts: 2,
            backoff: Duration::from_millis(10),
        },
    );

    let err = fetcher
        .fetch(&format!("{}/busy", mock_server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, FetchError::Exhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_missing_image_fails_without_retry() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/img/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/2.png"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let urls = vec!["/img/1.png".to_string(), "/img/2.png".to_string()];
    let report = downloader(&mock_server, 5)
        .download_all(&urls, dir.path(), "1/1")
        .await;

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.pages[1].status(), DownloadStatus::FailedPermanent);
    assert!(dir.path().join("1.png").is_file());
    assert!(!dir.path().join("2.png").exists());
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let mock_server = MockServer::start().await;
    let dir = tempfile::tempdir().expect("Failed to create temp dir");

    Mock::given(method("GET"))
        .and(path("/img/1.png"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let errors = ErrorLog::new();
    let url = Url::parse(&format!("{}/img/1.png", mock_server.uri())).unwrap();
    let target = dir.path().join("1.png");

    let status = downloader(&mock_server, 3)
        .download_one(&url, &target, &errors)
        .await;

    assert_eq!(status, DownloadStatus::Success);
    assert!(target.is_file());
    assert!(errors.is_empty());
}

#[tokio::test]
async fn test_empty_chapter_list_is_retried_then_fails() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");

    // attempts = 2 means 3 requests in total
    Mock::given(method("GET"))
        .and(path(MANGA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body></body></html>"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let result = coordinator.run("boyovik/1-test.html", false).await;

    assert!(matches!(
        result,
        Err(BinderError::Fetch(FetchError::Exhausted { attempts: 3, .. }))
    ));
}

#[tokio::test]
async fn test_populated_data_folder_is_refused() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    std::fs::create_dir_all(root.path().join("data/1")).unwrap();
    std::fs::write(root.path().join("data/1/1.jpg"), b"old").unwrap();

    // Nothing may be requested before the folder check
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let result = coordinator.run("boyovik/1-test.html", false).await;

    assert!(matches!(result, Err(BinderError::StorageConflict { .. })));
    assert!(root.path().join("data/1/1.jpg").exists());
}

#[tokio::test]
async fn test_single_page_download() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");

    Mock::given(method("GET"))
        .and(path(MANGA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<a class="forfastnavigation chapterscalc" href="/chapters/1.html">1</a>
               <a class="forfastnavigation chapterscalc" href="/chapters/2.html">2</a>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chapters/2.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<img data-src="/img/2/1.png"><img data-src="/img/2/2.png">"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/img/2/2.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");

    let image = coordinator
        .download_page("boyovik/1-test.html", 2, 2)
        .await
        .expect("Page download failed");
    assert_eq!(image.status(), DownloadStatus::Success);
    assert_eq!(image.path, root.path().join("data/2/2.png"));
    assert!(image.path.is_file());

    let missing = coordinator.download_page("boyovik/1-test.html", 5, 1).await;
    assert!(matches!(
        missing,
        Err(BinderError::ChapterOutOfRange { chapter: 5, total: 2 })
    ));
}

/// Mounts a manga page listing `/chapters/<n>.html` for every `n` in `chapters`
async fn mount_manga(server: &MockServer, chapters: &[u32]) {
    let links: String = chapters
        .iter()
        .map(|n| {
            format!(
                r#"<a class="forfastnavigation chapterscalc" href="/chapters/{n}.html">{n}</a>"#,
                n = n
            )
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(MANGA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(links))
        .mount(server)
        .await;
}

/// Chapter page body listing the given image paths
fn chapter_page(images: &[&str]) -> String {
    images
        .iter()
        .map(|src| format!(r#"<img data-src="{}">"#, src))
        .collect()
}

/// GIF bytes of a blank image `width` pixels wide
fn gif(width: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, 8, Rgb([0, 0, 0])))
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Gif)
        .expect("Failed to encode gif");
    bytes
}

#[tokio::test]
async fn test_gif_page_is_bound_in_reading_order() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    mount_manga(&mock_server, &[1]).await;

    Mock::given(method("GET"))
        .and(path("/chapters/1.html"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(chapter_page(&["/i/1.png", "/i/2.gif", "/i/3.png"])),
        )
        .mount(&mock_server)
        .await;
    for (name, body) in [("1.png", png(11)), ("2.gif", gif(12)), ("3.png", png(13))] {
        Mock::given(method("GET"))
            .and(path(format!("/i/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config.clone()).expect("Failed to create coordinator");
    let summary = coordinator
        .run("boyovik/1-test.html", false)
        .await
        .expect("Download failed");
    assert_eq!(summary.images_downloaded(), 3);
    assert!(root.path().join("data/1/2.gif").is_file());

    let assembly = pdf::assemble(&config, "1-test", false, coordinator.errors().clone())
        .await
        .expect("Assembly failed");

    assert_eq!(assembly.pages, 3);
    assert_eq!(assembly.skipped_pages, 0);
    assert!(coordinator.errors().is_empty());
    assert_eq!(
        page_widths(&root.path().join("result/1.pdf")),
        vec![11.0, 12.0, 13.0]
    );
}

#[tokio::test]
async fn test_rate_limited_chapter_page_is_retried() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    mount_manga(&mock_server, &[1]).await;

    Mock::given(method("GET"))
        .and(path("/chapters/1.html"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chapters/1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(&["/i/1.png"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/i/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let summary = coordinator
        .run("boyovik/1-test.html", false)
        .await
        .expect("Download failed");

    assert_eq!(summary.images_downloaded(), 1);
    assert!(root.path().join("data/1/1.png").is_file());
    assert!(coordinator.errors().is_empty());
}

#[tokio::test]
async fn test_missing_chapter_page_fails_without_retry() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    mount_manga(&mock_server, &[1]).await;

    Mock::given(method("GET"))
        .and(path("/chapters/1.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let result = coordinator.run("boyovik/1-test.html", false).await;

    assert!(matches!(
        result,
        Err(BinderError::Fetch(FetchError::Permanent { status: 404, .. }))
    ));
}

#[tokio::test]
async fn test_chapter_extraction_failure_stops_the_run() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");
    mount_manga(&mock_server, &[1, 2, 3]).await;

    Mock::given(method("GET"))
        .and(path("/chapters/1.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(&["/i/1/1.png"])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/i/1/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(8)))
        .expect(1)
        .mount(&mock_server)
        .await;

    // attempts = 2 means 3 requests before giving up
    Mock::given(method("GET"))
        .and(path("/chapters/2.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .expect(3)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/chapters/3.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(chapter_page(&["/i/3/1.png"])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let result = coordinator.run("boyovik/1-test.html", false).await;

    assert!(matches!(
        result,
        Err(BinderError::Fetch(FetchError::Exhausted { attempts: 3, .. }))
    ));
    assert!(root.path().join("data/1/1.png").is_file());
    assert!(!root.path().join("data/3").exists());
}

#[tokio::test]
async fn test_forced_run_replaces_previous_download() {
    let mock_server = MockServer::start().await;
    let root = tempfile::tempdir().expect("Failed to create temp dir");

    // Leftovers of an earlier, longer run
    let data = root.path().join("data");
    std::fs::create_dir_all(data.join("1")).unwrap();
    std::fs::create_dir_all(data.join("7")).unwrap();
    std::fs::write(data.join("1/9.png"), png(99)).unwrap();
    std::fs::write(data.join("7/1.png"), png(77)).unwrap();
    std::fs::write(data.join("5.png"), png(55)).unwrap();

    mount_manga(&mock_server, &[1]).await;
    Mock::given(method("GET"))
        .and(path("/chapters/1.html"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(chapter_page(&["/i/1.png", "/i/2.png"])),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    for page in 1..=2u32 {
        Mock::given(method("GET"))
            .and(path(format!("/i/{}.png", page)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(page)))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let config = create_test_config(&mock_server.uri(), root.path());
    let coordinator = Coordinator::new(config.clone()).expect("Failed to create coordinator");
    let summary = coordinator
        .run("boyovik/1-test.html", true)
        .await
        .expect("Forced download failed");

    assert_eq!(summary.images_downloaded(), 2);
    assert!(!data.join("1/9.png").exists());
    assert!(!data.join("7").exists());
    assert!(!data.join("5.png").exists());

    let assembly = pdf::assemble(&config, "1-test", true, coordinator.errors().clone())
        .await
        .expect("Assembly failed");

    let chapters: Vec<u32> = assembly.chapter_pdfs.iter().map(|c| c.chapter).collect();
    assert_eq!(chapters, vec![1]);
    assert_eq!(page_widths(&root.path().join("result/1.pdf")), vec![1.0, 2.0]);
    assert_eq!(page_widths(&root.path().join("all.pdf")), vec![1.0, 2.0]);
}
