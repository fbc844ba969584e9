use crate::config::SiteConfig;
use crate::url::FALLBACK_EXTENSION;
use crate::UrlError;
use url::Url;

/// Parses the configured base URL, accepting only HTTP and HTTPS
pub fn parse_base_url(base_url: &str) -> Result<Url, UrlError> {
    let url = Url::parse(base_url).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    Ok(url)
}

/// Resolves the manga listing URL given on the command line
///
/// Absolute HTTP(S) URLs are used as-is. Anything else is treated as a path
/// below the site's manga listing, e.g. `boyovik/2252-berserk-berserk.html`
/// becomes `<base>/mangas/boyovik/2252-berserk-berserk.html`.
///
/// # Examples
///
/// ```
/// use manga_binder::config::SiteConfig;
/// use manga_binder::url::resolve_manga_url;
///
/// let url = resolve_manga_url("boyovik/2252-berserk.html", &SiteConfig::default()).unwrap();
/// assert_eq!(url.as_str(), "https://manga.in.ua/mangas/boyovik/2252-berserk.html");
/// ```
pub fn resolve_manga_url(input: &str, site: &SiteConfig) -> Result<Url, UrlError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UrlError::Malformed("manga URL is empty".to_string()));
    }

    if let Ok(url) = Url::parse(input) {
        return match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                other
            ))),
        };
    }

    let base = parse_base_url(&site.base_url)?;
    let listing = join_url(&base, &format!("{}/", site.mangas_path.trim_matches('/')))?;
    join_url(&listing, input.trim_start_matches('/'))
}

/// Joins a possibly relative link onto a base URL
pub fn join_url(base: &Url, href: &str) -> Result<Url, UrlError> {
    base.join(href.trim())
        .map_err(|e| UrlError::Malformed(format!("cannot join '{}' onto {}: {}", href, base, e)))
}

/// Derives the manga slug from its listing URL
///
/// The slug is the last path segment without its extension:
/// `.../boyovik/2252-berserk-berserk.html` gives `2252-berserk-berserk`.
pub fn manga_slug(url: &Url) -> Result<String, UrlError> {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .ok_or_else(|| UrlError::Malformed(format!("no path segment in {}", url)))?;

    let slug = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment,
    };

    Ok(slug.to_string())
}

/// File extension of the last path segment, without the dot
///
/// Query strings and fragments are ignored. URLs without an extension fall
/// back to `jpg`.
pub fn file_extension(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}
