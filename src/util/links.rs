use thiserror::Error;
use url::Url;

/// Errors from validating configured URLs or resolving scraped hrefs.
#[derive(Error, Debug)]
pub enum UrlError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Validates a configured site URL (base URL, page URL or feed link).
///
/// Only `http` and `https` are accepted. Site URLs come from the operator's
/// own configuration, so hosts are not restricted.
pub fn validate_site_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim())?;
    require_http(url)
}

/// Resolves a scraped href against the site base URL.
///
/// Relative references follow RFC 3986 resolution (`news/1.html` under
/// `https://example.org/medic/` becomes `https://example.org/medic/news/1.html`).
/// Absolute http(s) hrefs pass through. Anything that resolves to another
/// scheme (`javascript:`, `mailto:`) is rejected, since it cannot serve as
/// a feed entry link.
pub fn resolve_link(base: &Url, href: &str) -> Result<Url, UrlError> {
    let resolved = base.join(href.trim())?;
    require_http(resolved)
}

fn require_http(url: Url) -> Result<Url, UrlError> {
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(UrlError::UnsupportedScheme(scheme.to_owned())),
    }
}
