use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use futures::StreamExt;
use regex::Regex;
use thiserror::Error;
use url::Url;

use super::Page;

/// Default response cap for a listing page.
pub const DEFAULT_MAX_PAGE_BYTES: usize = 10 * 1024 * 1024; // 10MB

/// How far into the body to look for a `<meta charset>` declaration.
const CHARSET_SNIFF_BYTES: usize = 1024;

/// Errors that can occur while loading a page.
///
/// Every variant is recoverable at the page level: the pipeline treats the
/// page as contributing no items and moves on.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Load did not complete within the page timeout
    #[error("Page load timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Loads pages for extraction.
///
/// One call is one bounded attempt. Implementations must not retry; a
/// failed or slow page is reported as an error and the caller carries on
/// without it.
pub trait PageFetcher {
    fn fetch(&self, url: &Url, timeout: Duration) -> impl Future<Output = Result<Page, FetchError>>;
}

/// Fetches static HTML over HTTP.
///
/// The client is built once and reused for every page of the invocation;
/// dropping the fetcher releases its connection pool.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, max_bytes: usize) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self { client, max_bytes })
    }

    async fn load(&self, url: &Url) -> Result<String, FetchError> {
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        let header_charset = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_label)
            .map(str::to_owned);

        let bytes = read_limited_bytes(response, self.max_bytes).await?;
        Ok(decode_body(&bytes, header_charset.as_deref()))
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Page, FetchError> {
        let markup = tokio::time::timeout(timeout, self.load(url))
            .await
            .map_err(|_| FetchError::Timeout(timeout))??;

        tracing::debug!(url = %url, bytes = markup.len(), "Page loaded");
        Ok(Page::parse(url.clone(), &markup))
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

fn charset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)charset\s*=\s*["']?\s*([a-z0-9_.:\-]+)"#).expect("static regex is valid")
    })
}

/// Extract the charset label from a Content-Type value or a markup prefix.
fn charset_label(haystack: &str) -> Option<&str> {
    charset_regex()
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Decode a response body to text.
///
/// Precedence: byte order mark, then the Content-Type charset, then a
/// `<meta>` declaration near the top of the document, then UTF-8. Many
/// society sites still serve Shift_JIS or EUC-JP.
fn decode_body(bytes: &[u8], header_charset: Option<&str>) -> String {
    let sniff_len = bytes.len().min(CHARSET_SNIFF_BYTES);
    let head = String::from_utf8_lossy(&bytes[..sniff_len]);

    let encoding = header_charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| charset_label(&head).and_then(|label| Encoding::for_label(label.as_bytes())))
        .unwrap_or(UTF_8);

    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = used.name(), "Body contained malformed sequences");
    }
    text.into_owned()
}
