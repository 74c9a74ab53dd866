//! Utility functions for common operations.
//!
//! - **Text cleanup**: whitespace normalization and removal of characters
//!   that are not allowed in XML
//! - **URLs**: scheme validation for configured site URLs and resolution of
//!   scraped hrefs against a site base
//!
//! # Examples
//!
//! ```
//! use gakkai_feed::util::{normalize_text, resolve_link};
//! use url::Url;
//!
//! assert_eq!(normalize_text("  新着\n  情報 "), "新着 情報");
//!
//! let base = Url::parse("https://example.org/medic/").unwrap();
//! let link = resolve_link(&base, "news/1.html").unwrap();
//! assert_eq!(link.as_str(), "https://example.org/medic/news/1.html");
//! ```

mod text;
mod links;

pub use self::text::{normalize_text, strip_control_chars};
pub use self::links::{resolve_link, validate_site_url, UrlError};
