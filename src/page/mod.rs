//! Page loading and DOM queries.
//!
//! The rest of the crate sees a page only through this narrow surface:
//!
//! - [`PageFetcher::fetch`] loads a URL within a timeout, yielding a [`Page`]
//!   or a [`FetchError`]
//! - [`Page::query_all`] locates repeating row elements
//! - [`Element::query_one`], [`Element::text`] and [`Element::attribute`]
//!   read the pieces of a row
//!
//! [`HttpFetcher`] is the production implementation. Tests substitute their
//! own fetchers serving fixture markup.

mod document;
mod fetcher;

pub use document::{validate_selector, Element, Page, QueryError};
pub use fetcher::{FetchError, HttpFetcher, PageFetcher, DEFAULT_MAX_PAGE_BYTES};
