//! Site-specific item extraction.
//!
//! Every supported site lays its listing out as repeating row elements and
//! differs only in which sub-elements carry the date, title and href. Each
//! layout is one [`Extractor`] variant; all of them share the same row loop:
//!
//! 1. locate candidate rows and keep those holding the required parts
//! 2. apply the site's row cap, if any
//! 3. turn each row into `Result<Item, RowError>` in isolation
//!
//! A bad row is logged and skipped. It never aborts the page.

mod dates;
mod strategies;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::page::{Element, Page, QueryError};
use crate::util::UrlError;

/// One syndicated entry scraped from a listing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub title: String,
    pub link: Url,
    pub description: String,
    pub pub_date: DateTime<Utc>,
}

/// Why a single row was rejected.
#[derive(Debug, Error)]
pub enum RowError {
    #[error("Missing element '{0}'")]
    MissingElement(String),
    #[error("Missing attribute '{attribute}' on '{element}'")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    #[error("Malformed date: '{0}'")]
    MalformedDate(String),
    #[error("Empty title")]
    EmptyTitle,
    #[error("Unusable link '{href}': {source}")]
    InvalidLink {
        href: String,
        #[source]
        source: UrlError,
    },
    #[error(transparent)]
    Selector(QueryError),
}

impl From<QueryError> for RowError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::NotFound(selector) => RowError::MissingElement(selector),
            other => RowError::Selector(other),
        }
    }
}

/// What to do with a row whose anchor has no usable href.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPolicy {
    /// The row is rejected.
    Required,
    /// The given link is used instead.
    Fallback(Url),
}

/// Per-site parameters shared by every page of the site.
#[derive(Debug, Clone)]
pub struct SiteRules {
    pub base_url: Url,
    pub link_policy: LinkPolicy,
    /// Only the first `max_rows` matched rows of each page are processed.
    pub max_rows: Option<usize>,
}

impl SiteRules {
    /// Turn an optional href into an absolute entry link.
    fn resolve_href(&self, element: &str, href: Option<String>) -> Result<Url, RowError> {
        match href.filter(|h| !h.is_empty()) {
            Some(href) => crate::util::resolve_link(&self.base_url, &href)
                .map_err(|source| RowError::InvalidLink { href, source }),
            None => match &self.link_policy {
                LinkPolicy::Fallback(link) => Ok(link.clone()),
                LinkPolicy::Required => Err(RowError::MissingAttribute {
                    element: element.to_owned(),
                    attribute: "href",
                }),
            },
        }
    }
}

/// A listing layout.
///
/// Deserializes from an internally tagged table, e.g.
/// `{ kind = "time-table", link_selector = "td a.external" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Extractor {
    /// `dl` rows with a dotted `YYYY.MM.DD` date in `dt.date` and the title
    /// link in `dd.title a`.
    DottedDateList,
    /// Table rows with `<th><time datetime="YYYY-MM-DD">` and a title link
    /// in a `td`; the whole `td` text becomes the description.
    TimeTable { link_selector: String },
    /// `div.box` cards whose anchor wraps a `time.post_date[postdate]`, an
    /// optional `span.others` category and the title in `dd`.
    PostDateBox,
}

/// A row that failed to parse, numbered from 1 in document order.
#[derive(Debug)]
pub struct RowFailure {
    pub row: usize,
    pub error: RowError,
}

/// Outcome of extracting one page.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Rows matched on the page, before any cap.
    pub rows: usize,
    pub items: Vec<Item>,
    pub failures: Vec<RowFailure>,
}

impl Extractor {
    /// Container selector and the descendants each row must hold.
    fn row_pattern(&self) -> (&str, Vec<&str>) {
        match self {
            Extractor::DottedDateList => (strategies::DOTTED_ROWS, Vec::new()),
            Extractor::TimeTable { link_selector } => (
                strategies::TIME_TABLE_ROWS,
                vec![strategies::TIME_TABLE_DATE, link_selector.as_str()],
            ),
            Extractor::PostDateBox => (strategies::POST_BOX_ROWS, Vec::new()),
        }
    }

    fn select_rows<'p>(&self, page: &'p Page) -> Result<Vec<Element<'p>>, QueryError> {
        let (container, required) = self.row_pattern();
        let mut rows = Vec::new();
        for row in page.query_all(container)? {
            let mut keep = true;
            for pattern in &required {
                if !row.has(pattern)? {
                    keep = false;
                    break;
                }
            }
            if keep {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn extract_row(&self, row: Element<'_>, rules: &SiteRules) -> Result<Item, RowError> {
        match self {
            Extractor::DottedDateList => strategies::dotted_date_list(row, rules),
            Extractor::TimeTable { link_selector } => {
                strategies::time_table(row, link_selector, rules)
            }
            Extractor::PostDateBox => strategies::post_date_box(row, rules),
        }
    }

    /// Extract every valid item from `page`, in document order.
    ///
    /// Never fails: an unusable row pattern yields an empty extraction and a
    /// warning, and each failed row is recorded in `failures`.
    pub fn extract(&self, page: &Page, rules: &SiteRules) -> Extraction {
        let rows = match self.select_rows(page) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(url = %page.url(), error = %e, "Row selection failed");
                return Extraction::default();
            }
        };

        tracing::info!(url = %page.url(), rows = rows.len(), "Rows discovered");

        let mut extraction = Extraction {
            rows: rows.len(),
            ..Extraction::default()
        };
        let limit = rules.max_rows.unwrap_or(usize::MAX);

        for (i, row) in rows.into_iter().take(limit).enumerate() {
            match self.extract_row(row, rules) {
                Ok(item) => extraction.items.push(item),
                Err(error) => {
                    tracing::warn!(row = i + 1, error = %error, "Failed to parse row, skipping");
                    extraction.failures.push(RowFailure { row: i + 1, error });
                }
            }
        }

        extraction
    }
}
