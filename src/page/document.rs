use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

use crate::util::normalize_text;

/// Errors raised while querying a loaded page.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The selector string is not valid CSS for the HTML engine.
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
    /// No descendant matched the selector.
    #[error("No element matches '{0}'")]
    NotFound(String),
}

fn compile(pattern: &str) -> Result<Selector, QueryError> {
    Selector::parse(pattern).map_err(|e| QueryError::InvalidSelector {
        selector: pattern.to_owned(),
        reason: e.to_string(),
    })
}

/// Check that `pattern` compiles, without querying anything.
pub fn validate_selector(pattern: &str) -> Result<(), QueryError> {
    compile(pattern).map(|_| ())
}

/// A loaded, queryable document.
///
/// Holds the parsed DOM together with the URL it was loaded from.
pub struct Page {
    url: Url,
    html: Html,
}

impl Page {
    pub fn parse(url: Url, markup: &str) -> Self {
        Self {
            url,
            html: Html::parse_document(markup),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// All elements matching `pattern`, in document order.
    pub fn query_all(&self, pattern: &str) -> Result<Vec<Element<'_>>, QueryError> {
        let selector = compile(pattern)?;
        Ok(self.html.select(&selector).map(Element).collect())
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page").field("url", &self.url.as_str()).finish()
    }
}

/// A single element within a [`Page`].
#[derive(Clone, Copy)]
pub struct Element<'a>(ElementRef<'a>);

impl<'a> Element<'a> {
    /// The first descendant matching `pattern`.
    pub fn query_one(&self, pattern: &str) -> Result<Element<'a>, QueryError> {
        let selector = compile(pattern)?;
        self.0
            .select(&selector)
            .next()
            .map(Element)
            .ok_or_else(|| QueryError::NotFound(pattern.to_owned()))
    }

    /// Like [`query_one`](Self::query_one), but absence is not an error.
    pub fn find(&self, pattern: &str) -> Result<Option<Element<'a>>, QueryError> {
        match self.query_one(pattern) {
            Ok(el) => Ok(Some(el)),
            Err(QueryError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Whether any descendant matches `pattern`.
    pub fn has(&self, pattern: &str) -> Result<bool, QueryError> {
        Ok(self.find(pattern)?.is_some())
    }

    /// Rendered text content: whitespace runs collapsed and trimmed.
    pub fn text(&self) -> String {
        let raw: String = self.0.text().collect();
        normalize_text(&raw)
    }

    /// Attribute value with surrounding whitespace trimmed.
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.0.value().attr(name).map(|v| v.trim().to_owned())
    }
}

impl std::fmt::Debug for Element<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Element").field(&self.0.value().name()).finish()
    }
}
