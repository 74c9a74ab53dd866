//! One site, end to end: fetch → extract → aggregate → synthesize → write.
//!
//! Pages are processed strictly one after another. A page that fails to
//! load contributes nothing and the run carries on; only a failure to write
//! the feed file is returned as an error.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use url::Url;

use crate::config::Site;
use crate::extract::{Item, RowFailure};
use crate::feed::{aggregate, write_feed, Feed, FeedWriteError};
use crate::page::{FetchError, PageFetcher};

/// What happened to one page of a site.
#[derive(Debug)]
pub enum PageOutcome {
    Loaded {
        rows: usize,
        items: usize,
        failures: Vec<RowFailure>,
    },
    Failed(FetchError),
}

#[derive(Debug)]
pub struct PageReport {
    pub url: Url,
    pub outcome: PageOutcome,
}

/// Summary of a completed site run.
#[derive(Debug)]
pub struct SiteReport {
    pub key: String,
    pub output: PathBuf,
    pub entries: usize,
    pub pages: Vec<PageReport>,
}

impl SiteReport {
    pub fn failed_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::Failed(_)))
            .count()
    }

    pub fn skipped_rows(&self) -> usize {
        self.pages
            .iter()
            .map(|p| match &p.outcome {
                PageOutcome::Loaded { failures, .. } => failures.len(),
                PageOutcome::Failed(_) => 0,
            })
            .sum()
    }
}

/// Fetch and extract every page of `site`, returning the merged items.
pub async fn collect_items<F: PageFetcher>(
    fetcher: &F,
    site: &Site,
    timeout: Duration,
) -> (Vec<Item>, Vec<PageReport>) {
    let mut batches = Vec::with_capacity(site.pages.len());
    let mut reports = Vec::with_capacity(site.pages.len());

    for (i, page_config) in site.pages.iter().enumerate() {
        let url = &page_config.url;
        tracing::info!(site = %site.key, page = i + 1, url = %url, "Loading page");

        let page = match fetcher.fetch(url, timeout).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(site = %site.key, url = %url, error = %e, "Page load failed, skipping");
                batches.push(Vec::new());
                reports.push(PageReport {
                    url: url.clone(),
                    outcome: PageOutcome::Failed(e),
                });
                continue;
            }
        };

        let extraction = page_config.extractor.extract(&page, &site.rules);
        if extraction.items.is_empty() {
            tracing::warn!(site = %site.key, url = %url, "No items on page");
        }

        reports.push(PageReport {
            url: url.clone(),
            outcome: PageOutcome::Loaded {
                rows: extraction.rows,
                items: extraction.items.len(),
                failures: extraction.failures,
            },
        });
        batches.push(extraction.items);
    }

    (aggregate(batches), reports)
}

/// Run the whole pipeline for `site` and write its feed.
///
/// `now` is stamped as the feed's build date.
pub async fn run_site<F: PageFetcher>(
    fetcher: &F,
    site: &Site,
    timeout: Duration,
    now: DateTime<Utc>,
) -> Result<SiteReport, FeedWriteError> {
    let (items, pages) = collect_items(fetcher, site, timeout).await;

    if items.is_empty() {
        tracing::warn!(site = %site.key, "No items extracted, page markup may have changed");
    }

    let feed = Feed::new(&site.org_name, &site.feed_link, items, now);
    write_feed(&feed, &site.output)?;

    Ok(SiteReport {
        key: site.key.clone(),
        output: site.output.clone(),
        entries: feed.entries.len(),
        pages,
    })
}
