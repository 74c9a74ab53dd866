//! Builds RSS 2.0 feeds for society news listings that publish none.
//!
//! Each configured site is scraped page by page, its rows turned into
//! [`extract::Item`]s by a site-specific [`extract::Extractor`], merged newest
//! first and written out as a feed file. See [`pipeline::run_site`].

pub mod config;
pub mod extract;
pub mod feed;
pub mod page;
pub mod pipeline;
pub mod util;
