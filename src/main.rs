use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use gakkai_feed::config::Config;
use gakkai_feed::page::HttpFetcher;
use gakkai_feed::pipeline::run_site;

#[derive(Parser, Debug)]
#[command(
    name = "gakkai-feed",
    about = "Generate RSS feeds from medical society news listings"
)]
struct Args {
    /// Configuration file (missing file means built-in defaults)
    #[arg(long, value_name = "FILE", default_value = "gakkai-feed.toml")]
    config: PathBuf,

    /// Override the output directory from the config
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Only run the given site (repeatable); default is every site
    #[arg(long = "site", value_name = "KEY")]
    sites: Vec<String>,

    /// Print the configured sites and exit
    #[arg(long)]
    list_sites: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gakkai_feed=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }

    let sites = config.select_sites(&args.sites)?;

    if args.list_sites {
        for site in &sites {
            println!("{}\t{}\t{}", site.key, site.org_name, site.output.display());
        }
        return Ok(());
    }

    // One client for the whole invocation, released when main returns.
    let fetcher = HttpFetcher::new(&config.user_agent, config.max_page_bytes)
        .context("Failed to build HTTP client")?;

    for site in &sites {
        tracing::info!(site = %site.key, org = %site.org_name, "Generating feed");

        let report = run_site(&fetcher, site, config.timeout(), Utc::now())
            .await
            .with_context(|| format!("Failed to write feed for site '{}'", site.key))?;

        let mut line = format!(
            "{}: {} entries -> {}",
            report.key,
            report.entries,
            report.output.display()
        );
        if report.failed_pages() > 0 {
            line.push_str(&format!(" ({} page(s) failed to load)", report.failed_pages()));
        }
        if report.skipped_rows() > 0 {
            line.push_str(&format!(" ({} row(s) skipped)", report.skipped_rows()));
        }
        if report.entries == 0 {
            line.push_str(" [empty: check page markup]");
        }
        println!("{line}");
    }

    Ok(())
}
