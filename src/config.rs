//! Run configuration: fetch settings plus the per-site registry.
//!
//! The config file is optional. A missing or empty file yields
//! `Config::default()`, which carries the built-in sites. Sites declared in
//! the file replace the built-in site with the same key, or are appended.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::extract::{Extractor, LinkPolicy, SiteRules};
use crate::page::{validate_selector, DEFAULT_MAX_PAGE_BYTES};
use crate::util::validate_site_url;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory that relative site output paths are resolved against.
    pub output_dir: PathBuf,

    /// Bound on a single page load, in seconds.
    pub timeout_secs: u64,

    /// Largest response body accepted for a listing page.
    pub max_page_bytes: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Site registry, in run order.
    pub sites: Vec<SiteConfig>,
}

/// One society site as written in the config file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SiteConfig {
    pub key: String,
    pub org_name: String,
    /// Base for resolving relative hrefs.
    pub base_url: String,
    /// Channel-level `<link>`.
    pub feed_link: String,
    /// Output file, relative to `output_dir` unless absolute.
    pub output: PathBuf,
    /// Link used for rows without an href. Without it such rows are skipped.
    #[serde(default)]
    pub fallback_link: Option<String>,
    /// Per-page cap on processed rows.
    #[serde(default)]
    pub max_rows: Option<usize>,
    pub pages: Vec<PageConfig>,
}

/// One listing page of a site and the layout used to read it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PageConfig {
    pub url: String,
    pub strategy: Extractor,
}

/// A validated site, ready to run.
#[derive(Debug, Clone)]
pub struct Site {
    pub key: String,
    pub org_name: String,
    pub feed_link: Url,
    pub output: PathBuf,
    pub rules: SiteRules,
    pub pages: Vec<SitePage>,
}

#[derive(Debug, Clone)]
pub struct SitePage {
    pub url: Url,
    pub extractor: Extractor,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("rss_output"),
            timeout_secs: 30,
            max_page_bytes: DEFAULT_MAX_PAGE_BYTES,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            sites: builtin_sites(),
        }
    }
}

/// The societies supported out of the box.
pub fn builtin_sites() -> Vec<SiteConfig> {
    vec![
        SiteConfig {
            key: "jsn".to_string(),
            org_name: "日本腎臓学会".to_string(),
            base_url: "https://jsn.or.jp/medic/".to_string(),
            feed_link: "https://jsn.or.jp/medic/news/index.php".to_string(),
            output: PathBuf::from("Feed15.xml"),
            fallback_link: Some("https://jsn.or.jp/medic/".to_string()),
            max_rows: None,
            pages: vec![PageConfig {
                url: "https://jsn.or.jp/medic/news/index.php".to_string(),
                strategy: Extractor::DottedDateList,
            }],
        },
        SiteConfig {
            key: "jsmd".to_string(),
            org_name: "日本うつ病学会".to_string(),
            base_url: "https://www.secretariat.ne.jp/jsmd/".to_string(),
            feed_link: "https://www.secretariat.ne.jp/jsmd/".to_string(),
            output: PathBuf::from("Feed20.xml"),
            fallback_link: Some("https://www.secretariat.ne.jp/jsmd/".to_string()),
            max_rows: None,
            pages: vec![
                PageConfig {
                    url: "https://www.secretariat.ne.jp/jsmd/info/info-shintyaku-index.html"
                        .to_string(),
                    strategy: Extractor::TimeTable {
                        link_selector: "td a.external".to_string(),
                    },
                },
                PageConfig {
                    url: "https://www.secretariat.ne.jp/jsmd/info/info-index.html".to_string(),
                    strategy: Extractor::TimeTable {
                        link_selector: "td a".to_string(),
                    },
                },
            ],
        },
        SiteConfig {
            key: "jrs".to_string(),
            org_name: "日本呼吸器学会".to_string(),
            base_url: "https://www.jrs.or.jp/".to_string(),
            feed_link: "https://www.jrs.or.jp/information/other/".to_string(),
            output: PathBuf::from("Feed9.xml"),
            fallback_link: Some("https://www.jrs.or.jp/information/other/".to_string()),
            max_rows: Some(10),
            pages: vec![PageConfig {
                url: "https://www.jrs.or.jp/information/other/".to_string(),
                strategy: Extractor::PostDateBox,
            }],
        },
    ]
}

fn site_url(key: &str, field: &str, value: &str) -> Result<Url, ConfigError> {
    validate_site_url(value)
        .map_err(|e| ConfigError::Invalid(format!("site '{key}': {field} '{value}': {e}")))
}

impl SiteConfig {
    /// Validate URLs and selectors, producing a runnable [`Site`].
    pub fn resolve(&self, output_dir: &Path) -> Result<Site, ConfigError> {
        let key = self.key.trim();
        if key.is_empty() {
            return Err(ConfigError::Invalid("site with empty key".to_string()));
        }
        if self.org_name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("site '{key}': empty org_name")));
        }
        if self.pages.is_empty() {
            return Err(ConfigError::Invalid(format!("site '{key}': no pages")));
        }
        if self.max_rows == Some(0) {
            return Err(ConfigError::Invalid(format!(
                "site '{key}': max_rows must be at least 1"
            )));
        }

        let base_url = site_url(key, "base_url", &self.base_url)?;
        let feed_link = site_url(key, "feed_link", &self.feed_link)?;
        let link_policy = match &self.fallback_link {
            Some(link) => LinkPolicy::Fallback(site_url(key, "fallback_link", link)?),
            None => LinkPolicy::Required,
        };

        let mut pages = Vec::with_capacity(self.pages.len());
        for page in &self.pages {
            if let Extractor::TimeTable { link_selector } = &page.strategy {
                validate_selector(link_selector).map_err(|e| {
                    ConfigError::Invalid(format!("site '{key}': {e}"))
                })?;
            }
            pages.push(SitePage {
                url: site_url(key, "page url", &page.url)?,
                extractor: page.strategy.clone(),
            });
        }

        Ok(Site {
            key: key.to_string(),
            org_name: self.org_name.trim().to_string(),
            feed_link,
            output: output_dir.join(&self.output),
            rules: SiteRules {
                base_url,
                link_policy,
                max_rows: self.max_rows,
            },
            pages,
        })
    }
}

/// Overlay `overrides` on `base`: same key replaces in place, new keys append.
fn merge_sites(base: Vec<SiteConfig>, overrides: Vec<SiteConfig>) -> Vec<SiteConfig> {
    let mut merged = base;
    for site in overrides {
        match merged.iter_mut().find(|s| s.key.trim() == site.key.trim()) {
            Some(existing) => *existing = site,
            None => merged.push(site),
        }
    }
    merged
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 5] = [
        "output_dir",
        "timeout_secs",
        "max_page_bytes",
        "user_agent",
        "sites",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Invalid site definitions → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            sites = config.sites.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let raw = content.parse::<toml::Table>()?;
        for key in raw.keys() {
            if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            }
        }

        let mut config: Config = toml::from_str(content)?;

        if raw.contains_key("sites") {
            let declared = std::mem::take(&mut config.sites);
            for (i, site) in declared.iter().enumerate() {
                let key = site.key.trim();
                if declared[..i].iter().any(|s| s.key.trim() == key) {
                    return Err(ConfigError::Invalid(format!("duplicate site key '{key}'")));
                }
            }
            config.sites = merge_sites(builtin_sites(), declared);
        }

        if config.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        config.resolve_sites()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Every configured site, validated, in registry order.
    pub fn resolve_sites(&self) -> Result<Vec<Site>, ConfigError> {
        self.sites
            .iter()
            .map(|site| site.resolve(&self.output_dir))
            .collect()
    }

    /// The sites named in `keys`, in the order given. Empty `keys` selects all.
    pub fn select_sites(&self, keys: &[String]) -> Result<Vec<Site>, ConfigError> {
        let sites = self.resolve_sites()?;
        if keys.is_empty() {
            return Ok(sites);
        }
        keys.iter()
            .map(|key| {
                sites
                    .iter()
                    .find(|s| &s.key == key)
                    .cloned()
                    .ok_or_else(|| ConfigError::Invalid(format!("unknown site '{key}'")))
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(name: &str, content: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir().join(format!("gakkai_feed_config_test_{name}"));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_dir, PathBuf::from("rss_output"));
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_page_bytes, 10 * 1024 * 1024);
        assert!(config.user_agent.starts_with("gakkai-feed/"));
        let keys: Vec<_> = config.sites.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["jsn", "jsmd", "jrs"]);
    }

    #[test]
    fn test_builtin_sites_resolve() {
        let sites = Config::default().resolve_sites().unwrap();
        assert_eq!(sites.len(), 3);

        let jsn = &sites[0];
        assert_eq!(jsn.org_name, "日本腎臓学会");
        assert_eq!(jsn.output, PathBuf::from("rss_output/Feed15.xml"));
        assert_eq!(
            jsn.rules.link_policy,
            LinkPolicy::Fallback(Url::parse("https://jsn.or.jp/medic/").unwrap())
        );

        let jsmd = &sites[1];
        assert_eq!(jsmd.pages.len(), 2);
        assert_eq!(jsmd.feed_link.as_str(), "https://www.secretariat.ne.jp/jsmd/");

        let jrs = &sites[2];
        assert_eq!(jrs.rules.max_rows, Some(10));
        assert!(matches!(jrs.rules.link_policy, LinkPolicy::Fallback(_)));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/gakkai_feed_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.sites.len(), 3);
    }

    #[test]
    fn test_empty_file_returns_default() {
        let (dir, path) = temp_config("empty", "   \n  \n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout_secs, 30);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_keeps_builtin_sites() {
        let (dir, path) = temp_config("partial", "output_dir = \"/srv/feeds\"\ntimeout_secs = 10\n");
        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.sites.len(), 3);

        let sites = config.resolve_sites().unwrap();
        assert_eq!(sites[2].output, PathBuf::from("/srv/feeds/Feed9.xml"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_site_override_and_append() {
        let content = r#"
[[sites]]
key = "jsn"
org_name = "日本腎臓学会"
base_url = "https://jsn.or.jp/medic/"
feed_link = "https://jsn.or.jp/medic/"
output = "kidney.xml"
[[sites.pages]]
url = "https://jsn.or.jp/medic/news/index.php?page=2"
strategy = { kind = "dotted-date-list" }

[[sites]]
key = "new"
org_name = "新学会"
base_url = "https://new.example.org/"
feed_link = "https://new.example.org/news/"
output = "new.xml"
max_rows = 5
[[sites.pages]]
url = "https://new.example.org/news/"
strategy = { kind = "time-table", link_selector = "td a" }
"#;
        let config = Config::from_toml(content).unwrap();
        let keys: Vec<_> = config.sites.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["jsn", "jsmd", "jrs", "new"]);
        assert_eq!(config.sites[0].output, PathBuf::from("kidney.xml"));
        assert_eq!(config.sites[3].max_rows, Some(5));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let site = r#"
[[sites]]
key = "dup"
org_name = "学会"
base_url = "https://a.example.org/"
feed_link = "https://a.example.org/"
output = "a.xml"
[[sites.pages]]
url = "https://a.example.org/"
strategy = { kind = "post-date-box" }
"#;
        let content = format!("{site}{site}");
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("duplicate site key 'dup'"));
    }

    #[test]
    fn test_site_without_pages_rejected() {
        let content = r#"
[[sites]]
key = "empty"
org_name = "学会"
base_url = "https://a.example.org/"
feed_link = "https://a.example.org/"
output = "a.xml"
pages = []
"#;
        let err = Config::from_toml(content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("no pages")));
    }

    #[test]
    fn test_non_http_url_rejected() {
        let content = r#"
[[sites]]
key = "ftp"
org_name = "学会"
base_url = "ftp://a.example.org/"
feed_link = "https://a.example.org/"
output = "a.xml"
[[sites.pages]]
url = "https://a.example.org/"
strategy = { kind = "post-date-box" }
"#;
        let err = Config::from_toml(content).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref m) if m.contains("base_url")));
    }

    #[test]
    fn test_bad_selector_rejected() {
        let content = r#"
[[sites]]
key = "sel"
org_name = "学会"
base_url = "https://a.example.org/"
feed_link = "https://a.example.org/"
output = "a.xml"
[[sites.pages]]
url = "https://a.example.org/"
strategy = { kind = "time-table", link_selector = "td a[" }
"#;
        assert!(matches!(
            Config::from_toml(content),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_strategy_is_parse_error() {
        let content = r#"
[[sites]]
key = "x"
org_name = "学会"
base_url = "https://a.example.org/"
feed_link = "https://a.example.org/"
output = "a.xml"
[[sites.pages]]
url = "https://a.example.org/"
strategy = { kind = "magic" }
"#;
        assert!(matches!(
            Config::from_toml(content),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert!(matches!(
            Config::from_toml("timeout_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_zero_max_rows_rejected() {
        let mut site = builtin_sites().remove(0);
        site.max_rows = Some(0);
        assert!(site.resolve(Path::new("out")).is_err());
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let (dir, path) = temp_config("invalid", "this is not [valid toml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("timeout_secs = 5\ntotally_fake_key = 1\n").unwrap();
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("timeout_secs = \"soon\"\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let (dir, path) = temp_config("too_large", &"#".repeat(1_048_577));
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_builtin_jsn_keeps_row_without_href() {
        use crate::page::Page;

        let site = Config::default()
            .select_sites(&["jsn".to_string()])
            .unwrap()
            .remove(0);
        let markup = r#"<section class="subpage__contentsData">
            <dl class="contentsData__list"><dt class="date">2025.04.01</dt>
            <dd class="title"><a>リンクなしのお知らせ</a></dd></dl></section>"#;
        let page = Page::parse(site.pages[0].url.clone(), markup);

        let out = site.pages[0].extractor.extract(&page, &site.rules);
        assert!(out.failures.is_empty());
        assert_eq!(out.items.len(), 1);
        assert_eq!(out.items[0].title, "リンクなしのお知らせ");
        assert_eq!(out.items[0].link.as_str(), "https://jsn.or.jp/medic/");
    }

    #[test]
    fn test_builtin_jsmd_falls_back_to_site_root() {
        let jsmd = Config::default()
            .select_sites(&["jsmd".to_string()])
            .unwrap()
            .remove(0);
        assert_eq!(
            jsmd.rules.link_policy,
            LinkPolicy::Fallback(Url::parse("https://www.secretariat.ne.jp/jsmd/").unwrap())
        );
    }

    #[test]
    fn test_padded_key_overrides_builtin() {
        let content = r#"
[[sites]]
key = " jsn "
org_name = "日本腎臓学会"
base_url = "https://jsn.or.jp/medic/"
feed_link = "https://jsn.or.jp/medic/"
output = "kidney.xml"
[[sites.pages]]
url = "https://jsn.or.jp/medic/news/index.php"
strategy = { kind = "dotted-date-list" }
"#;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(config.sites.len(), 3);

        let sites = config.resolve_sites().unwrap();
        let keys: Vec<_> = sites.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["jsn", "jsmd", "jrs"]);
        assert_eq!(sites[0].output, PathBuf::from("rss_output/kidney.xml"));
    }

    #[test]
    fn test_duplicate_keys_rejected_after_trim() {
        let site = |key: &str| {
            format!(
                r#"
[[sites]]
key = "{key}"
org_name = "学会"
base_url = "https://a.example.org/"
feed_link = "https://a.example.org/"
output = "a.xml"
[[sites.pages]]
url = "https://a.example.org/"
strategy = {{ kind = "post-date-box" }}
"#
            )
        };
        let content = format!("{}{}", site("dup"), site("dup "));
        let err = Config::from_toml(&content).unwrap_err();
        assert!(err.to_string().contains("duplicate site key 'dup'"));
    }

    #[test]
    fn test_select_sites_by_key() {
        let config = Config::default();
        let picked = config
            .select_sites(&["jrs".to_string(), "jsn".to_string()])
            .unwrap();
        let keys: Vec<_> = picked.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["jrs", "jsn"]);

        assert_eq!(config.select_sites(&[]).unwrap().len(), 3);
        assert!(matches!(
            config.select_sites(&["nope".to_string()]),
            Err(ConfigError::Invalid(ref m)) if m.contains("unknown site 'nope'")
        ));
    }
}
