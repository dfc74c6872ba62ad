pub mod seeds;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Target site and transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_search_api_url")]
    pub search_api_url: String,

    /// `{id}` is replaced with the job id.
    #[serde(default = "default_detail_api_url")]
    pub detail_api_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default = "default_detail_link_markers")]
    pub detail_link_markers: Vec<String>,
}

/// What to search for and how much of it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub keyword: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    /// "2-5" style range; explicit bounds below win.
    #[serde(default)]
    pub experience: Option<String>,

    #[serde(default)]
    pub experience_min: Option<u32>,

    #[serde(default)]
    pub experience_max: Option<u32>,

    #[serde(default)]
    pub function_area: Option<String>,

    /// Unset means unbounded.
    #[serde(default)]
    pub results_wanted: Option<usize>,

    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default = "default_true")]
    pub collect_details: bool,

    #[serde(default)]
    pub start_urls: Vec<String>,
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_page_size")]
    pub default_page_size: usize,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_base_url() -> String {
    "https://www.timesjobs.com".to_string()
}
fn default_search_api_url() -> String {
    "https://www.timesjobs.com/candidate/api/job-search".to_string()
}
fn default_detail_api_url() -> String {
    "https://www.timesjobs.com/candidate/api/job-detail/{id}".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36"
        .to_string()
}
fn default_detail_link_markers() -> Vec<String> {
    vec!["job-detail".to_string(), "jobdetail".to_string()]
}
fn default_max_pages() -> u32 {
    10
}
fn default_true() -> bool {
    true
}
fn default_concurrency() -> usize {
    5
}
fn default_page_size() -> usize {
    20
}
fn default_max_page_size() -> usize {
    50
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/jobs.duckdb")
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            search_api_url: default_search_api_url(),
            detail_api_url: default_detail_api_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            proxy_url: None,
            detail_link_markers: default_detail_link_markers(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            keyword: None,
            location: None,
            experience: None,
            experience_min: None,
            experience_max: None,
            function_area: None,
            results_wanted: None,
            max_pages: default_max_pages(),
            collect_details: true,
            start_urls: Vec::new(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            run_migrations: true,
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("JOBS")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("search.start_urls")
                    .with_list_parse_key("scraper.detail_link_markers"),
            )
            .build()
            .context("Failed to read configuration")?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_yields_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.pipeline.concurrency, 5);
        assert_eq!(cfg.search.max_pages, 10);
        assert!(cfg.search.collect_details);
        assert!(cfg.search.results_wanted.is_none());
        assert!(cfg.scraper.proxy_url.is_none());
    }

    #[test]
    fn test_toml_overrides() {
        let toml = r#"
            [search]
            keyword = "rust"
            results_wanted = 25
            start_urls = ["https://www.timesjobs.com/candidate/job-search.html?txtKeywords=go"]

            [scraper]
            proxy_url = "http://proxy.local:8000"
        "#;
        let cfg: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.search.keyword.as_deref(), Some("rust"));
        assert_eq!(cfg.search.results_wanted, Some(25));
        assert_eq!(cfg.search.start_urls.len(), 1);
        assert_eq!(cfg.scraper.proxy_url.as_deref(), Some("http://proxy.local:8000"));
        assert_eq!(cfg.storage.db_path, PathBuf::from("data/jobs.duckdb"));
    }
}
