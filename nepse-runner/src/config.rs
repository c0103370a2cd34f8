//! Pipeline configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file is a complete configuration
//! pointing at the public NEPSE data sources:
//! - trading snapshot: scraped from the live trading page, cached locally
//! - dividends: the sorted proposed-dividends CSV
//! - fundamentals: local `eps.csv` first, then the published copy
//! - company detail pages: scraped to produce `eps.csv`

use std::path::{Path, PathBuf};

use nepse_core::{FreshnessPolicy, MarketCalendar, OutputSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_LIVE_TRADING_URL: &str = "https://www.sharesansar.com/live-trading";
pub const DEFAULT_DATA_BASE_URL: &str = "https://raw.githubusercontent.com/Sulav2060/nepse/main";
pub const DEFAULT_COMPANY_URL: &str = "https://merolagani.com/CompanyDetail.aspx?symbol={symbol}";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration for a merge run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub schema: OutputSchema,
    /// Never touch the network: HTTP locations are skipped.
    pub offline: bool,
    pub trading: TradingConfig,
    pub dividends: Vec<Location>,
    pub fundamentals: Vec<Location>,
    pub calendar: MarketCalendar,
    pub freshness: FreshnessPolicy,
    pub http: HttpConfig,
    pub trigger: TriggerConfig,
    pub company_pages: CompanyPagesConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: OutputSchema::default(),
            offline: false,
            trading: TradingConfig::default(),
            dividends: vec![Location::Http {
                url: format!("{DEFAULT_DATA_BASE_URL}/proposed_dividends_sorted.csv"),
            }],
            fundamentals: vec![
                Location::File {
                    path: PathBuf::from("eps.csv"),
                },
                Location::Http {
                    url: format!("{DEFAULT_DATA_BASE_URL}/eps.csv"),
                },
            ],
            calendar: MarketCalendar::default(),
            freshness: FreshnessPolicy::default(),
            http: HttpConfig::default(),
            trigger: TriggerConfig::default(),
            company_pages: CompanyPagesConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load `path` if given, otherwise the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None => Ok(Self::default()),
        }
    }
}

/// Where a text document can be read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    File { path: PathBuf },
    Http { url: String },
}

impl Location {
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Http { .. })
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Location::File { path } => write!(f, "{}", path.display()),
            Location::Http { url } => f.write_str(url),
        }
    }
}

/// How the trading snapshot is obtained and cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    pub cache_path: PathBuf,
    pub source: TradingSource,
    /// Serve an expired cache entry when the fresh fetch fails.
    pub serve_stale_on_error: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from("live-trading-cache.json"),
            source: TradingSource::default(),
            serve_stale_on_error: true,
        }
    }
}

/// Origin of a fresh trading snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TradingSource {
    /// Scrape the live trading HTML page.
    Scrape { url: String },
    /// Read a published `{ timestamp, data }` envelope.
    Envelope { locations: Vec<Location> },
}

impl Default for TradingSource {
    fn default() -> Self {
        TradingSource::Scrape {
            url: DEFAULT_LIVE_TRADING_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// GitHub Actions workflow dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub git_ref: String,
    /// Environment variable holding the API token.
    pub token_env: String,
    pub cooldown_hours: i64,
    pub default_workflow: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            owner: "Sulav2060".to_string(),
            repo: "nepse".to_string(),
            git_ref: "main".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            cooldown_hours: 24,
            default_workflow: "update_ltp.yml".to_string(),
        }
    }
}

/// Company detail pages read by the fundamentals scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyPagesConfig {
    /// Page URL; `{symbol}` is replaced by the trading symbol.
    pub url_template: String,
    /// Concurrent page fetches.
    pub workers: usize,
    pub timeout_secs: u64,
    /// Pause before each page request, per worker.
    pub request_delay_ms: u64,
}

impl Default for CompanyPagesConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_COMPANY_URL.to_string(),
            workers: 5,
            timeout_secs: 15,
            request_delay_ms: 250,
        }
    }
}

impl CompanyPagesConfig {
    pub fn page_url(&self, symbol: &str) -> String {
        self.url_template.replace("{symbol}", symbol)
    }
}
