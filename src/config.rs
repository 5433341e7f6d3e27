// ABOUTME: Tap configuration - credentials, start date, page size and API location
// ABOUTME: Loaded from a JSON or TOML file and validated before any request is made

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::api::models::parse_timestamp;
use crate::api::DEFAULT_API_URL;
use crate::replication::DriverConfig;

pub const DEFAULT_START_DATE: &str = "2010-01-01T00:00:00Z";
pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn default_start_date() -> String {
    DEFAULT_START_DATE.to_string()
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Clone, Deserialize)]
pub struct TapConfig {
    /// The token to authenticate against the API service
    #[serde(default)]
    pub secret_token: String,
    /// The earliest record date to sync
    #[serde(default = "default_start_date")]
    pub start_date: String,
    /// The page size for each responses endpoint call
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl fmt::Debug for TapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapConfig")
            .field("secret_token", &"***")
            .field("start_date", &self.start_date)
            .field("page_size", &self.page_size)
            .field("api_url", &self.api_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl TapConfig {
    /// Parse configuration text; `.toml` files use TOML, everything else JSON.
    pub fn parse(contents: &str, path: &Path) -> Result<Self> {
        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let config: TapConfig = if is_toml {
            toml::from_str(contents)
                .with_context(|| format!("Failed to parse TOML config {}", path.display()))?
        } else {
            serde_json::from_str(contents)
                .with_context(|| format!("Failed to parse JSON config {}", path.display()))?
        };
        Ok(config)
    }

    /// Load configuration from disk. A token passed on the command line or in
    /// the environment overrides the file.
    pub fn load(path: &Path, secret_token: Option<String>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config = Self::parse(&contents, path)?;
        if let Some(token) = secret_token {
            config.secret_token = token;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret_token.trim().is_empty() {
            anyhow::bail!(
                "secret_token is required. Set it in the config file, pass --secret-token, \
                 or export FAIRING_SECRET_TOKEN"
            );
        }
        if self.page_size == 0 {
            anyhow::bail!("page_size must be a positive integer");
        }
        if self.page_size > 100 {
            tracing::warn!(
                "page_size {} is larger than the 100-record search probe; \
                 the first page after a cold start will hold at most 100 records",
                self.page_size
            );
        }
        self.start_date()?;
        url::Url::parse(&self.api_url)
            .with_context(|| format!("api_url is not a valid URL: {}", self.api_url))?;
        Ok(())
    }

    pub fn start_date(&self) -> Result<DateTime<Utc>> {
        parse_timestamp("start_date", &self.start_date).with_context(|| {
            format!("start_date is not an ISO 8601 timestamp: {}", self.start_date)
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn driver_config(&self) -> Result<DriverConfig> {
        Ok(DriverConfig {
            start_date: self.start_date()?,
            page_size: self.page_size,
        })
    }
}
