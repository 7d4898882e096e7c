use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::time::Duration;
use validator::Validate;

use crate::thresholds::ThresholdSet;

mod duration;

pub use duration::parse_duration;

pub const DEFAULT_VUS: u32 = 10;
pub const DEFAULT_DURATION: &str = "30s";
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct HttpConfig {
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct LogConfig {
    #[validate(length(min = 1))]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Settings shared by every virtual user for the whole run.
#[derive(Debug, Deserialize, Serialize, Clone, Validate)]
pub struct LoadConfig {
    #[validate(range(min = 1))]
    pub vus: u32,
    #[validate(length(min = 1))]
    pub duration: String,
    #[validate(length(min = 1))]
    pub base_url: String,
    #[serde(default = "default_thresholds")]
    pub thresholds: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    #[validate(nested)]
    pub http: HttpConfig,
    #[validate(nested)]
    pub log: LogConfig,
}

pub fn default_thresholds() -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([
        ("http_req_duration".to_string(), vec!["p(95)<800".to_string()]),
        ("http_req_failed".to_string(), vec!["rate<0.01".to_string()]),
        ("http_response_time".to_string(), vec!["p(95)<800".to_string()]),
    ])
}

pub fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([("Content-Type".to_string(), "application/json".to_string())])
}

fn parse_vus(value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|e| {
        ConfigError::Message(format!(
            "Invalid vus value '{}': {}. vus must be a positive integer.",
            value, e
        ))
    })
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            vus: DEFAULT_VUS,
            duration: DEFAULT_DURATION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            thresholds: default_thresholds(),
            headers: default_headers(),
            http: HttpConfig {
                timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            },
            log: LogConfig {
                level: "info".to_string(),
                format: default_log_format(),
            },
        }
    }
}

impl LoadConfig {
    /// Loads defaults, `.env` and `LOADTEST_*` variables, then validates them.
    pub fn new() -> Result<Self, ConfigError> {
        Self::load()?.validated()
    }

    /// Same layering as [`LoadConfig::new`] without validation, so callers
    /// can apply overrides first.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .set_default("vus", i64::from(DEFAULT_VUS))?
            .set_default("duration", DEFAULT_DURATION)?
            .set_default("base_url", DEFAULT_BASE_URL)?
            .set_default("http.timeout_secs", DEFAULT_HTTP_TIMEOUT_SECS)?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .add_source(
                config::Environment::with_prefix("LOADTEST")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option(
                "vus",
                env::var("LOADTEST_VUS")
                    .ok()
                    .map(|v| parse_vus(&v))
                    .transpose()?,
            )?
            .set_override_option("duration", env::var("LOADTEST_DURATION").ok())?
            .set_override_option("base_url", env::var("LOADTEST_BASE_URL").ok())?
            .build()?;

        s.try_deserialize()
    }

    /// Runs every load-time check. Consumes and returns the config so
    /// callers can chain it after overrides.
    pub fn validated(self) -> Result<Self, ConfigError> {
        if let Err(e) = self.validate() {
            return Err(ConfigError::Message(format!("Validation error: {}", e)));
        }

        let run_for = self.run_duration()?;
        if run_for.is_zero() {
            return Err(ConfigError::Message("duration must be greater than zero".into()));
        }

        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Message(format!("Invalid base_url '{}': {}", self.base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Message(format!(
                "base_url '{}' must use http or https",
                self.base_url
            )));
        }

        self.threshold_set()?;

        Ok(self)
    }

    /// Applies command-line values on top of the loaded layers, then
    /// validates. `None` keeps whatever the environment or defaults set.
    pub fn with_overrides(
        mut self,
        vus: Option<u32>,
        duration: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(vus) = vus {
            self.vus = vus;
        }
        if let Some(duration) = duration {
            self.duration = duration;
        }
        if let Some(base_url) = base_url {
            self.base_url = base_url;
        }
        self.validated()
    }

    pub fn run_duration(&self) -> Result<Duration, ConfigError> {
        parse_duration(&self.duration).map_err(ConfigError::Message)
    }

    pub fn threshold_set(&self) -> Result<ThresholdSet, ConfigError> {
        ThresholdSet::from_config(&self.thresholds)
            .map_err(|e| ConfigError::Message(format!("Invalid threshold: {e}")))
    }

    /// Joins `path` onto the base URL without doubling or dropping slashes.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
