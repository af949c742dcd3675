//! Configuration constants and runtime settings for the harvester.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HarvesterError, Result};

/// JSON-RPC endpoint of the banki.ru API.
pub const API_URL: &str = "http://www.banki.ru/api/";

/// Yandex reverse geocoder endpoint.
pub const GEOCODER_URL: &str = "https://geocode-maps.yandex.ru/1.x/";

/// HTTP timeout in seconds.
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Records requested per list page.
pub const PAGE_SIZE: usize = 25;

/// Total attempts per logical RPC call before degrading to an empty result.
pub const RETRY_ATTEMPTS: u32 = 5;

/// Fixed delay between RPC attempts, in seconds.
pub const RETRY_DELAY_SECS: u64 = 5;

/// Map zoom used when a town record carries none.
pub const DEFAULT_ZOOM: i64 = 12;

/// First identifier tried when synthesizing a region id.
pub const REGION_ID_FLOOR: i64 = 1;

/// Region id meaning "explicitly unassigned".
pub const UNASSIGNED_REGION_ID: i64 = 0;

/// Transliterated name of the catch-all "Другие" (others) region.
pub const OTHERS_REGION_NAME_TR: &str = "Drugie";

/// JSON-RPC protocol version sent with every call.
pub const JSONRPC_VERSION: &str = "2.0";

/// RPC method: paginated list of points by filter.
pub const METHOD_LIST_OBJECTS: &str = "bankGeo/getObjectsByFilter";

/// RPC method: full point records by identifier list.
pub const METHOD_OBJECTS_DATA: &str = "bank/getBankObjectsData";

/// RPC method: single region details by identifier.
pub const METHOD_REGION: &str = "bankGeo/getRegion";

/// RPC method: full bank list.
pub const METHOD_BANK_LIST: &str = "bankInfo/getBankList";

/// Headers the API expects from its own map page.
pub const API_HEADERS: &[(&str, &str)] = &[
    ("Accept", "application/json, text/javascript, */*; q=0.01"),
    ("Origin", "http://www.banki.ru"),
    ("X-Requested-With", "XMLHttpRequest"),
    (
        "Content-Type",
        "application/x-www-form-urlencoded; charset=UTF-8",
    ),
    ("Referer", "http://www.banki.ru/banks/map/Moskva/"),
    ("Accept-Language", "ru-RU,ru;q=0.8,en-US;q=0.6,en;q=0.4"),
];

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_ATTEMPTS,
            delay: Duration::from_secs(RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    /// Same attempt count, no sleeping. Used by tests.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HarvesterConfig {
    pub api_url: String,
    pub geocoder_url: String,
    pub geocoder_api_key: Option<String>,
    pub page_size: usize,
    pub retry: RetryPolicy,
    pub http_timeout: Duration,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            api_url: API_URL.to_string(),
            geocoder_url: GEOCODER_URL.to_string(),
            geocoder_api_key: None,
            page_size: PAGE_SIZE,
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }
}

/// On-disk shape of the YAML config. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_url: Option<String>,
    geocoder_url: Option<String>,
    geocoder_api_key: Option<String>,
    page_size: Option<usize>,
    retry_attempts: Option<u32>,
    retry_delay_secs: Option<u64>,
    http_timeout_secs: Option<u64>,
}

impl HarvesterConfig {
    /// Parse a YAML document on top of the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml_ng::from_str(yaml)?;
        let mut config = Self::default();
        if let Some(v) = file.api_url {
            config.api_url = v;
        }
        if let Some(v) = file.geocoder_url {
            config.geocoder_url = v;
        }
        if file.geocoder_api_key.is_some() {
            config.geocoder_api_key = file.geocoder_api_key;
        }
        if let Some(v) = file.page_size {
            config.page_size = v;
        }
        if let Some(v) = file.retry_attempts {
            config.retry.max_attempts = v;
        }
        if let Some(v) = file.retry_delay_secs {
            config.retry.delay = Duration::from_secs(v);
        }
        if let Some(v) = file.http_timeout_secs {
            config.http_timeout = Duration::from_secs(v);
        }
        Ok(config)
    }

    /// Load configuration: defaults, then the optional YAML file, then
    /// `CASHPOINTS_*` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                if !p.is_file() {
                    return Err(HarvesterError::InputNotFound(p.to_path_buf()));
                }
                Self::from_yaml_str(&std::fs::read_to_string(p)?)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("CASHPOINTS_API_URL") {
            self.api_url = v;
        }
        if let Some(v) = lookup("CASHPOINTS_GEOCODER_URL") {
            self.geocoder_url = v;
        }
        if let Some(v) = lookup("CASHPOINTS_GEOCODER_KEY") {
            self.geocoder_api_key = Some(v);
        }
        if let Some(v) = lookup("CASHPOINTS_RETRY_ATTEMPTS") {
            self.retry.max_attempts = v.parse().map_err(|_| {
                HarvesterError::Config(format!("CASHPOINTS_RETRY_ATTEMPTS is not a number: {v}"))
            })?;
        }
        if let Some(v) = lookup("CASHPOINTS_RETRY_DELAY_SECS") {
            let secs: u64 = v.parse().map_err(|_| {
                HarvesterError::Config(format!("CASHPOINTS_RETRY_DELAY_SECS is not a number: {v}"))
            })?;
            self.retry.delay = Duration::from_secs(secs);
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(HarvesterError::Config("page_size must be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(HarvesterError::Config(
                "retry_attempts must be positive".into(),
            ));
        }
        Ok(())
    }
}
