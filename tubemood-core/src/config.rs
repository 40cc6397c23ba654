use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_REGION: &str = "CA";
pub const DEFAULT_MAX_COMMENTS: u32 = 200;
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;
pub const DEFAULT_TRENDING_COUNT: u32 = 10;
pub const MAX_TRENDING_COUNT: u32 = 50;
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 60;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 4;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

const API_KEY_VAR: &str = "YOUTUBE_API_KEY";
const CONFIG_PATH_VAR: &str = "TUBEMOOD_CONFIG";

/// Runtime settings for one process. The API key is the only required value.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub region: String,
    pub max_comments: u32,
    pub cache_ttl_seconds: u64,
    pub trending_count: u32,
    pub max_concurrency: usize,
    pub request_timeout_seconds: u64,
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub api_base_url: Option<String>,
}

/// Optional TOML file layer; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub youtube_api_key: Option<String>,
    pub region: Option<String>,
    pub max_comments: Option<u32>,
    pub cache_ttl_seconds: Option<u64>,
    pub trending_count: Option<u32>,
    pub max_concurrency: Option<usize>,
    pub request_timeout_seconds: Option<u64>,
    pub retry_max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub api_base_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        Ok(toml::from_str(&raw)?)
    }
}

impl AppConfig {
    /// Load `.env`, an optional TOML file named by `TUBEMOOD_CONFIG`, then the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        if dotenvy::dotenv().is_ok() {
            debug!("Loaded variables from .env");
        }

        let file = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Some(FileConfig::load(path.trim())?),
            _ => None,
        };

        Self::from_sources(|name| std::env::var(name).ok(), file)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_sources(lookup, None)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file: FileConfig = toml::from_str(raw)?;
        Self::from_sources(|_| None, Some(file))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_sources(|_| None, Some(FileConfig::load(path)?))
    }

    /// Environment values win over file values, which win over defaults.
    pub fn from_sources<F>(lookup: F, file: Option<FileConfig>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let env = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = env(API_KEY_VAR)
            .or(file.youtube_api_key)
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvironmentVariable {
                var_name: API_KEY_VAR.to_string(),
            })?;

        let region = sanitize_region(
            env("REGION")
                .or(file.region)
                .as_deref()
                .unwrap_or(DEFAULT_REGION),
        );

        let ttl_raw = env("CACHE_TTL").or_else(|| env("CACHE_TTL_SECONDS"));

        let trending_count = positive(
            "TRENDING_COUNT",
            env("TRENDING_COUNT"),
            file.trending_count,
            DEFAULT_TRENDING_COUNT,
        )
        .min(MAX_TRENDING_COUNT);

        Ok(Self {
            api_key,
            region,
            max_comments: positive(
                "MAX_COMMENTS",
                env("MAX_COMMENTS"),
                file.max_comments,
                DEFAULT_MAX_COMMENTS,
            ),
            cache_ttl_seconds: positive(
                "CACHE_TTL",
                ttl_raw,
                file.cache_ttl_seconds,
                DEFAULT_CACHE_TTL_SECONDS,
            ),
            trending_count,
            max_concurrency: positive(
                "MAX_CONCURRENCY",
                env("MAX_CONCURRENCY"),
                file.max_concurrency,
                DEFAULT_MAX_CONCURRENCY,
            ),
            request_timeout_seconds: positive(
                "REQUEST_TIMEOUT_SECS",
                env("REQUEST_TIMEOUT_SECS"),
                file.request_timeout_seconds,
                DEFAULT_REQUEST_TIMEOUT_SECONDS,
            ),
            retry_max_attempts: positive(
                "RETRY_MAX_ATTEMPTS",
                env("RETRY_MAX_ATTEMPTS"),
                file.retry_max_attempts,
                DEFAULT_RETRY_MAX_ATTEMPTS,
            ),
            retry_base_delay_ms: positive(
                "RETRY_BASE_DELAY_MS",
                env("RETRY_BASE_DELAY_MS"),
                file.retry_base_delay_ms,
                DEFAULT_RETRY_BASE_DELAY_MS,
            ),
            api_base_url: env("YOUTUBE_API_BASE_URL").or(file.api_base_url),
        })
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &"<redacted>")
            .field("region", &self.region)
            .field("max_comments", &self.max_comments)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("trending_count", &self.trending_count)
            .field("max_concurrency", &self.max_concurrency)
            .field("request_timeout_seconds", &self.request_timeout_seconds)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_base_delay_ms", &self.retry_base_delay_ms)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

/// Uppercase ISO-3166-1 alpha-2 code built from the first two letters of `raw`.
pub fn sanitize_region(raw: &str) -> String {
    let letters: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(2)
        .collect::<String>()
        .to_ascii_uppercase();

    if letters.len() == 2 {
        letters
    } else {
        DEFAULT_REGION.to_string()
    }
}

fn positive<T>(field: &str, raw: Option<String>, file_value: Option<T>, default: T) -> T
where
    T: FromStr + PartialOrd + Default + Copy,
{
    if let Some(raw) = raw {
        match raw.trim().parse::<T>() {
            Ok(value) if value > T::default() => return value,
            _ => warn!("Ignoring invalid value {:?} for {}", raw, field),
        }
    }

    match file_value {
        Some(value) if value > T::default() => value,
        Some(_) => {
            warn!("Ignoring non-positive file value for {}", field);
            default
        }
        None => default,
    }
}
