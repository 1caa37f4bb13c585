//! Runtime configuration.
//!
//! Everything is read from environment variables with development defaults,
//! so a bare `pagesift <url>` works once the backend key is exported.

use crate::chunker::DEFAULT_CHUNK_SIZE;
use crate::llm::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE, RetryPolicy};
use crate::patterns::PatternSet;
use std::env;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable names.
pub const ENV_TOGETHER_API_KEY: &str = "TOGETHER_API_KEY";
pub const ENV_TOGETHER_BASE_URL: &str = "TOGETHER_BASE_URL";
pub const ENV_EXTRACTION_MODEL: &str = "EXTRACTION_MODEL";
pub const ENV_EXTRACTION_MAX_TOKENS: &str = "EXTRACTION_MAX_TOKENS";
pub const ENV_EXTRACTION_TEMPERATURE: &str = "EXTRACTION_TEMPERATURE";
pub const ENV_EXTRACTION_TIMEOUT_SECS: &str = "EXTRACTION_TIMEOUT_SECS";
pub const ENV_EXTRACTION_MAX_ATTEMPTS: &str = "EXTRACTION_MAX_ATTEMPTS";
pub const ENV_EXTRACTION_BASE_BACKOFF_MS: &str = "EXTRACTION_BASE_BACKOFF_MS";
pub const ENV_CHUNK_SIZE: &str = "CHUNK_SIZE";
pub const ENV_CRAWL_PAGE_DELAY_MS: &str = "CRAWL_PAGE_DELAY_MS";
pub const ENV_CRAWL_REQUEST_DELAY_MS: &str = "CRAWL_REQUEST_DELAY_MS";
pub const ENV_CRAWL_MAX_PAGES: &str = "CRAWL_MAX_PAGES";
pub const ENV_CRAWL_CONCURRENCY: &str = "CRAWL_CONCURRENCY";
pub const ENV_CRAWL_FETCH_ATTEMPTS: &str = "CRAWL_FETCH_ATTEMPTS";
pub const ENV_CRAWL_PATTERNS: &str = "CRAWL_PATTERNS";

const DEFAULT_TOGETHER_BASE_URL: &str = crate::llm::together::DEFAULT_BASE_URL;
const DEFAULT_EXTRACTION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_EXTRACTION_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_EXTRACTION_BASE_BACKOFF_MS: u64 = 1000;
const DEFAULT_CRAWL_PAGE_DELAY_MS: u64 = 2000;
const DEFAULT_CRAWL_REQUEST_DELAY_MS: u64 = 2000;
const DEFAULT_CRAWL_MAX_PAGES: u32 = 100;
const DEFAULT_CRAWL_CONCURRENCY: usize = 1;
const DEFAULT_CRAWL_FETCH_ATTEMPTS: u32 = 3;

// Upper bound for every configured delay and timeout.
const MAX_DELAY_MS: u64 = 60 * 60 * 1000;
// Listing pages are never requested faster than this.
const MIN_PAGE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    together_api_key: Option<String>,
    together_base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    extraction_timeout: Duration,
    max_attempts: u32,
    base_backoff: Duration,
    chunk_size: usize,
    page_delay: Duration,
    request_delay: Duration,
    max_pages: u32,
    concurrency: usize,
    fetch_attempts: u32,
    patterns: Option<PatternSet>,
}

impl Config {
    /// Load from environment variables, falling back to development defaults.
    /// Values that are present but unparseable are errors, not defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let together_api_key = env::var(ENV_TOGETHER_API_KEY)
            .ok()
            .filter(|key| !key.trim().is_empty());
        let together_base_url = env::var(ENV_TOGETHER_BASE_URL)
            .unwrap_or_else(|_| DEFAULT_TOGETHER_BASE_URL.to_string());
        let model = env::var(ENV_EXTRACTION_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let temperature: f32 = parse_var(ENV_EXTRACTION_TEMPERATURE, DEFAULT_TEMPERATURE)?;
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                field: ENV_EXTRACTION_TEMPERATURE,
                reason: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        let max_attempts = parse_in_range(
            ENV_EXTRACTION_MAX_ATTEMPTS,
            DEFAULT_EXTRACTION_MAX_ATTEMPTS,
            1..=u32::MAX,
        )?;
        let fetch_attempts =
            parse_in_range(ENV_CRAWL_FETCH_ATTEMPTS, DEFAULT_CRAWL_FETCH_ATTEMPTS, 1..=u32::MAX)?;

        let patterns = match env::var(ENV_CRAWL_PATTERNS) {
            Ok(raw) if !raw.trim().is_empty() => {
                Some(PatternSet::from_json(&raw).map_err(|e| ConfigError::InvalidValue {
                    field: ENV_CRAWL_PATTERNS,
                    reason: e.to_string(),
                })?)
            }
            _ => None,
        };

        Ok(Self {
            together_api_key,
            together_base_url,
            model,
            max_tokens: parse_var(ENV_EXTRACTION_MAX_TOKENS, DEFAULT_MAX_TOKENS)?,
            temperature,
            extraction_timeout: Duration::from_secs(parse_in_range(
                ENV_EXTRACTION_TIMEOUT_SECS,
                DEFAULT_EXTRACTION_TIMEOUT_SECS,
                1..=MAX_DELAY_MS / 1000,
            )?),
            max_attempts,
            base_backoff: Duration::from_millis(parse_in_range(
                ENV_EXTRACTION_BASE_BACKOFF_MS,
                DEFAULT_EXTRACTION_BASE_BACKOFF_MS,
                0..=MAX_DELAY_MS,
            )?),
            chunk_size: parse_in_range(ENV_CHUNK_SIZE, DEFAULT_CHUNK_SIZE, 1..=usize::MAX)?,
            page_delay: Duration::from_millis(parse_in_range(
                ENV_CRAWL_PAGE_DELAY_MS,
                DEFAULT_CRAWL_PAGE_DELAY_MS,
                MIN_PAGE_DELAY_MS..=MAX_DELAY_MS,
            )?),
            request_delay: Duration::from_millis(parse_in_range(
                ENV_CRAWL_REQUEST_DELAY_MS,
                DEFAULT_CRAWL_REQUEST_DELAY_MS,
                0..=MAX_DELAY_MS,
            )?),
            max_pages: parse_var(ENV_CRAWL_MAX_PAGES, DEFAULT_CRAWL_MAX_PAGES)?,
            concurrency: parse_var(ENV_CRAWL_CONCURRENCY, DEFAULT_CRAWL_CONCURRENCY)?.max(1),
            fetch_attempts,
            patterns,
        })
    }

    /// Development defaults (mirrors `from_env` with no env overrides).
    pub fn default() -> Self {
        Self {
            together_api_key: None,
            together_base_url: DEFAULT_TOGETHER_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            extraction_timeout: Duration::from_secs(DEFAULT_EXTRACTION_TIMEOUT_SECS),
            max_attempts: DEFAULT_EXTRACTION_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(DEFAULT_EXTRACTION_BASE_BACKOFF_MS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            page_delay: Duration::from_millis(DEFAULT_CRAWL_PAGE_DELAY_MS),
            request_delay: Duration::from_millis(DEFAULT_CRAWL_REQUEST_DELAY_MS),
            max_pages: DEFAULT_CRAWL_MAX_PAGES,
            concurrency: DEFAULT_CRAWL_CONCURRENCY,
            fetch_attempts: DEFAULT_CRAWL_FETCH_ATTEMPTS,
            patterns: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.together_api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.together_base_url = url.into();
        self
    }

    pub fn with_delays(mut self, page_delay: Duration, request_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self.request_delay = request_delay;
        self
    }

    pub fn with_retry(mut self, max_attempts: u32, base_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_backoff = base_backoff;
        self
    }

    pub fn with_patterns(mut self, patterns: PatternSet) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// Bearer token for the completion backend.
    pub fn together_api_key(&self) -> Option<&str> {
        self.together_api_key.as_deref()
    }
    /// Base URL of the OpenAI-style completion API.
    pub fn together_base_url(&self) -> &str {
        &self.together_base_url
    }
    pub fn model(&self) -> &str {
        &self.model
    }
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
    pub fn temperature(&self) -> f32 {
        self.temperature
    }
    /// Upper bound on a single completion call.
    pub fn extraction_timeout(&self) -> Duration {
        self.extraction_timeout
    }
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: self.base_backoff,
        }
    }
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
    /// Pause between two listing pages.
    pub fn page_delay(&self) -> Duration {
        self.page_delay
    }
    /// Minimum spacing of requests to the target site while fetching pages.
    pub fn request_delay(&self) -> Duration {
        self.request_delay
    }
    /// `0` means no cap.
    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
    /// Retries for page fetches that fail transiently, spaced like the
    /// politeness delay.
    pub fn fetch_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch_attempts,
            base_delay: self.request_delay,
        }
    }
    /// Fixed patterns that replace the oracle.
    pub fn patterns(&self) -> Option<&PatternSet> {
        self.patterns.as_ref()
    }
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidValue {
                    field: name,
                    reason: format!("{raw:?}: {e}"),
                })
        }
        _ => Ok(default),
    }
}

fn parse_in_range<T>(
    name: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let value = parse_var(name, default)?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            field: name,
            reason: format!("{value} is outside {}..={}", range.start(), range.end()),
        })
    }
}

/// Errors that can occur while building a configuration.
#[derive(Debug)]
pub enum ConfigError {
    InvalidValue { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl Error for ConfigError {}
