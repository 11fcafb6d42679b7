//! # Enrichment Configuration Module
//!
//! This module defines configuration structures for the enrichment pipeline,
//! the AI augmentation lane, its rate limiter, and the batch runner. Values are
//! read from environment variables with conservative defaults.

use std::path::PathBuf;

// Constants for enrichment configuration
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CACHE_PATH: &str = "tmp/ai-enrichment-cache.json";
pub const DEFAULT_RPM: u32 = 500;
pub const DEFAULT_TPM: u64 = 200_000;
pub const DEFAULT_MIN_SLEEP_MS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const CACHE_TTL_SECS: i64 = 365 * 24 * 60 * 60; // 1 year
pub const CACHE_VERSION: &str = "v1";

/// Which inputs feed the AI cache key hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKeyMode {
    /// Raw catalog fields only; cached responses survive parser changes
    Raw,
    /// Raw fields plus the deterministic parsed core
    RawParsed,
}

impl CacheKeyMode {
    /// Parse the `AI_CACHE_KEY_MODE` value, defaulting to `Raw`
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("raw_parsed") {
            CacheKeyMode::RawParsed
        } else {
            CacheKeyMode::Raw
        }
    }
}

/// Request/token budget for the shared rate limiter
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per minute
    pub rpm: u32,
    /// Tokens per minute
    pub tpm: u64,
    /// Minimum sleep granularity while waiting for budget, in milliseconds
    pub min_sleep_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            rpm: DEFAULT_RPM,
            tpm: DEFAULT_TPM,
            min_sleep_ms: DEFAULT_MIN_SLEEP_MS,
        }
    }
}

/// AI augmentation lane configuration
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// API key; the lane is disabled when absent
    pub api_key: Option<String>,
    /// Explicit opt-out flag (`AI_ENRICH=false`)
    pub enrich_flag: bool,
    /// Chat model name
    pub model: String,
    /// Base URL of the chat-completion API
    pub base_url: String,
    /// Cache key input selection
    pub cache_key_mode: CacheKeyMode,
    /// Persistent cache file
    pub cache_path: PathBuf,
    /// HTTP timeout in seconds
    pub timeout_secs: u64,
    /// Retries after an HTTP 429
    pub max_retries: u32,
}

impl AiConfig {
    /// The lane runs only with a non-blank API key and no explicit opt-out
    pub fn is_enabled(&self) -> bool {
        self.enrich_flag
            && self
                .api_key
                .as_deref()
                .is_some_and(|key| !key.trim().is_empty())
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            enrich_flag: true,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            cache_key_mode: CacheKeyMode::Raw,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Deterministic pipeline switches
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Include the display-title stage
    pub title_composer_enabled: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            title_composer_enabled: true,
        }
    }
}

/// Top-level configuration for a batch enrichment run
#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Deterministic pipeline switches
    pub pipeline: PipelineConfig,
    /// AI lane settings
    pub ai: AiConfig,
    /// Shared rate-limit budget
    pub rate_limit: RateLimitConfig,
    /// Number of products processed concurrently
    pub concurrency: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            ai: AiConfig::default(),
            rate_limit: RateLimitConfig::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl EnrichmentConfig {
    /// Build the configuration from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    ///
    /// Blank or unparsable values fall back to defaults.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use catalog_enrichment::config::EnrichmentConfig;
    ///
    /// let config = EnrichmentConfig::from_lookup(|key| match key {
    ///     "OPENAI_RPM" => Some("60".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(config.rate_limit.rpm, 60);
    /// assert!(!config.ai.is_enabled());
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str, default: bool| {
            get(key)
                .map(|v| !v.trim().eq_ignore_ascii_case("false"))
                .unwrap_or(default)
        };

        let ai = AiConfig {
            api_key: get("OPENAI_API_KEY").map(|k| k.trim().to_string()),
            enrich_flag: flag("AI_ENRICH", true),
            model: get("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            cache_key_mode: get("AI_CACHE_KEY_MODE")
                .map(|v| CacheKeyMode::parse(&v))
                .unwrap_or(CacheKeyMode::Raw),
            cache_path: get("AI_CACHE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_PATH)),
            timeout_secs: parse_or(get("OPENAI_TIMEOUT_SECS"), DEFAULT_TIMEOUT_SECS),
            max_retries: parse_or(get("OPENAI_MAX_RETRIES"), DEFAULT_MAX_RETRIES),
        };

        let rate_limit = RateLimitConfig {
            rpm: parse_or(get("OPENAI_RPM"), DEFAULT_RPM).max(1),
            tpm: parse_or(get("OPENAI_TPM"), DEFAULT_TPM).max(1),
            min_sleep_ms: parse_or(get("OPENAI_MIN_SLEEP_MS"), DEFAULT_MIN_SLEEP_MS).max(1),
        };

        Self {
            pipeline: PipelineConfig {
                title_composer_enabled: flag("TITLE_COMPOSER_ENABLED", true),
            },
            ai,
            rate_limit,
            concurrency: parse_or(get("ENRICH_CONCURRENCY"), DEFAULT_CONCURRENCY).max(1),
        }
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
