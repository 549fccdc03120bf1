//! Configuration structures for docmirror
//!
//! The crate is configured through plain options structures. How the values
//! are obtained (flags, environment, config files) is the caller's concern;
//! everything here deserializes from whatever the caller assembled and every
//! field carries a sensible default except the application credentials.

use serde::Deserialize;

/// Top-level configuration for a crawl/export run
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub discover: DiscoverConfig,

    /// Host suffixes accepted as workspace URLs (e.g. "feishu.cn" matches
    /// "xyz.feishu.cn" and "feishu.cn" itself)
    #[serde(default = "default_domains")]
    pub domains: Vec<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            discover: DiscoverConfig::default(),
            domains: default_domains(),
        }
    }
}

/// API client behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the remote service's open API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Application id used to obtain tenant access tokens
    #[serde(default)]
    pub app_id: String,

    /// Application secret used to obtain tenant access tokens
    #[serde(default)]
    pub app_secret: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minimum spacing between request starts (milliseconds)
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,

    /// Maximum attempts per logical request, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential retry backoff (milliseconds)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Ceiling for the retry backoff delay (milliseconds)
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Lower bound of the randomized cooldown applied when the service
    /// reports a rate limit (milliseconds)
    #[serde(default = "default_rate_limit_cooldown_min_ms")]
    pub rate_limit_cooldown_min_ms: u64,

    /// Upper bound of the randomized rate-limit cooldown (milliseconds)
    #[serde(default = "default_rate_limit_cooldown_max_ms")]
    pub rate_limit_cooldown_max_ms: u64,

    /// Page size requested from paginated endpoints
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: String::new(),
            app_secret: String::new(),
            timeout_secs: default_timeout_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            rate_limit_cooldown_min_ms: default_rate_limit_cooldown_min_ms(),
            rate_limit_cooldown_max_ms: default_rate_limit_cooldown_max_ms(),
            page_size: default_page_size(),
        }
    }
}

/// Discovery bounds
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Maximum BFS distance from the root URL; children of items at this
    /// depth are not enqueued
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of distinct documents to discover before the crawl
    /// stops
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_docs: default_max_docs(),
        }
    }
}

fn default_domains() -> Vec<String> {
    vec![
        "feishu.cn".to_string(),
        "feishu.net".to_string(),
        "larksuite.com".to_string(),
        "larkoffice.com".to_string(),
    ]
}

fn default_base_url() -> String {
    "https://open.feishu.cn".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_min_request_interval_ms() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_rate_limit_cooldown_min_ms() -> u64 {
    1_000
}

fn default_rate_limit_cooldown_max_ms() -> u64 {
    5_000
}

fn default_page_size() -> u32 {
    500
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_docs() -> usize {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MirrorConfig::default();
        assert_eq!(config.api.base_url, "https://open.feishu.cn");
        assert_eq!(config.api.max_retries, 5);
        assert_eq!(config.discover.max_depth, 3);
        assert!(config.domains.iter().any(|d| d == "feishu.cn"));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: MirrorConfig = serde_json::from_str(
            r#"{"api": {"app_id": "cli_x", "app_secret": "s"}, "discover": {"max_docs": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.api.app_id, "cli_x");
        assert_eq!(config.discover.max_docs, 10);
        assert_eq!(config.discover.max_depth, default_max_depth());
        assert_eq!(config.api.page_size, 500);
    }

    #[test]
    fn test_cooldown_range_wider_than_spacing() {
        let config = ApiConfig::default();
        assert!(config.rate_limit_cooldown_min_ms > config.min_request_interval_ms);
        assert!(config.rate_limit_cooldown_max_ms > config.rate_limit_cooldown_min_ms);
    }
}
