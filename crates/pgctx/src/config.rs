use crate::builder::DEFAULT_SQL_LOG_LENGTH;
use crate::cache::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL};
use crate::validator::JoinLimits;
use std::time::Duration;

/// Configuration for [`ContextDataFetcher`](crate::fetcher::ContextDataFetcher).
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Query timeout duration.
    pub query_timeout: Option<Duration>,
    /// Shaped-data cache settings; `None` disables caching.
    pub cache: Option<CacheConfig>,
    /// Limits enforced on custom joins before a query is built.
    pub join_limits: JoinLimits,
    /// Byte limit for SQL text in log events.
    pub max_sql_log_length: usize,
}

/// Shaped-data cache settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
            capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            cache: None,
            join_limits: JoinLimits::default(),
            max_sql_log_length: DEFAULT_SQL_LOG_LENGTH,
        }
    }
}

impl FetcherConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set query timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.query_timeout = Some(duration);
        self
    }

    /// Cache shaped results with default capacity for `ttl`.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache.get_or_insert_with(CacheConfig::default).ttl = ttl;
        self
    }

    /// Cache at most `capacity` shaped results.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache.get_or_insert_with(CacheConfig::default).capacity = capacity;
        self
    }

    /// Disable the shaped-data cache.
    pub fn no_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    pub fn join_limits(mut self, limits: JoinLimits) -> Self {
        self.join_limits = limits;
        self
    }

    /// Truncate logged SQL to `len` bytes.
    pub fn max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = len;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_is_off_until_configured() {
        let config = FetcherConfig::new();
        assert!(config.cache.is_none());
        assert_eq!(config.join_limits, JoinLimits::default());

        let config = config.cache_capacity(8);
        assert_eq!(
            config.cache,
            Some(CacheConfig {
                ttl: DEFAULT_CACHE_TTL,
                capacity: 8
            })
        );
        assert!(config.no_cache().cache.is_none());
    }

    #[test]
    fn builder_sets_timeout_and_log_length() {
        let config = FetcherConfig::new()
            .timeout(Duration::from_secs(3))
            .cache_ttl(Duration::from_secs(10))
            .max_sql_log_length(80);
        assert_eq!(config.query_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.cache.map(|c| c.ttl), Some(Duration::from_secs(10)));
        assert_eq!(config.max_sql_log_length, 80);
    }
}
