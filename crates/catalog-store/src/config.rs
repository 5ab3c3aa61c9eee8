//! Configuration types for the category store and tree cache.

use std::time::Duration;

/// Default number of pooled connections for file-backed stores.
pub const DEFAULT_POOL_SIZE: usize = 4;
/// Default wait for a tree's advisory lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
/// Default wait for a pooled connection.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default SQLite busy timeout.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of attempts when a node changes tree between lookup and lock.
pub const DEFAULT_LOCK_RETRIES: u32 = 3;

/// Configuration for a category store.
///
/// # Example
///
/// ```rust
/// use catalog_store::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::builder()
///     .with_pool_size(8)
///     .with_lock_timeout(Duration::from_millis(500))
///     .with_mutation_timeout(Duration::from_secs(10))
///     .with_verify_invariants(true)
///     .build();
/// assert_eq!(config.pool_size, 8);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Number of pooled connections (forced to 1 for in-memory databases).
    pub pool_size: usize,
    /// How long a mutation waits for a tree's advisory lock.
    pub lock_timeout: Duration,
    /// How long any operation waits for a pooled connection.
    pub acquire_timeout: Duration,
    /// SQLite busy timeout applied to every connection.
    pub busy_timeout: Duration,
    /// Deadline applied to mutations that are not given an explicit context.
    pub mutation_timeout: Option<Duration>,
    /// Re-check the touched trees before every commit.
    pub verify_invariants: bool,
    /// Attempts when a node's tree changes between lookup and lock.
    pub lock_retries: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            mutation_timeout: None,
            verify_invariants: cfg!(debug_assertions),
            lock_retries: DEFAULT_LOCK_RETRIES,
        }
    }
}

impl StoreConfig {
    /// Creates a new builder for StoreConfig.
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder {
            config: StoreConfig::default(),
        }
    }
}

/// Builder for StoreConfig.
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Sets the number of pooled connections.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size.max(1);
        self
    }

    /// Sets the advisory lock timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Sets the connection acquisition timeout.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = timeout;
        self
    }

    /// Sets the SQLite busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.config.busy_timeout = timeout;
        self
    }

    /// Sets the default mutation deadline.
    pub fn with_mutation_timeout(mut self, timeout: Duration) -> Self {
        self.config.mutation_timeout = Some(timeout);
        self
    }

    /// Enables or disables pre-commit invariant verification.
    pub fn with_verify_invariants(mut self, verify: bool) -> Self {
        self.config.verify_invariants = verify;
        self
    }

    /// Sets how many times a lock is retried when a node changes tree.
    pub fn with_lock_retries(mut self, retries: u32) -> Self {
        self.config.lock_retries = retries.max(1);
        self
    }

    /// Builds the StoreConfig.
    pub fn build(self) -> StoreConfig {
        self.config
    }
}

/// Configuration for the caller-owned tree cache.
///
/// # Example
///
/// ```rust
/// use catalog_store::CacheConfig;
/// use std::time::Duration;
///
/// let cache = CacheConfig {
///     max_trees: 64,
///     ttl: Duration::from_secs(60),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached trees.
    pub max_trees: usize,
    /// Time-to-live for cached trees.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_trees: 256,
            ttl: Duration::from_secs(300),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_default() {
        let config = StoreConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert_eq!(config.lock_timeout, DEFAULT_LOCK_TIMEOUT);
        assert!(config.mutation_timeout.is_none());
        assert_eq!(config.verify_invariants, cfg!(debug_assertions));
    }

    #[test]
    fn test_store_config_builder() {
        let config = StoreConfig::builder()
            .with_pool_size(0)
            .with_lock_timeout(Duration::from_millis(100))
            .with_acquire_timeout(Duration::from_millis(200))
            .with_busy_timeout(Duration::from_millis(300))
            .with_mutation_timeout(Duration::from_secs(2))
            .with_verify_invariants(false)
            .with_lock_retries(0)
            .build();

        assert_eq!(config.pool_size, 1);
        assert_eq!(config.lock_timeout, Duration::from_millis(100));
        assert_eq!(config.acquire_timeout, Duration::from_millis(200));
        assert_eq!(config.busy_timeout, Duration::from_millis(300));
        assert_eq!(config.mutation_timeout, Some(Duration::from_secs(2)));
        assert!(!config.verify_invariants);
        assert_eq!(config.lock_retries, 1);
    }

    #[test]
    fn test_cache_config_default() {
        let cache = CacheConfig::default();
        assert_eq!(cache.max_trees, 256);
        assert_eq!(cache.ttl, Duration::from_secs(300));
    }
}
