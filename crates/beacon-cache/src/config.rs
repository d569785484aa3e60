//! Cache sizing and expiry configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use beacon_settings::CacheSettings;

const DEFAULT_MAX_ENTRIES: usize = 200;

/// Capacity and optional TTL for a [`BoundedCache`](crate::BoundedCache).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    max_entries: NonZeroUsize,
    ttl: Option<Duration>,
}

impl CacheConfig {
    /// Build a config. A capacity of zero is raised to one.
    pub fn new(max_entries: usize, ttl: Option<Duration>) -> Self {
        Self {
            max_entries: NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN),
            ttl: ttl.filter(|d| !d.is_zero()),
        }
    }

    /// Maximum number of entries.
    pub fn max_entries(&self) -> NonZeroUsize {
        self.max_entries
    }

    /// Entry lifetime, if entries expire.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Same capacity with a different TTL.
    #[must_use]
    pub fn with_ttl(self, ttl: Option<Duration>) -> Self {
        Self::new(self.max_entries.get(), ttl)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES, None)
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self::new(settings.max_entries, settings.ttl_ms.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(CacheConfig::new(0, None).max_entries().get(), 1);
    }

    #[test]
    fn zero_ttl_means_no_expiry() {
        assert_eq!(CacheConfig::new(5, Some(Duration::ZERO)).ttl(), None);
    }

    #[test]
    fn from_settings() {
        let settings = CacheSettings {
            max_entries: 50,
            ttl_ms: Some(30_000),
        };
        let config = CacheConfig::from(&settings);
        assert_eq!(config.max_entries().get(), 50);
        assert_eq!(config.ttl(), Some(Duration::from_secs(30)));
        assert_eq!(CacheConfig::from(&CacheSettings::default()), CacheConfig::default());
    }
}
