//! Process-local cache tier.
//!
//! A short-TTL map in front of the distributed tier. The TTL bounds how
//! long this process can serve a value another process has since replaced;
//! writes from this process overwrite immediately, so local reads after a
//! local write are always current.

use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::CachedConfig;

struct LocalEntry {
    value: CachedConfig,
    expires_at: Instant,
}

/// In-process TTL cache keyed by config key.
pub struct LocalTier {
    entries: DashMap<String, LocalEntry>,
    ttl: Duration,
}

impl LocalTier {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Get a live entry; expired entries are dropped on access.
    pub fn get(&self, key: &str) -> Option<CachedConfig> {
        {
            let entry = self.entries.get(key)?;
            if Instant::now() < entry.expires_at {
                return Some(entry.value.clone());
            }
            // entry guard must drop before remove_if takes the shard lock
        }
        self.entries
            .remove_if(key, |_, entry| Instant::now() >= entry.expires_at);
        None
    }

    /// Insert or overwrite; one key never holds two values.
    pub fn put(&self, key: String, value: CachedConfig) {
        self.entries.insert(
            key,
            LocalEntry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configs_core::CostsConfig;

    fn costs(costs: i64) -> CachedConfig {
        CachedConfig::Costs(CostsConfig { costs })
    }

    #[test]
    fn test_put_get_overwrite() {
        let tier = LocalTier::new(Duration::from_secs(60));
        tier.put("costs".to_string(), costs(1));
        tier.put("costs".to_string(), costs(2));
        assert_eq!(tier.get("costs"), Some(costs(2)));
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_expired_entry_is_dropped() {
        let tier = LocalTier::new(Duration::from_millis(10));
        tier.put("costs".to_string(), costs(1));
        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(tier.get("costs"), None);
        assert!(tier.is_empty());
    }

    #[test]
    fn test_missing_key() {
        let tier = LocalTier::new(Duration::from_secs(60));
        assert_eq!(tier.get("banner"), None);
    }
}
