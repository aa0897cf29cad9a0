//! Discovery-state cache.
//!
//! Tracks which labels currently have discovery metadata published to the
//! broker set. Absence from the cache means "publish discovery before the
//! next reading for that label". The cache is never persisted; a process
//! restart or any invalidation trigger rebuilds it from empty.

use std::collections::HashSet;
use std::sync::Mutex;

use tracing::{debug, info};

/// Set of labels whose discovery metadata is currently considered published.
///
/// Each label is in one of two states: unpublished (initial) or published.
/// The only way back from published to unpublished is [`invalidate_all`] —
/// there is deliberately no per-label invalidation, because every trigger
/// (hub restart, broker reconnect, elapsed interval) invalidates the hub's
/// knowledge of *all* sensors at once.
///
/// [`invalidate_all`]: DiscoveryCache::invalidate_all
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    published: Mutex<HashSet<String>>,
}

impl DiscoveryCache {
    /// Create an empty cache (every label unpublished).
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff discovery metadata must be published for `label` before the
    /// next reading is forwarded.
    pub fn should_publish(&self, label: &str) -> bool {
        !self
            .published
            .lock()
            .expect("discovery cache lock poisoned")
            .contains(label)
    }

    /// Record that discovery metadata for `label` has been published.
    ///
    /// Idempotent; marking an already-published label is a no-op.
    pub fn mark_published(&self, label: &str) {
        let inserted = self
            .published
            .lock()
            .expect("discovery cache lock poisoned")
            .insert(label.to_string());
        if inserted {
            debug!("discovery metadata for {} marked published", label);
        }
    }

    /// Forget every published label, forcing republication on next sight.
    ///
    /// Returns the number of labels cleared.
    pub fn invalidate_all(&self) -> usize {
        let mut published = self
            .published
            .lock()
            .expect("discovery cache lock poisoned");
        let cleared = published.len();
        published.clear();
        drop(published);
        info!("forcing discovery resend for all {} sensor(s)", cleared);
        cleared
    }

    /// Number of labels currently marked published.
    pub fn published_count(&self) -> usize {
        self.published
            .lock()
            .expect("discovery cache lock poisoned")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_cache_requires_publish() {
        let cache = DiscoveryCache::new();
        assert!(cache.should_publish("living_room"));
        assert_eq!(cache.published_count(), 0);
    }

    #[test]
    fn test_mark_published_until_invalidation() {
        let cache = DiscoveryCache::new();
        cache.mark_published("living_room");
        assert!(!cache.should_publish("living_room"));
        assert!(cache.should_publish("bedroom"));

        cache.invalidate_all();
        assert!(cache.should_publish("living_room"));
    }

    #[test]
    fn test_mark_published_is_idempotent() {
        let cache = DiscoveryCache::new();
        cache.mark_published("sauna");
        cache.mark_published("sauna");
        assert_eq!(cache.published_count(), 1);
    }

    #[test]
    fn test_invalidate_all_reports_cleared_count() {
        let cache = DiscoveryCache::new();
        cache.mark_published("living_room");
        cache.mark_published("bedroom");
        cache.mark_published("kitchen");

        assert_eq!(cache.invalidate_all(), 3);
        assert_eq!(cache.invalidate_all(), 0);
    }

    #[test]
    fn test_invalidation_clears_every_label() {
        let cache = DiscoveryCache::new();
        let labels = ["a", "b", "c", "d"];
        for label in labels {
            cache.mark_published(label);
        }
        cache.invalidate_all();
        for label in labels {
            assert!(cache.should_publish(label));
        }
    }
}
