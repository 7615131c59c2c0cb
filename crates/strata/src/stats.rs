// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache statistics.

use serde::Serialize;
use strata_tier::Tier;

/// In-process counters maintained regardless of telemetry.
#[derive(Debug, Default, Clone)]
pub(crate) struct Counters {
    pub hits: [u64; 3],
    pub sets: [u64; 3],
    pub evictions: [u64; 3],
    pub promotions: [u64; 3],
    pub demotions: [u64; 3],
    pub misses: u64,
    pub warmings: u64,
    pub warm_failures: u64,
    pub deletes: u64,
    pub expirations: u64,
}

impl Counters {
    pub fn hit(&mut self, level: Tier) {
        self.hits[level.index()] += 1;
    }

    pub fn set(&mut self, level: Tier) {
        self.sets[level.index()] += 1;
    }

    pub fn evicted(&mut self, level: Tier, count: u64) {
        self.evictions[level.index()] += count;
    }

    pub fn promoted(&mut self, into: Tier) {
        self.promotions[into.index()] += 1;
    }

    pub fn demoted(&mut self, into: Tier, count: u64) {
        self.demotions[into.index()] += count;
    }
}

/// Snapshot of one cache level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LevelStats {
    /// Whether the level is configured; L3 is absent without a disk directory.
    pub enabled: bool,
    /// Number of entries currently stored.
    pub entries: usize,
    /// Maximum number of entries.
    pub capacity: usize,
    /// Approximate size of the stored entries.
    pub size_bytes: u64,
    /// Lookups served by this level.
    pub hits: u64,
    /// Successful sets targeting this level.
    pub sets: u64,
    /// Entries removed to satisfy the capacity.
    pub evictions: u64,
    /// Entries copied into this level by a hit one level below.
    pub promotions: u64,
    /// Evicted entries moved into this level from the level above.
    pub demotions: u64,
}

/// Snapshot of cache statistics returned by [`CacheManager::stats`](crate::CacheManager::stats).
///
/// # Examples
///
/// ```
/// use strata::CacheManager;
/// use tick::Clock;
///
/// let cache = CacheManager::<u32>::builder(Clock::new_frozen()).build()?;
/// cache.set("a", 1)?;
/// cache.get("a");
/// cache.get("b");
///
/// let stats = cache.stats();
/// assert_eq!(stats.l1.entries, 1);
/// assert_eq!(stats.hits(), 1);
/// assert_eq!(stats.misses, 1);
/// assert!((stats.hit_rate_percent() - 50.0).abs() < f64::EPSILON);
/// # Ok::<(), strata::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// The fast in-memory level.
    pub l1: LevelStats,
    /// The larger in-memory level.
    pub l2: LevelStats,
    /// The disk level.
    pub l3: LevelStats,
    /// Lookups that found nothing and produced nothing.
    pub misses: u64,
    /// Lookups served by a warmer.
    pub warmings: u64,
    /// Warmer invocations that failed.
    pub warm_failures: u64,
    /// Deletes that removed the key from at least one level.
    pub deletes: u64,
    /// Entries removed because their TTL passed.
    pub expirations: u64,
}

impl CacheStats {
    /// Returns the statistics of one level.
    #[must_use]
    pub fn level(&self, tier: Tier) -> &LevelStats {
        match tier {
            Tier::L1 => &self.l1,
            Tier::L2 => &self.l2,
            Tier::L3 => &self.l3,
        }
    }

    /// Returns the hits across all levels.
    #[must_use]
    pub fn hits(&self) -> u64 {
        self.l1.hits + self.l2.hits + self.l3.hits
    }

    /// Returns the number of lookups: hits, misses and warmings.
    #[must_use]
    pub fn requests(&self) -> u64 {
        self.hits() + self.misses + self.warmings
    }

    /// Returns the percentage of lookups served by a level, or `0.0` before any lookup.
    ///
    /// A lookup served by a warmer counts as a request but not as a hit.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counters are far below 2^52 in practice")]
    pub fn hit_rate_percent(&self) -> f64 {
        match self.requests() {
            0 => 0.0,
            requests => self.hits() as f64 * 100.0 / requests as f64,
        }
    }
}
