// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder and configuration for [`CacheManager`].

use std::marker::PhantomData;
use std::path::PathBuf;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strata_disk::{DEFAULT_L3_CAPACITY, DiskTier};
use strata_memory::{DEFAULT_L1_CAPACITY, DEFAULT_L2_CAPACITY, MemoryTier};
use strata_tier::{Error, EvictionPolicy, Result, Tier};
use tick::Clock;

use crate::manager::{CacheManager, CacheName, CacheValue, Inner, State};
use crate::telemetry::CacheTelemetry;
use crate::warmer::WarmerRegistry;

const DEFAULT_CACHE_NAME: CacheName = "strata";

/// Capacity and eviction policy of one in-memory level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryTierConfig {
    /// Maximum number of entries.
    pub capacity: usize,
    /// Victim selection strategy; LRU when omitted.
    #[serde(default)]
    pub policy: EvictionPolicy,
}

impl MemoryTierConfig {
    /// Creates a level configuration.
    #[must_use]
    pub const fn new(capacity: usize, policy: EvictionPolicy) -> Self {
        Self { capacity, policy }
    }

    fn build<V>(self, level: Tier) -> MemoryTier<V> {
        MemoryTier::builder(level).capacity(self.capacity).policy(self.policy).build()
    }
}

/// Declarative configuration of a [`CacheManager`].
///
/// Every field has a default, so configuration files only need to name what they change.
///
/// # Examples
///
/// ```
/// use strata::{CacheConfig, EvictionPolicy, Tier};
///
/// let config: CacheConfig = serde_json::from_str(
///     r#"{
///         "l1": { "capacity": 64, "policy": "lfu" },
///         "default_tier": "l2",
///         "default_ttl": { "secs": 300, "nanos": 0 }
///     }"#,
/// )?;
///
/// assert_eq!(config.l1.policy, EvictionPolicy::Lfu);
/// assert_eq!(config.l2.capacity, 1024);
/// assert_eq!(config.default_tier, Tier::L2);
/// assert!(config.disk_dir.is_none());
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// The fast in-memory level.
    pub l1: MemoryTierConfig,
    /// The larger in-memory level.
    pub l2: MemoryTierConfig,
    /// Directory of the disk level; without one, L3 is disabled.
    pub disk_dir: Option<PathBuf>,
    /// Maximum number of entries of the disk level.
    pub l3_capacity: usize,
    /// TTL applied when a set does not specify one; `None` means entries never expire.
    pub default_ttl: Option<Duration>,
    /// Level a set stores into when it does not specify one.
    pub default_tier: Tier,
    /// Move entries evicted from L1 or L2 one level down instead of dropping them.
    pub demote_on_evict: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            l1: MemoryTierConfig::new(DEFAULT_L1_CAPACITY, EvictionPolicy::Lru),
            l2: MemoryTierConfig::new(DEFAULT_L2_CAPACITY, EvictionPolicy::Lru),
            disk_dir: None,
            l3_capacity: DEFAULT_L3_CAPACITY,
            default_ttl: None,
            default_tier: Tier::L1,
            demote_on_evict: false,
        }
    }
}

/// Builder for [`CacheManager`], created by [`CacheManager::builder`].
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata::{CacheManager, EvictionPolicy, MemoryTierConfig, Tier};
/// use tick::Clock;
///
/// let dir = tempfile::tempdir()?;
/// let cache = CacheManager::<Vec<u8>>::builder(Clock::new_frozen())
///     .name("thumbnails")
///     .l1(MemoryTierConfig::new(16, EvictionPolicy::Lfu))
///     .disk(dir.path())
///     .l3_capacity(10_000)
///     .default_ttl(Duration::from_secs(3600))
///     .demote_on_evict(true)
///     .build()?;
///
/// assert!(cache.stats().l3.enabled);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct CacheManagerBuilder<V> {
    clock: Clock,
    name: CacheName,
    config: CacheConfig,
    telemetry: Option<CacheTelemetry>,
    _value: PhantomData<fn() -> V>,
}

impl<V: CacheValue> CacheManagerBuilder<V> {
    pub(crate) fn new(clock: Clock) -> Self {
        Self {
            clock,
            name: DEFAULT_CACHE_NAME,
            config: CacheConfig::default(),
            telemetry: None,
            _value: PhantomData,
        }
    }

    /// Sets the name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Configures the L1 level.
    #[must_use]
    pub fn l1(mut self, config: MemoryTierConfig) -> Self {
        self.config.l1 = config;
        self
    }

    /// Configures the L2 level.
    #[must_use]
    pub fn l2(mut self, config: MemoryTierConfig) -> Self {
        self.config.l2 = config;
        self
    }

    /// Enables the disk level, storing blobs in `dir`.
    ///
    /// Blobs already present in `dir` are removed when the cache is built.
    #[must_use]
    pub fn disk(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.disk_dir = Some(dir.into());
        self
    }

    /// Sets the entry capacity of the disk level.
    #[must_use]
    pub fn l3_capacity(mut self, capacity: usize) -> Self {
        self.config.l3_capacity = capacity;
        self
    }

    /// Sets the TTL of entries stored without an explicit one.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = Some(ttl);
        self
    }

    /// Sets the level entries are stored in when a set does not name one.
    #[must_use]
    pub fn default_tier(mut self, tier: Tier) -> Self {
        self.config.default_tier = tier;
        self
    }

    /// Moves evicted entries one level down instead of dropping them.
    #[must_use]
    pub fn demote_on_evict(mut self, enabled: bool) -> Self {
        self.config.demote_on_evict = enabled;
        self
    }

    /// Records cache activity through the given telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: CacheTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Builds the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the default tier is L3 without a disk directory, or
    /// if the disk directory cannot be created or cleaned.
    pub fn build(self) -> Result<CacheManager<V>> {
        let config = self.config;
        if config.default_tier == Tier::L3 && config.disk_dir.is_none() {
            return Err(Error::from_message("default tier l3 requires a disk directory"));
        }

        let l3 = config
            .disk_dir
            .map(|dir| DiskTier::open(dir, config.l3_capacity))
            .transpose()?;

        tracing::debug!(
            cache.name = self.name,
            l1.capacity = config.l1.capacity,
            l1.policy = config.l1.policy.as_str(),
            l2.capacity = config.l2.capacity,
            l2.policy = config.l2.policy.as_str(),
            l3.enabled = l3.is_some(),
            default_tier = config.default_tier.as_str(),
            "cache built"
        );

        Ok(CacheManager::from_inner(Inner {
            name: self.name,
            clock: self.clock,
            state: Mutex::new(State::new(config.l1.build(Tier::L1), config.l2.build(Tier::L2), l3)),
            warmers: WarmerRegistry::default(),
            telemetry: self.telemetry,
            default_tier: config.default_tier,
            default_ttl: config.default_ttl,
            demote_on_evict: config.demote_on_evict,
        }))
    }
}
