// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache manager orchestrating the three levels.

use std::fmt::Debug;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use strata_disk::DiskTier;
use strata_memory::MemoryTier;
use strata_tier::{BoxError, CacheEntry, CacheTier, Error, Lookup, Result, Tier};
use tick::Clock;

use crate::builder::CacheManagerBuilder;
use crate::options::SetOptions;
use crate::stats::{CacheStats, Counters, LevelStats};
use crate::sweeper::ExpirySweeper;
use crate::telemetry::ext::{CacheTelemetryExt, ClockExt, TimedResult};
use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};
use crate::warmer::{InFlight, Producer, WarmReport, WarmerRegistry};

/// Type alias for cache names used in telemetry.
pub type CacheName = &'static str;

/// Values a [`CacheManager`] can hold.
///
/// Values are cloned on every read and serialized for size estimation and for
/// the disk level. The trait is implemented for every type meeting the bounds.
pub trait CacheValue: Clone + Serialize + DeserializeOwned + Send + 'static {}

impl<T> CacheValue for T where T: Clone + Serialize + DeserializeOwned + Send + 'static {}

/// The three levels and the counters, guarded together by one lock.
pub(crate) struct State<V> {
    l1: MemoryTier<V>,
    l2: MemoryTier<V>,
    l3: Option<DiskTier<V>>,
    counters: Counters,
}

impl<V: CacheValue> State<V> {
    pub(crate) fn new(l1: MemoryTier<V>, l2: MemoryTier<V>, l3: Option<DiskTier<V>>) -> Self {
        Self {
            l1,
            l2,
            l3,
            counters: Counters::default(),
        }
    }

    fn tier(&self, level: Tier) -> Option<&dyn CacheTier<V>> {
        match level {
            Tier::L1 => Some(&self.l1),
            Tier::L2 => Some(&self.l2),
            Tier::L3 => self.l3.as_ref().map(|tier| tier as &dyn CacheTier<V>),
        }
    }

    fn tier_mut(&mut self, level: Tier) -> Option<&mut dyn CacheTier<V>> {
        match level {
            Tier::L1 => Some(&mut self.l1),
            Tier::L2 => Some(&mut self.l2),
            Tier::L3 => self.l3.as_mut().map(|tier| tier as &mut dyn CacheTier<V>),
        }
    }

    fn locate(&self, key: &str) -> Option<Tier> {
        Tier::ALL
            .into_iter()
            .find(|&level| self.tier(level).is_some_and(|tier| tier.contains(key)))
    }

    fn level_stats(&self, level: Tier) -> LevelStats {
        let i = level.index();
        let counters = &self.counters;
        let mut stats = LevelStats {
            hits: counters.hits[i],
            sets: counters.sets[i],
            evictions: counters.evictions[i],
            promotions: counters.promotions[i],
            demotions: counters.demotions[i],
            ..LevelStats::default()
        };
        if let Some(tier) = self.tier(level) {
            stats.enabled = true;
            stats.entries = tier.len();
            stats.capacity = tier.capacity();
            stats.size_bytes = tier.size_bytes();
        }
        stats
    }
}

pub(crate) struct Inner<V> {
    pub(crate) name: CacheName,
    pub(crate) clock: Clock,
    pub(crate) state: Mutex<State<V>>,
    pub(crate) warmers: WarmerRegistry<V>,
    pub(crate) telemetry: Option<CacheTelemetry>,
    pub(crate) default_tier: Tier,
    pub(crate) default_ttl: Option<Duration>,
    pub(crate) demote_on_evict: bool,
}

/// How a lookup was resolved.
enum Resolved<V> {
    Hit(V, Tier),
    Warmed(V),
    Miss,
}

/// Outcome of running a warmer.
enum Produced<V> {
    Stored(V, Tier),
    /// The value was produced but could not be stored.
    NotStored(V),
    /// A write or delete of the key landed while the producer ran; the value was discarded.
    Superseded,
    Failed,
}

/// A thread-safe cache with two in-memory levels and an optional disk level.
///
/// `CacheManager` owns every entry. A [`get`](Self::get) cascades L1 → L2 → L3
/// and, on a hit below L1, copies the entry exactly one level up. A complete
/// miss falls back to a registered warmer. A [`set`](Self::set) stores into one
/// level and removes the key from the others. Every level enforces its entry
/// capacity synchronously after each insertion.
///
/// All level mutations happen under one lock. Warmer producers run outside it;
/// concurrent lookups of a key being warmed wait for that warm instead of
/// invoking the producer again.
///
/// Cloning is cheap and yields a handle to the same cache.
///
/// # Examples
///
/// ```
/// use strata::{CacheManager, SetOptions, Tier};
/// use tick::Clock;
///
/// let cache = CacheManager::<String>::builder(Clock::new_frozen())
///     .name("greetings")
///     .build()?;
///
/// cache.set("en", "hello".to_string())?;
/// cache.set_with("fr", "bonjour".to_string(), SetOptions::new().tier(Tier::L2))?;
///
/// assert_eq!(cache.get("en").as_deref(), Some("hello"));
///
/// // The L2 hit is promoted into L1.
/// assert_eq!(cache.get("fr").as_deref(), Some("bonjour"));
/// assert_eq!(cache.stats().l1.promotions, 1);
///
/// assert!(cache.delete("en"));
/// assert_eq!(cache.get_or("en", "hi".to_string()), "hi");
/// # Ok::<(), strata::Error>(())
/// ```
pub struct CacheManager<V> {
    inner: Arc<Inner<V>>,
}

impl<V> Clone for CacheManager<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Debug for CacheManager<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("name", &self.inner.name)
            .field("default_tier", &self.inner.default_tier)
            .field("default_ttl", &self.inner.default_ttl)
            .field("demote_on_evict", &self.inner.demote_on_evict)
            .finish_non_exhaustive()
    }
}

/// Constructor and access methods.
impl<V: CacheValue> CacheManager<V> {
    /// Creates a new cache builder.
    ///
    /// The clock supplies every timestamp and TTL check of the cache.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use strata::CacheManager;
    /// use tick::Clock;
    ///
    /// let cache = CacheManager::<i32>::builder(Clock::new_frozen())
    ///     .default_ttl(Duration::from_secs(60))
    ///     .build()?;
    /// # Ok::<(), strata::Error>(())
    /// ```
    #[must_use]
    pub fn builder(clock: Clock) -> CacheManagerBuilder<V> {
        CacheManagerBuilder::new(clock)
    }

    pub(crate) fn from_inner(inner: Inner<V>) -> Self {
        Self { inner: Arc::new(inner) }
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner<V>> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<Inner<V>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Returns the name used in logs and metrics.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.inner.name
    }

    /// Returns the clock of this cache.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.inner.clock
    }
}

/// Cache operations.
impl<V: CacheValue> CacheManager<V> {
    /// Looks a key up, cascading through the levels and falling back to its warmer.
    ///
    /// A hit in L2 or L3 copies the entry one level up. Disk failures are logged
    /// and treated as a miss. On a complete miss the key's warmer, if any, is run
    /// and its value is stored at the default level; a failing warmer counts as
    /// a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let TimedResult { result, duration } = self.inner.clock.timed(|| self.resolve(key));
        let (activity, level, value) = match result {
            Resolved::Hit(value, level) => (CacheActivity::Hit, Some(level), Some(value)),
            Resolved::Warmed(value) => (CacheActivity::Warmed, None, Some(value)),
            Resolved::Miss => (CacheActivity::Miss, None, None),
        };
        self.record(CacheOperation::Get, activity, level, Some(duration));
        value
    }

    /// Looks a key up like [`get`](Self::get), returning `default` when nothing is found.
    pub fn get_or(&self, key: &str, default: V) -> V {
        self.get(key).unwrap_or(default)
    }

    /// Stores a value at the default level with the default TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be stored; see [`set_with`](Self::set_with).
    pub fn set(&self, key: &str, value: V) -> Result<()> {
        self.set_with(key, value, SetOptions::default())
    }

    /// Stores a value, replacing any entry with the same key in any level.
    ///
    /// The target level then evicts until it is within its capacity. With
    /// demotion enabled, its victims move one level down instead of being dropped.
    /// A warm of the key in flight at that moment does not overwrite this value.
    ///
    /// # Errors
    ///
    /// Returns an error if the target level is L3 and no disk directory is
    /// configured, or if the entry could not be written to disk. Nothing is
    /// stored in that case and other levels are left unchanged.
    pub fn set_with(&self, key: &str, value: V, options: SetOptions) -> Result<()> {
        let TimedResult { result, duration } = self.inner.clock.timed(|| self.store(key, value, options, CacheOperation::Set));
        let level = result?;
        self.record(CacheOperation::Set, CacheActivity::Inserted, Some(level), Some(duration));
        Ok(())
    }

    /// Removes a key from every level, returning `true` if any level held it.
    ///
    /// Deleting an absent key is a no-op. Failing to delete a blob is logged.
    /// A warm of the key in flight at that moment does not store its value.
    pub fn delete(&self, key: &str) -> bool {
        let TimedResult { result: deleted, duration } = self.inner.clock.timed(|| {
            let mut state = self.inner.state.lock();
            self.inner.warmers.supersede(key);
            let mut deleted = false;
            for level in Tier::ALL {
                let Some(tier) = state.tier_mut(level) else { continue };
                match tier.remove(key) {
                    Ok(removed) => deleted |= removed,
                    Err(error) => self.warn_failure(CacheOperation::Delete, level, key, &error),
                }
            }
            if deleted {
                state.counters.deletes += 1;
            }
            self.record_sizes(&state);
            deleted
        });

        let activity = if deleted { CacheActivity::Invalidated } else { CacheActivity::Miss };
        self.record(CacheOperation::Delete, activity, None, Some(duration));
        deleted
    }

    /// Removes every entry of one level, or of every level when `tier` is `None`.
    ///
    /// Blobs that cannot be deleted are logged and skipped. Warms in flight at
    /// that moment do not store their values.
    pub fn clear(&self, tier: Option<Tier>) {
        let TimedResult { duration, .. } = self.inner.clock.timed(|| {
            let mut state = self.inner.state.lock();
            self.inner.warmers.supersede_all();
            for level in Tier::ALL.into_iter().filter(|&level| tier.is_none_or(|t| t == level)) {
                let Some(store) = state.tier_mut(level) else { continue };
                if let Err(error) = store.clear() {
                    self.warn_failure(CacheOperation::Clear, level, "*", &error);
                }
            }
            self.record_sizes(&state);
        });

        tracing::info!(cache.name = self.inner.name, cache.level = ?tier.map(Tier::as_str), "cache cleared");
        self.record(CacheOperation::Clear, CacheActivity::Ok, tier, Some(duration));
    }

    /// Reports the first level holding the key, without touching or expiring it.
    #[must_use]
    pub fn locate(&self, key: &str) -> Option<Tier> {
        self.inner.state.lock().locate(key)
    }

    /// Returns `true` if any level holds the key, expired or not.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.locate(key).is_some()
    }

    /// Removes every expired entry from every level, returning how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.inner.clock.system_time();
        let TimedResult { result: removed, duration } = self.inner.clock.timed(|| {
            let mut state = self.inner.state.lock();
            let mut removed = 0;
            for level in Tier::ALL {
                let Some(tier) = state.tier_mut(level) else { continue };
                match tier.purge_expired(now) {
                    Ok(count) => {
                        self.inner
                            .telemetry
                            .record_count(self.inner.name, CacheOperation::Sweep, CacheActivity::Expired, Some(level), as_count(count));
                        removed += count;
                    }
                    Err(error) => self.warn_failure(CacheOperation::Sweep, level, "*", &error),
                }
            }
            state.counters.expirations += as_count(removed);
            self.record_sizes(&state);
            removed
        });

        self.record(CacheOperation::Sweep, CacheActivity::Ok, None, Some(duration));
        removed
    }

    /// Creates a sweeper that calls [`sweep_expired`](Self::sweep_expired) every `period`.
    #[must_use]
    pub fn sweeper(&self, period: Duration) -> ExpirySweeper<V> {
        ExpirySweeper::new(self, period)
    }

    /// Returns a snapshot of the level sizes and counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        let counters = &state.counters;
        CacheStats {
            l1: state.level_stats(Tier::L1),
            l2: state.level_stats(Tier::L2),
            l3: state.level_stats(Tier::L3),
            misses: counters.misses,
            warmings: counters.warmings,
            warm_failures: counters.warm_failures,
            deletes: counters.deletes,
            expirations: counters.expirations,
        }
    }
}

/// Warmer registration and eager warming.
impl<V: CacheValue> CacheManager<V> {
    /// Registers a producer invoked when `key` misses in every level.
    ///
    /// Registering a key again replaces its producer.
    ///
    /// # Examples
    ///
    /// ```
    /// use strata::CacheManager;
    /// use tick::Clock;
    ///
    /// let cache = CacheManager::<u64>::builder(Clock::new_frozen()).build()?;
    /// cache.register_warmer("answer", || Ok::<_, std::io::Error>(42));
    ///
    /// assert_eq!(cache.get("answer"), Some(42));
    /// assert_eq!(cache.stats().warmings, 1);
    /// # Ok::<(), strata::Error>(())
    /// ```
    pub fn register_warmer<F, E>(&self, key: impl Into<String>, producer: F)
    where
        F: Fn() -> std::result::Result<V, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let key = key.into();
        let producer: Producer<V> = Arc::new(move || producer().map_err(Into::into));
        if self.inner.warmers.register(key.clone(), producer) {
            tracing::debug!(cache.name = self.inner.name, cache.key = key, "warmer replaced");
        }
    }

    /// Removes the producer of `key`, returning `true` if one was registered.
    pub fn unregister_warmer(&self, key: &str) -> bool {
        self.inner.warmers.unregister(key)
    }

    /// Returns the keys with a registered warmer, sorted.
    #[must_use]
    pub fn warmer_keys(&self) -> Vec<String> {
        self.inner.warmers.keys()
    }

    /// Invokes every registered warmer and stores the produced values.
    pub fn warm_all(&self) -> WarmReport {
        self.warm_keys(self.inner.warmers.keys())
    }

    /// Invokes the warmers of the given keys and stores the produced values.
    ///
    /// Keys without a warmer are skipped. A failing warmer is logged and counted
    /// in the report; it does not stop the remaining keys from being warmed. A key
    /// already being warmed elsewhere is waited for and counted by whether the
    /// cache holds it afterwards.
    pub fn warm_keys<I, K>(&self, keys: I) -> WarmReport
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut report = WarmReport::default();
        for key in keys {
            let key = key.as_ref();
            let Some(producer) = self.inner.warmers.producer(key) else {
                tracing::debug!(cache.name = self.inner.name, cache.key = key, "no warmer registered, skipping");
                continue;
            };
            let Some(in_flight) = self.inner.warmers.try_start(key) else {
                // A concurrent lookup is already storing a fresh value.
                self.inner.warmers.wait_for(key);
                report.tally(self.contains(key));
                continue;
            };

            let TimedResult { result, duration } = self
                .inner
                .clock
                .timed(|| self.produce(key, &producer, &in_flight, CacheOperation::Warm));
            drop(in_flight);
            match result {
                Produced::Stored(_, level) => {
                    report.tally(true);
                    self.record(CacheOperation::Warm, CacheActivity::Warmed, Some(level), Some(duration));
                }
                Produced::Superseded => report.tally(self.contains(key)),
                Produced::NotStored(_) | Produced::Failed => report.tally(false),
            }
        }

        tracing::info!(
            cache.name = self.inner.name,
            warmed = report.warmed,
            failed = report.failed,
            "cache warming finished"
        );
        report
    }
}

/// Internals; every method taking `&mut State` runs under the lock.
impl<V: CacheValue> CacheManager<V> {
    fn resolve(&self, key: &str) -> Resolved<V> {
        if let Some((value, level)) = self.lookup(key) {
            return Resolved::Hit(value, level);
        }

        let resolved = match self.inner.warmers.producer(key) {
            None => Resolved::Miss,
            Some(producer) => match self.inner.warmers.try_start(key) {
                Some(in_flight) => {
                    // The previous holder of the mark may have stored the value in the meantime.
                    if let Some((value, level)) = self.lookup(key) {
                        return Resolved::Hit(value, level);
                    }
                    let produced = self.produce(key, &producer, &in_flight, CacheOperation::Get);
                    drop(in_flight);
                    match produced {
                        Produced::Stored(value, _) | Produced::NotStored(value) => {
                            self.inner.state.lock().counters.warmings += 1;
                            Resolved::Warmed(value)
                        }
                        Produced::Superseded => self.reread(key),
                        Produced::Failed => Resolved::Miss,
                    }
                }
                None => {
                    self.inner.warmers.wait_for(key);
                    self.reread(key)
                }
            },
        };

        if matches!(resolved, Resolved::Miss) {
            self.inner.state.lock().counters.misses += 1;
        }
        resolved
    }

    fn reread(&self, key: &str) -> Resolved<V> {
        match self.lookup(key) {
            Some((value, level)) => Resolved::Hit(value, level),
            None => Resolved::Miss,
        }
    }

    fn lookup(&self, key: &str) -> Option<(V, Tier)> {
        let now = self.inner.clock.system_time();
        let mut state = self.inner.state.lock();
        for level in Tier::ALL {
            let Some(tier) = state.tier_mut(level) else { continue };
            match tier.get(key, now) {
                Ok(Lookup::Hit(entry)) => {
                    state.counters.hit(level);
                    if let Some(target) = level.promotion_target() {
                        self.promote(&mut state, target, entry.clone());
                    }
                    return Some((entry.into_value(), level));
                }
                Ok(Lookup::Expired) => {
                    state.counters.expirations += 1;
                    self.record(CacheOperation::Get, CacheActivity::Expired, Some(level), None);
                }
                Ok(Lookup::Miss) => {}
                Err(error) => self.warn_failure(CacheOperation::Get, level, key, &error),
            }
        }
        None
    }

    /// Copies a hit one level up, leaving the lower copy in place.
    fn promote(&self, state: &mut State<V>, target: Tier, entry: CacheEntry<V>) {
        let Some(tier) = state.tier_mut(target) else { return };
        let key = entry.key().to_owned();
        match tier.insert(entry) {
            Ok(()) => {
                state.counters.promoted(target);
                self.record(CacheOperation::Get, CacheActivity::Promoted, Some(target), None);
                self.enforce_capacity(state, target, CacheOperation::Get);
                self.record_sizes(state);
            }
            Err(error) => self.warn_failure(CacheOperation::Get, target, &key, &error),
        }
    }

    fn store(&self, key: &str, value: V, options: SetOptions, operation: CacheOperation) -> Result<Tier> {
        let mut state = self.inner.state.lock();
        let level = self.store_locked(&mut state, key, value, options, operation)?;
        self.inner.warmers.supersede(key);
        Ok(level)
    }

    fn store_locked(
        &self,
        state: &mut State<V>,
        key: &str,
        value: V,
        options: SetOptions,
        operation: CacheOperation,
    ) -> Result<Tier> {
        let level = options.tier.unwrap_or(self.inner.default_tier);
        let entry = CacheEntry::new(key, value, self.inner.clock.system_time())
            .with_ttl(options.ttl.or(self.inner.default_ttl))
            .with_metadata(options.metadata);

        let Some(tier) = state.tier_mut(level) else {
            self.record(operation, CacheActivity::Error, Some(level), None);
            return Err(Error::from_message(format!("cache level {level} is not configured")));
        };
        if let Err(error) = tier.insert(entry) {
            self.warn_failure(operation, level, key, &error);
            return Err(error);
        }

        for other in Tier::ALL.into_iter().filter(|&other| other != level) {
            let removed = state.tier_mut(other).map_or(Ok(false), |tier| tier.remove(key));
            if let Err(error) = removed {
                self.warn_failure(operation, other, key, &error);
            }
        }

        state.counters.set(level);
        self.enforce_capacity(state, level, operation);
        self.record_sizes(state);
        Ok(level)
    }

    /// Runs a producer outside the lock and stores its value at the default level,
    /// unless the key was written or deleted since `in_flight` was taken.
    fn produce(
        &self,
        key: &str,
        producer: &Producer<V>,
        in_flight: &InFlight<'_, V>,
        operation: CacheOperation,
    ) -> Produced<V> {
        let value = match producer() {
            Ok(value) => value,
            Err(error) => {
                tracing::warn!(cache.name = self.inner.name, cache.key = key, error = %error, "warmer failed");
                self.inner.state.lock().counters.warm_failures += 1;
                self.record(operation, CacheActivity::WarmFailed, None, None);
                return Produced::Failed;
            }
        };

        let mut state = self.inner.state.lock();
        if in_flight.is_superseded() {
            tracing::debug!(cache.name = self.inner.name, cache.key = key, "warmed value superseded, discarding");
            return Produced::Superseded;
        }
        match self.store_locked(&mut state, key, value.clone(), SetOptions::default(), operation) {
            Ok(level) => Produced::Stored(value, level),
            Err(_) => Produced::NotStored(value),
        }
    }

    /// Evicts from `level` until it fits, cascading victims downwards when demotion is enabled.
    fn enforce_capacity(&self, state: &mut State<V>, level: Tier, operation: CacheOperation) {
        let mut level = level;
        loop {
            let Some(tier) = state.tier_mut(level) else { return };
            let evicted = match tier.enforce_capacity() {
                Ok(evicted) => evicted,
                Err(error) => {
                    self.warn_failure(operation, level, "*", &error);
                    return;
                }
            };
            if evicted.is_empty() {
                return;
            }

            let count = as_count(evicted.len());
            state.counters.evicted(level, count);
            self.inner
                .telemetry
                .record_count(self.inner.name, operation, CacheActivity::Evicted, Some(level), count);

            if !self.inner.demote_on_evict {
                return;
            }
            let Some(target) = level.demotion_target() else { return };
            let Some(lower) = state.tier_mut(target) else { return };

            let mut demoted = 0;
            for entry in evicted.into_iter().filter_map(|victim| victim.entry) {
                let key = entry.key().to_owned();
                match lower.insert(entry) {
                    Ok(()) => demoted += 1,
                    Err(error) => self.warn_failure(operation, target, &key, &error),
                }
            }
            state.counters.demoted(target, demoted);
            self.inner
                .telemetry
                .record_count(self.inner.name, operation, CacheActivity::Demoted, Some(target), demoted);

            level = target;
        }
    }

    fn record_sizes(&self, state: &State<V>) {
        if self.inner.telemetry.is_none() {
            return;
        }
        for level in Tier::ALL {
            if let Some(tier) = state.tier(level) {
                self.inner.telemetry.record_size(self.inner.name, level, as_count(tier.len()));
            }
        }
    }

    fn record(&self, operation: CacheOperation, activity: CacheActivity, level: Option<Tier>, duration: Option<Duration>) {
        self.inner.telemetry.record(self.inner.name, operation, activity, level, duration);
    }

    fn warn_failure(&self, operation: CacheOperation, level: Tier, key: &str, error: &Error) {
        tracing::warn!(
            cache.name = self.inner.name,
            cache.operation = operation.as_str(),
            cache.level = level.as_str(),
            cache.key = key,
            error = %error,
            "cache level operation failed"
        );
        self.record(operation, CacheActivity::Error, Some(level), None);
    }
}

fn as_count(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::thread;

    use opentelemetry::KeyValue;
    use strata_tier::EvictionPolicy;
    use tick::ClockControl;

    use super::*;
    use crate::MemoryTierConfig;
    use crate::telemetry::attributes;
    use crate::telemetry::metrics::{CACHE_EVENT_COUNT_NAME, CACHE_SIZE_NAME};
    use crate::telemetry::testing::{LogCapture, MetricTester};

    fn cache(clock: Clock) -> CacheManager<u32> {
        CacheManager::builder(clock)
            .name("test")
            .l1(MemoryTierConfig::new(2, EvictionPolicy::Lru))
            .l2(MemoryTierConfig::new(4, EvictionPolicy::Lru))
            .build()
            .unwrap()
    }

    fn event_count(tester: &MetricTester, activity: CacheActivity, level: Option<Tier>) -> u64 {
        let mut attrs = vec![KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str())];
        if let Some(level) = level {
            attrs.push(KeyValue::new(attributes::CACHE_LEVEL_NAME, level.as_str()));
        }
        tester.counter_value(CACHE_EVENT_COUNT_NAME, &attrs)
    }

    #[test]
    fn promotion_copies_entry_and_keeps_lower_copy() {
        let cache = cache(Clock::new_frozen());
        cache.set_with("k", 1, SetOptions::new().tier(Tier::L2)).unwrap();

        assert_eq!(cache.get("k"), Some(1));

        let state = cache.inner.state.lock();
        assert!(state.l1.contains("k"));
        assert!(state.l2.contains("k"));
    }

    #[test]
    fn set_removes_key_from_other_levels() {
        let cache = cache(Clock::new_frozen());
        cache.set_with("k", 1, SetOptions::new().tier(Tier::L2)).unwrap();
        cache.get("k");

        cache.set("k", 2).unwrap();

        let state = cache.inner.state.lock();
        assert!(state.l1.contains("k"));
        assert!(!state.l2.contains("k"));
    }

    #[test]
    fn set_into_missing_disk_level_fails_without_side_effects() {
        let cache = cache(Clock::new_frozen());
        cache.set("k", 1).unwrap();

        cache.set_with("k", 2, SetOptions::new().tier(Tier::L3)).unwrap_err();

        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.stats().l1.sets, 1);
    }

    #[test]
    fn demotion_moves_victims_down() {
        let cache = CacheManager::<u32>::builder(Clock::new_frozen())
            .l1(MemoryTierConfig::new(1, EvictionPolicy::Lru))
            .demote_on_evict(true)
            .build()
            .unwrap();

        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();

        assert_eq!(cache.locate("a"), Some(Tier::L2));
        assert_eq!(cache.locate("b"), Some(Tier::L1));
        let stats = cache.stats();
        assert_eq!(stats.l1.evictions, 1);
        assert_eq!(stats.l2.demotions, 1);
    }

    #[test]
    fn promotion_into_full_level_evicts_without_demotion() {
        let cache = cache(Clock::new_frozen());
        cache.set("a", 1).unwrap();
        cache.set("b", 2).unwrap();
        cache.set_with("c", 3, SetOptions::new().tier(Tier::L2)).unwrap();

        assert_eq!(cache.get("c"), Some(3));

        assert_eq!(cache.locate("a"), None);
        assert_eq!(cache.stats().l1.evictions, 1);
        assert_eq!(cache.stats().l2.entries, 1);
    }

    #[test]
    fn warmer_runs_outside_the_lock() {
        let cache = cache(Clock::new_frozen());
        let handle = cache.clone();
        cache.register_warmer("k", move || {
            // Would deadlock if the producer ran under the lock.
            handle.set("side", 7)?;
            Ok::<_, Error>(1)
        });

        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.get("side"), Some(7));
    }

    #[test]
    fn concurrent_cold_lookups_invoke_warmer_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = cache(Clock::new_frozen());
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&calls);
        cache.register_warmer("slow", move || {
            counted.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            Ok::<_, BoxError>(9)
        });

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| assert_eq!(cache.get("slow"), Some(9)));
            }
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.warmings, 1);
        assert_eq!(stats.hits() + stats.warmings, 8);
    }

    #[test]
    fn expired_lookup_counts_expiration_and_miss() {
        let control = ClockControl::new();
        let cache = cache(control.to_clock());
        cache.set_with("k", 1, SetOptions::new().ttl(Duration::from_millis(1))).unwrap();

        control.advance(Duration::from_millis(5));

        assert_eq!(cache.get("k"), None);
        let stats = cache.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.misses, 1);
        assert!(!cache.contains("k"));
    }

    #[test]
    fn telemetry_reports_hits_per_level_and_aggregated_evictions() {
        let tester = MetricTester::new();
        let cache = CacheManager::<u32>::builder(Clock::new_frozen())
            .name("metered")
            .l1(MemoryTierConfig::new(2, EvictionPolicy::Lru))
            .telemetry(CacheTelemetry::from_meter_provider(false, tester.meter_provider()))
            .build()
            .unwrap();

        cache.set_with("low", 1, SetOptions::new().tier(Tier::L2)).unwrap();
        cache.get("low");
        cache.get("low");
        cache.get("missing");
        for (key, value) in [("a", 1), ("b", 2), ("c", 3)] {
            cache.set(key, value).unwrap();
        }

        assert_eq!(event_count(&tester, CacheActivity::Hit, Some(Tier::L2)), 1);
        assert_eq!(event_count(&tester, CacheActivity::Hit, Some(Tier::L1)), 1);
        assert_eq!(event_count(&tester, CacheActivity::Promoted, Some(Tier::L1)), 1);
        assert_eq!(event_count(&tester, CacheActivity::Miss, None), 1);
        assert_eq!(event_count(&tester, CacheActivity::Inserted, Some(Tier::L1)), 3);
        assert_eq!(event_count(&tester, CacheActivity::Evicted, Some(Tier::L1)), 2);
        tester.assert_attributes_contain(&[KeyValue::new(attributes::CACHE_NAME, "metered")]);
    }

    #[test]
    fn promotion_reports_level_sizes() {
        let tester = MetricTester::new();
        let cache = CacheManager::<u32>::builder(Clock::new_frozen())
            .name("sized")
            .telemetry(CacheTelemetry::from_meter_provider(false, tester.meter_provider()))
            .build()
            .unwrap();
        cache.set_with("k", 1, SetOptions::new().tier(Tier::L2)).unwrap();

        let l1_size = [
            KeyValue::new(attributes::CACHE_NAME, "sized"),
            KeyValue::new(attributes::CACHE_LEVEL_NAME, Tier::L1.as_str()),
        ];
        assert_eq!(tester.gauge_value(CACHE_SIZE_NAME, &l1_size), Some(0));

        assert_eq!(cache.get("k"), Some(1));

        assert_eq!(tester.gauge_value(CACHE_SIZE_NAME, &l1_size), Some(1));
    }

    #[test]
    fn write_during_warm_is_not_overwritten() {
        let cache = cache(Clock::new_frozen());
        let writer = cache.clone();
        cache.register_warmer("k", move || {
            writer.set("k", 99)?;
            Ok::<_, Error>(1)
        });

        assert_eq!(cache.get("k"), Some(99));
        assert_eq!(cache.get("k"), Some(99));
        let stats = cache.stats();
        assert_eq!(stats.warmings, 0);
        assert_eq!(stats.l1.sets, 1);
    }

    #[test]
    fn delete_during_warm_discards_value() {
        let cache = cache(Clock::new_frozen());
        let deleter = cache.clone();
        cache.register_warmer("k", move || {
            deleter.delete("k");
            Ok::<_, Error>(1)
        });

        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.locate("k"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn failing_warmer_is_logged() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let cache = cache(Clock::new_frozen());
        cache.register_warmer("bad", || Err::<u32, _>("backend unavailable"));

        assert_eq!(cache.get("bad"), None);

        capture.assert_contains("warmer failed");
        capture.assert_contains("backend unavailable");
        let stats = cache.stats();
        assert_eq!(stats.warm_failures, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn logging_telemetry_emits_cache_events() {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let cache = CacheManager::<u32>::builder(Clock::new_frozen())
            .name("logged")
            .telemetry(CacheTelemetry::logs_only())
            .build()
            .unwrap();
        cache.set("k", 1).unwrap();
        cache.get("k");

        capture.assert_contains("logged");
        capture.assert_contains(CacheActivity::Inserted.as_str());
        capture.assert_contains(CacheActivity::Hit.as_str());
    }
}
