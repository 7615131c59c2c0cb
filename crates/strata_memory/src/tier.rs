// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory tier implementation.

use std::collections::HashMap;
use std::time::SystemTime;

use strata_tier::{CacheEntry, CacheTier, EvictionPolicy, Evicted, Lookup, Result, Tier};

use crate::builder::MemoryTierBuilder;
use crate::order::{NodeIndex, RecencyList};

#[derive(Debug)]
struct Slot<V> {
    entry: CacheEntry<V>,
    node: NodeIndex,
}

/// An ordered, capacity-bounded in-memory tier.
///
/// Entries are kept in a hash map for lookup and in a recency list for victim
/// selection. The list is ordered oldest first; a read moves the entry to the
/// most recent end unless the policy is [`EvictionPolicy::Fifo`].
///
/// Capacity is counted in entries. Inserting never evicts by itself; call
/// [`CacheTier::enforce_capacity`] after inserting.
///
/// # Examples
///
/// ```
/// use std::time::SystemTime;
///
/// use strata_memory::MemoryTier;
/// use strata_tier::{CacheEntry, CacheTier, EvictionPolicy, Lookup, Tier};
///
/// let mut tier = MemoryTier::<i32>::builder(Tier::L1)
///     .capacity(2)
///     .policy(EvictionPolicy::Lru)
///     .build();
///
/// let now = SystemTime::UNIX_EPOCH;
/// tier.insert(CacheEntry::new("a", 1, now))?;
/// tier.insert(CacheEntry::new("b", 2, now))?;
/// tier.get("a", now)?;
/// tier.insert(CacheEntry::new("c", 3, now))?;
///
/// let evicted = tier.enforce_capacity()?;
/// assert_eq!(evicted[0].key, "b");
/// assert!(matches!(tier.get("a", now)?, Lookup::Hit(_)));
/// # Ok::<(), strata_tier::Error>(())
/// ```
#[derive(Debug)]
pub struct MemoryTier<V> {
    level: Tier,
    capacity: usize,
    policy: EvictionPolicy,
    entries: HashMap<String, Slot<V>>,
    order: RecencyList<String>,
    size_bytes: u64,
}

impl<V> MemoryTier<V> {
    /// Creates a builder for a tier serving the given level.
    #[must_use]
    pub fn builder(level: Tier) -> MemoryTierBuilder<V> {
        MemoryTierBuilder::new(level)
    }

    pub(crate) fn from_builder(builder: &MemoryTierBuilder<V>) -> Self {
        Self {
            level: builder.level,
            capacity: builder.capacity,
            policy: builder.policy,
            entries: HashMap::with_capacity(builder.initial_capacity.unwrap_or(0)),
            order: RecencyList::new(),
            size_bytes: 0,
        }
    }

    /// Returns the level this tier serves.
    #[must_use]
    pub fn level(&self) -> Tier {
        self.level
    }

    /// Returns the eviction policy of this tier.
    #[must_use]
    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Iterates keys from the next victim candidate under LRU/FIFO to the most recent.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    fn take(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let slot = self.entries.remove(key)?;
        self.order.remove(slot.node);
        self.size_bytes = self.size_bytes.saturating_sub(slot.entry.size_bytes());
        Some(slot.entry)
    }

    fn select_victim(&self) -> Option<String> {
        let victim = match self.policy {
            EvictionPolicy::Lru | EvictionPolicy::Fifo => self.order.front().and_then(|idx| self.order.key(idx)),
            EvictionPolicy::Lfu => self.first_min_by_key(|entry| entry.access_count()),
            // `None < Some(_)`, so entries without a TTL are ranked behind every deadline.
            EvictionPolicy::Ttl => self.first_min_by_key(|entry| (entry.expires_at().is_none(), entry.expires_at())),
            EvictionPolicy::Random => {
                (!self.order.is_empty())
                    .then(|| fastrand::usize(..self.order.len()))
                    .and_then(|n| self.order.iter().nth(n))
            }
        };
        victim.cloned()
    }

    /// Returns the oldest key with the smallest rank.
    fn first_min_by_key<R: Ord>(&self, rank: impl Fn(&CacheEntry<V>) -> R) -> Option<&String> {
        let mut best: Option<(&String, R)> = None;
        for key in self.order.iter() {
            let Some(slot) = self.entries.get(key) else { continue };
            let candidate = rank(&slot.entry);
            if best.as_ref().is_none_or(|(_, current)| candidate < *current) {
                best = Some((key, candidate));
            }
        }
        best.map(|(key, _)| key)
    }
}

impl<V> CacheTier<V> for MemoryTier<V>
where
    V: Clone + Send,
{
    fn get(&mut self, key: &str, now: SystemTime) -> Result<Lookup<V>> {
        let Some(slot) = self.entries.get_mut(key) else {
            return Ok(Lookup::Miss);
        };

        if slot.entry.is_expired(now) {
            self.take(key);
            return Ok(Lookup::Expired);
        }

        slot.entry.touch(now);
        let node = slot.node;
        let hit = slot.entry.clone();
        if self.policy.reorders_on_access() {
            self.order.move_to_back(node);
        }
        Ok(Lookup::Hit(hit))
    }

    fn insert(&mut self, entry: CacheEntry<V>) -> Result<()> {
        self.take(entry.key());
        self.size_bytes = self.size_bytes.saturating_add(entry.size_bytes());
        let node = self.order.push_back(entry.key().to_owned());
        self.entries.insert(entry.key().to_owned(), Slot { entry, node });
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.take(key).is_some())
    }

    fn evict(&mut self) -> Result<Option<Evicted<V>>> {
        let Some(key) = self.select_victim() else {
            return Ok(None);
        };
        let entry = self.take(&key);
        Ok(Some(Evicted { key, entry }))
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.order.clear();
        self.size_bytes = 0;
        Ok(())
    }

    fn purge_expired(&mut self, now: SystemTime) -> Result<usize> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.take(key);
        }
        Ok(expired.len())
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}
