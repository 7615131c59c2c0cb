// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tests for the provided methods of `CacheTier`.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use strata_tier::{CacheEntry, CacheTier, Evicted, Lookup, Result};

/// Minimal insertion-ordered tier used to exercise the default methods.
struct QueueTier {
    entries: VecDeque<CacheEntry<u32>>,
    capacity: usize,
}

impl QueueTier {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }
}

impl CacheTier<u32> for QueueTier {
    fn get(&mut self, key: &str, now: SystemTime) -> Result<Lookup<u32>> {
        let Some(position) = self.entries.iter().position(|e| e.key() == key) else {
            return Ok(Lookup::Miss);
        };
        if self.entries[position].is_expired(now) {
            self.entries.remove(position);
            return Ok(Lookup::Expired);
        }
        self.entries[position].touch(now);
        Ok(Lookup::Hit(self.entries[position].clone()))
    }

    fn insert(&mut self, entry: CacheEntry<u32>) -> Result<()> {
        self.entries.retain(|e| e.key() != entry.key());
        self.entries.push_back(entry);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let before = self.entries.len();
        self.entries.retain(|e| e.key() != key);
        Ok(before != self.entries.len())
    }

    fn evict(&mut self) -> Result<Option<Evicted<u32>>> {
        Ok(self.entries.pop_front().map(|entry| Evicted {
            key: entry.key().to_owned(),
            entry: Some(entry),
        }))
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn purge_expired(&mut self, now: SystemTime) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|e| !e.is_expired(now));
        Ok(before - self.entries.len())
    }

    fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key() == key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn size_bytes(&self) -> u64 {
        self.entries.iter().map(CacheEntry::size_bytes).sum()
    }
}

fn entry(key: &str, value: u32) -> CacheEntry<u32> {
    CacheEntry::new(key, value, SystemTime::UNIX_EPOCH)
}

#[test]
fn enforce_capacity_evicts_until_within_bounds() -> Result<()> {
    let mut tier = QueueTier::new(2);
    for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
        tier.insert(entry(key, u32::try_from(i).expect("small index")))?;
    }

    let evicted = tier.enforce_capacity()?;

    let keys: Vec<_> = evicted.iter().map(|v| v.key.as_str()).collect();
    assert_eq!(keys, ["a", "b"]);
    assert_eq!(tier.len(), 2);
    assert!(tier.contains("c"));
    assert!(tier.contains("d"));
    Ok(())
}

#[test]
fn enforce_capacity_is_noop_within_bounds() -> Result<()> {
    let mut tier = QueueTier::new(4);
    tier.insert(entry("a", 1))?;

    assert!(tier.enforce_capacity()?.is_empty());
    assert_eq!(tier.len(), 1);
    Ok(())
}

#[test]
fn is_empty_follows_len() -> Result<()> {
    let mut tier = QueueTier::new(1);
    assert!(tier.is_empty());

    tier.insert(entry("a", 1))?;
    assert!(!tier.is_empty());
    Ok(())
}

#[test]
fn expired_lookup_removes_entry() -> Result<()> {
    let mut tier = QueueTier::new(1);
    tier.insert(entry("a", 1).with_ttl(Some(Duration::from_millis(1))))?;

    let later = SystemTime::UNIX_EPOCH + Duration::from_millis(5);
    assert_eq!(tier.get("a", later)?, Lookup::Expired);
    assert!(!tier.contains("a"));
    Ok(())
}
