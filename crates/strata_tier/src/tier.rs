// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The tier identifiers and the core trait for tier storage.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{CacheEntry, Result};

/// One of the three cache levels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Fast, small in-memory level.
    #[default]
    L1,
    /// Larger in-memory level.
    L2,
    /// Disk level.
    L3,
}

impl Tier {
    /// All tiers in lookup order.
    pub const ALL: [Self; 3] = [Self::L1, Self::L2, Self::L3];

    /// Returns the name used in logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::L3 => "l3",
        }
    }

    /// Returns the tier a hit in this tier is promoted into.
    ///
    /// Promotion is always exactly one level up.
    #[must_use]
    pub fn promotion_target(self) -> Option<Self> {
        match self {
            Self::L1 => None,
            Self::L2 => Some(Self::L1),
            Self::L3 => Some(Self::L2),
        }
    }

    /// Returns the tier a victim of this tier is demoted into.
    #[must_use]
    pub fn demotion_target(self) -> Option<Self> {
        match self {
            Self::L1 => Some(Self::L2),
            Self::L2 => Some(Self::L3),
            Self::L3 => None,
        }
    }

    /// Returns the position of this tier in [`Tier::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a tier lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    /// The key was present and live; the returned copy is already touched.
    Hit(CacheEntry<V>),
    /// The key was present but expired and has been removed.
    Expired,
    /// The key was not present.
    Miss,
}

/// An entry removed to satisfy a tier's capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct Evicted<V> {
    /// The evicted key.
    pub key: String,
    /// The evicted entry, when the tier holds it in memory.
    ///
    /// Tiers that keep entries serialized report only the key.
    pub entry: Option<CacheEntry<V>>,
}

/// Trait for tier storage.
///
/// A tier is owned by exactly one cache manager and is mutated through `&mut self`;
/// implementations do not need interior locking.
///
/// Only [`enforce_capacity`](Self::enforce_capacity) and [`is_empty`](Self::is_empty)
/// have default implementations.
pub trait CacheTier<V>: Send {
    /// Looks a key up, touching it on a hit and removing it if expired.
    fn get(&mut self, key: &str, now: SystemTime) -> Result<Lookup<V>>;

    /// Inserts an entry, replacing any entry with the same key.
    ///
    /// Insertion never evicts; see [`enforce_capacity`](Self::enforce_capacity).
    fn insert(&mut self, entry: CacheEntry<V>) -> Result<()>;

    /// Removes a key, returning `true` if it was present.
    fn remove(&mut self, key: &str) -> Result<bool>;

    /// Selects and removes one victim, returning `None` if the tier is empty.
    fn evict(&mut self) -> Result<Option<Evicted<V>>>;

    /// Removes every entry.
    fn clear(&mut self) -> Result<()>;

    /// Removes every expired entry, returning how many were removed.
    fn purge_expired(&mut self, now: SystemTime) -> Result<usize>;

    /// Returns `true` if the key is present, without touching it.
    fn contains(&self, key: &str) -> bool;

    /// Returns the number of entries.
    fn len(&self) -> usize;

    /// Returns the maximum number of entries.
    fn capacity(&self) -> usize;

    /// Returns the sum of the approximate sizes of all entries.
    fn size_bytes(&self) -> u64;

    /// Returns `true` if the tier holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts victims until the tier is within its capacity.
    fn enforce_capacity(&mut self) -> Result<Vec<Evicted<V>>> {
        let mut evicted = Vec::new();
        while self.len() > self.capacity() {
            match self.evict()? {
                Some(victim) => evicted.push(victim),
                None => break,
            }
        }
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promotion_moves_exactly_one_level_up() {
        assert_eq!(Tier::L1.promotion_target(), None);
        assert_eq!(Tier::L2.promotion_target(), Some(Tier::L1));
        assert_eq!(Tier::L3.promotion_target(), Some(Tier::L2));
    }

    #[test]
    fn demotion_moves_exactly_one_level_down() {
        assert_eq!(Tier::L1.demotion_target(), Some(Tier::L2));
        assert_eq!(Tier::L2.demotion_target(), Some(Tier::L3));
        assert_eq!(Tier::L3.demotion_target(), None);
    }

    #[test]
    fn index_matches_lookup_order() {
        for (position, tier) in Tier::ALL.into_iter().enumerate() {
            assert_eq!(tier.index(), position);
        }
    }

    #[test]
    fn display_uses_level_name() {
        assert_eq!(Tier::L2.to_string(), "l2");
        let parsed: Tier = serde_json::from_str("\"l3\"").expect("valid tier name");
        assert_eq!(parsed, Tier::L3);
    }
}
