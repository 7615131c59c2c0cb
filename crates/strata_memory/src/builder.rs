// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring in-memory tiers.

use std::marker::PhantomData;

use strata_tier::{EvictionPolicy, Tier};

use crate::tier::MemoryTier;

/// Default capacity of an L1 tier, in entries.
pub const DEFAULT_L1_CAPACITY: usize = 128;

/// Default capacity of an L2 tier, in entries.
pub const DEFAULT_L2_CAPACITY: usize = 1024;

/// Builder for configuring a [`MemoryTier`].
///
/// The default capacity depends on the level: [`DEFAULT_L1_CAPACITY`] for
/// [`Tier::L1`] and [`DEFAULT_L2_CAPACITY`] otherwise. The default policy is
/// [`EvictionPolicy::Lru`].
///
/// # Examples
///
/// ```
/// use strata_memory::MemoryTier;
/// use strata_tier::{CacheTier, EvictionPolicy, Tier};
///
/// let tier = MemoryTier::<String>::builder(Tier::L2)
///     .capacity(10_000)
///     .policy(EvictionPolicy::Lfu)
///     .initial_capacity(100)
///     .build();
///
/// assert_eq!(tier.capacity(), 10_000);
/// assert_eq!(tier.policy(), EvictionPolicy::Lfu);
/// ```
#[derive(Debug)]
pub struct MemoryTierBuilder<V> {
    pub(crate) level: Tier,
    pub(crate) capacity: usize,
    pub(crate) policy: EvictionPolicy,
    pub(crate) initial_capacity: Option<usize>,
    _phantom: PhantomData<V>,
}

impl<V> MemoryTierBuilder<V> {
    /// Creates a builder with the defaults for `level`.
    #[must_use]
    pub fn new(level: Tier) -> Self {
        let capacity = match level {
            Tier::L1 => DEFAULT_L1_CAPACITY,
            Tier::L2 | Tier::L3 => DEFAULT_L2_CAPACITY,
        };
        Self {
            level,
            capacity,
            policy: EvictionPolicy::default(),
            initial_capacity: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the maximum number of entries.
    ///
    /// A capacity of zero is allowed: every insert is then evicted by the next
    /// capacity check.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the eviction policy.
    #[must_use]
    pub fn policy(mut self, policy: EvictionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets a pre-allocation hint for the index.
    #[must_use]
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = Some(capacity);
        self
    }

    /// Builds the configured [`MemoryTier`].
    #[must_use]
    pub fn build(self) -> MemoryTier<V> {
        MemoryTier::from_builder(&self)
    }
}
