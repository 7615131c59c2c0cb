// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Ordered in-memory tier for the strata multi-tier cache.
//!
//! This crate provides [`MemoryTier`], a capacity-bounded store that keeps its
//! entries in recency order and evicts according to an [`EvictionPolicy`].
//! Use [`MemoryTierBuilder`] to configure capacity and policy.
//!
//! # Quick Start
//!
//! ```
//! use std::time::SystemTime;
//!
//! use strata_memory::MemoryTier;
//! use strata_tier::{CacheEntry, CacheTier, Lookup, Tier};
//!
//! let mut tier = MemoryTier::<i32>::builder(Tier::L1).capacity(1000).build();
//! let now = SystemTime::UNIX_EPOCH;
//!
//! tier.insert(CacheEntry::new("key", 42, now))?;
//! let Lookup::Hit(entry) = tier.get("key", now)? else {
//!     panic!("expected a hit");
//! };
//! assert_eq!(*entry.value(), 42);
//! assert_eq!(entry.access_count(), 1);
//! # Ok::<(), strata_tier::Error>(())
//! ```
//!
//! # Policies
//!
//! - **LRU** and **FIFO** evict from the head of the recency list in O(1)
//! - **LFU** evicts the entry with the fewest reads
//! - **TTL** evicts the entry whose deadline comes first
//! - **Random** evicts a uniformly sampled entry
//!
//! [`EvictionPolicy`]: strata_tier::EvictionPolicy

pub mod builder;
mod order;
pub mod tier;

#[doc(inline)]
pub use builder::{DEFAULT_L1_CAPACITY, DEFAULT_L2_CAPACITY, MemoryTierBuilder};
#[doc(inline)]
pub use tier::MemoryTier;
