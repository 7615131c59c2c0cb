// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core tier abstractions for the strata multi-tier cache.
//!
//! This crate defines the [`CacheTier`] trait that every storage level satisfies,
//! along with [`CacheEntry`] for storing values with access metadata, the [`Tier`]
//! identifiers of the three cache levels, the [`EvictionPolicy`] options of the
//! in-memory levels, and the [`Error`] type for fallible operations.
//!
//! # Overview
//!
//! A tier is a plain, single-owner store: it is mutated through `&mut self` and
//! never locks internally. The `strata` crate owns all three tiers behind one
//! lock and implements lookup cascading, promotion and warming on top.
//!
//! # Implementing a Cache Tier
//!
//! ```
//! use std::collections::HashMap;
//! use std::time::SystemTime;
//!
//! use strata_tier::{CacheEntry, CacheTier, Evicted, Lookup, Result};
//!
//! struct Unbounded<V>(HashMap<String, CacheEntry<V>>);
//!
//! impl<V: Clone + Send> CacheTier<V> for Unbounded<V> {
//!     fn get(&mut self, key: &str, now: SystemTime) -> Result<Lookup<V>> {
//!         Ok(match self.0.get_mut(key) {
//!             Some(entry) => {
//!                 entry.touch(now);
//!                 Lookup::Hit(entry.clone())
//!             }
//!             None => Lookup::Miss,
//!         })
//!     }
//!
//!     fn insert(&mut self, entry: CacheEntry<V>) -> Result<()> {
//!         self.0.insert(entry.key().to_owned(), entry);
//!         Ok(())
//!     }
//!
//!     fn remove(&mut self, key: &str) -> Result<bool> {
//!         Ok(self.0.remove(key).is_some())
//!     }
//!
//!     fn evict(&mut self) -> Result<Option<Evicted<V>>> {
//!         Ok(None)
//!     }
//!
//!     fn clear(&mut self) -> Result<()> {
//!         self.0.clear();
//!         Ok(())
//!     }
//!
//!     fn purge_expired(&mut self, now: SystemTime) -> Result<usize> {
//!         let before = self.0.len();
//!         self.0.retain(|_, entry| !entry.is_expired(now));
//!         Ok(before - self.0.len())
//!     }
//!
//!     fn contains(&self, key: &str) -> bool {
//!         self.0.contains_key(key)
//!     }
//!
//!     fn len(&self) -> usize {
//!         self.0.len()
//!     }
//!
//!     fn capacity(&self) -> usize {
//!         usize::MAX
//!     }
//!
//!     fn size_bytes(&self) -> u64 {
//!         self.0.values().map(CacheEntry::size_bytes).sum()
//!     }
//! }
//! ```

mod entry;
pub mod error;
mod policy;
mod tier;

#[doc(inline)]
pub use entry::{CacheEntry, DEFAULT_ENTRY_SIZE, Metadata};
#[doc(inline)]
pub use error::{BoxError, Error, Result};
#[doc(inline)]
pub use policy::EvictionPolicy;
#[doc(inline)]
pub use tier::{CacheTier, Evicted, Lookup, Tier};
