// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A three-level cache with in-memory L1 and L2 levels and an optional disk L3.
//!
//! This crate provides [`CacheManager`], which combines:
//! - Two capacity-bounded in-memory levels with LRU, LFU, FIFO, TTL or random eviction
//! - A disk level storing one JSON blob per entry
//! - Promotion of hits one level up, and optional demotion of evicted entries
//! - Per-entry TTLs with lazy expiry on lookup and a periodic [`ExpirySweeper`]
//! - Warmers producing values on a miss, with duplicate work suppressed per key
//! - Hit, miss and eviction statistics, plus OpenTelemetry metrics and structured logs
//!
//! # Examples
//!
//! ## Basic Cache
//!
//! ```
//! use strata::CacheManager;
//! use tick::Clock;
//!
//! let cache = CacheManager::<i32>::builder(Clock::new_frozen()).build()?;
//!
//! cache.set("key", 42)?;
//! assert_eq!(cache.get("key"), Some(42));
//! # Ok::<(), strata::Error>(())
//! ```
//!
//! ## Disk Level, TTL and Warmers
//!
//! ```
//! use std::time::Duration;
//!
//! use strata::{CacheManager, SetOptions, Tier};
//! use tick::Clock;
//!
//! let dir = tempfile::tempdir()?;
//! let cache = CacheManager::<String>::builder(Clock::new_frozen())
//!     .disk(dir.path())
//!     .default_ttl(Duration::from_secs(60))
//!     .build()?;
//!
//! cache.set_with("report", "large".to_string(), SetOptions::new().tier(Tier::L3))?;
//! cache.register_warmer("config", || Ok::<_, std::io::Error>("defaults".to_string()));
//!
//! // The L3 hit is copied into L2; the warmed value is stored in L1.
//! assert_eq!(cache.get("report").as_deref(), Some("large"));
//! assert_eq!(cache.locate("report"), Some(Tier::L2));
//! assert_eq!(cache.get("config").as_deref(), Some("defaults"));
//! assert_eq!(cache.locate("config"), Some(Tier::L1));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod builder;
mod manager;
mod options;
mod stats;
mod sweeper;
mod telemetry;
mod warmer;

#[doc(inline)]
pub use builder::{CacheConfig, CacheManagerBuilder, MemoryTierConfig};
#[doc(inline)]
pub use manager::{CacheManager, CacheName, CacheValue};
#[doc(inline)]
pub use options::SetOptions;
#[doc(inline)]
pub use stats::{CacheStats, LevelStats};
#[doc(inline)]
pub use strata_tier::{BoxError, CacheEntry, Error, EvictionPolicy, Metadata, Result, Tier};
#[doc(inline)]
pub use sweeper::ExpirySweeper;
#[doc(inline)]
pub use telemetry::CacheTelemetry;
#[doc(inline)]
pub use warmer::WarmReport;
