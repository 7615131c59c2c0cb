// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

/// Size charged to an entry whose value cannot be serialized.
pub const DEFAULT_ENTRY_SIZE: u64 = 1024;

/// Free-form metadata attached to an entry.
pub type Metadata = HashMap<String, serde_json::Value>;

/// A cached value with its access metadata.
///
/// The entry records when it was created and last read, how often it was read,
/// an optional time-to-live and an approximate size. The size is computed once,
/// when the entry is created, by serializing the value; it is never recomputed.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, SystemTime};
///
/// use strata_tier::CacheEntry;
///
/// let now = SystemTime::UNIX_EPOCH;
/// let entry = CacheEntry::new("answer", 42, now).with_ttl(Some(Duration::from_secs(60)));
///
/// assert_eq!(*entry.value(), 42);
/// assert_eq!(entry.ttl(), Some(Duration::from_secs(60)));
/// assert!(!entry.is_expired(now + Duration::from_secs(60)));
/// assert!(entry.is_expired(now + Duration::from_secs(61)));
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    key: String,
    value: V,
    created_at: SystemTime,
    last_accessed: SystemTime,
    access_count: u64,
    ttl: Option<Duration>,
    size_bytes: u64,
    metadata: Metadata,
}

impl<V: Serialize> CacheEntry<V> {
    /// Creates an entry created and last accessed at `now`.
    ///
    /// The size is estimated from the serialized value and falls back to
    /// [`DEFAULT_ENTRY_SIZE`] when the value cannot be serialized.
    pub fn new(key: impl Into<String>, value: V, now: SystemTime) -> Self {
        let size_bytes = serde_json::to_vec(&value).map_or(DEFAULT_ENTRY_SIZE, |bytes| bytes.len() as u64);
        Self {
            key: key.into(),
            value,
            created_at: now,
            last_accessed: now,
            access_count: 0,
            ttl: None,
            size_bytes,
            metadata: Metadata::new(),
        }
    }
}

impl<V> CacheEntry<V> {
    /// Sets the time-to-live of this entry.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Replaces the metadata of this entry.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns `true` if a TTL is set and `now` lies past `created_at + ttl`.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at().is_some_and(|deadline| now > deadline)
    }

    /// Returns the instant after which the entry is expired, if it has a TTL.
    #[must_use]
    pub fn expires_at(&self) -> Option<SystemTime> {
        self.ttl.and_then(|ttl| self.created_at.checked_add(ttl))
    }

    /// Records a read: updates `last_accessed` and increments the access count.
    pub fn touch(&mut self, now: SystemTime) {
        self.last_accessed = now;
        self.access_count = self.access_count.saturating_add(1);
    }

    /// Returns the key of this entry.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the inner value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns when the entry was created.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns when the entry was last read.
    #[must_use]
    pub fn last_accessed(&self) -> SystemTime {
        self.last_accessed
    }

    /// Returns how many times the entry has been read.
    #[must_use]
    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Returns the time-to-live, if set.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the approximate size computed when the entry was created.
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns the metadata attached to this entry.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
