// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use serde::{Deserialize, Serialize};

/// Victim selection strategy of an in-memory tier.
///
/// Every variant is honored distinctly. Ties in [`Lfu`](Self::Lfu) and
/// [`Ttl`](Self::Ttl) are broken in favor of the least recently touched entry.
///
/// The disk tier has no policy: it always evicts the oldest inserted blob.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evicts the least recently touched entry.
    #[default]
    Lru,
    /// Evicts the entry with the lowest access count.
    Lfu,
    /// Evicts the oldest inserted entry; reads do not reorder.
    Fifo,
    /// Evicts the entry that expires first; entries without a TTL go last.
    Ttl,
    /// Evicts a uniformly sampled entry.
    Random,
}

impl EvictionPolicy {
    /// Returns the name used in logs and configuration.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lru => "lru",
            Self::Lfu => "lfu",
            Self::Fifo => "fifo",
            Self::Ttl => "ttl",
            Self::Random => "random",
        }
    }

    /// Returns `true` if a read moves the entry to the most-recent end.
    #[must_use]
    pub fn reorders_on_access(self) -> bool {
        !matches!(self, Self::Fifo)
    }
}
