// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use strata_tier::{Metadata, Tier};

/// Per-call options of [`CacheManager::set_with`](crate::CacheManager::set_with).
///
/// Unset fields fall back to the manager's defaults.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata::{SetOptions, Tier};
///
/// let options = SetOptions::new()
///     .ttl(Duration::from_secs(30))
///     .tier(Tier::L2)
///     .metadata("source", "import");
///
/// assert_eq!(options.get_tier(), Some(Tier::L2));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    pub(crate) ttl: Option<Duration>,
    pub(crate) tier: Option<Tier>,
    pub(crate) metadata: Metadata,
}

impl SetOptions {
    /// Creates options that use every manager default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time-to-live of the entry, overriding the manager's default TTL.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Sets the level the entry is stored in, overriding the manager's default tier.
    #[must_use]
    pub fn tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Attaches one metadata field to the entry.
    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Returns the configured time-to-live.
    #[must_use]
    pub fn get_ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the configured target level.
    #[must_use]
    pub fn get_tier(&self) -> Option<Tier> {
        self.tier
    }

    /// Returns the metadata attached so far.
    #[must_use]
    pub fn get_metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_unset() {
        let options = SetOptions::new();
        assert_eq!(options.get_ttl(), None);
        assert_eq!(options.get_tier(), None);
        assert!(options.get_metadata().is_empty());
    }

    #[test]
    fn metadata_accumulates() {
        let options = SetOptions::new().metadata("a", 1).metadata("b", "two").metadata("a", true);

        assert_eq!(options.get_metadata().len(), 2);
        assert_eq!(options.get_metadata()["a"], serde_json::json!(true));
        assert_eq!(options.get_metadata()["b"], serde_json::json!("two"));
    }
}
