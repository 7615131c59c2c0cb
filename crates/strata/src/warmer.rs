// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Warmer registry with per-key in-flight suppression.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use strata_tier::BoxError;

/// A registered value producer.
pub(crate) type Producer<V> = Arc<dyn Fn() -> Result<V, BoxError> + Send + Sync>;

/// Outcome of [`CacheManager::warm_all`](crate::CacheManager::warm_all) and
/// [`CacheManager::warm_keys`](crate::CacheManager::warm_keys).
///
/// A key whose warm overlapped with a concurrent warm, write or delete is
/// counted by what the cache holds afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    /// Keys that hold a value after warming.
    pub warmed: usize,
    /// Keys whose producer failed, whose value could not be stored, or that are absent after warming.
    pub failed: usize,
}

impl WarmReport {
    pub(crate) fn tally(&mut self, warmed: bool) {
        if warmed {
            self.warmed += 1;
        } else {
            self.failed += 1;
        }
    }
}

pub(crate) struct WarmerRegistry<V> {
    producers: RwLock<HashMap<String, Producer<V>>>,
    /// Keys being warmed, mapped to whether a write superseded the warm.
    in_flight: Mutex<HashMap<String, bool>>,
    finished: Condvar,
}

impl<V> Debug for WarmerRegistry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarmerRegistry")
            .field("warmers", &self.producers.read().len())
            .field("in_flight", &self.in_flight.lock().len())
            .finish()
    }
}

impl<V> Default for WarmerRegistry<V> {
    fn default() -> Self {
        Self {
            producers: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            finished: Condvar::new(),
        }
    }
}

impl<V> WarmerRegistry<V> {
    /// Registers a producer, returning `true` if it replaced an existing one.
    pub(crate) fn register(&self, key: String, producer: Producer<V>) -> bool {
        self.producers.write().insert(key, producer).is_some()
    }

    pub(crate) fn unregister(&self, key: &str) -> bool {
        self.producers.write().remove(key).is_some()
    }

    pub(crate) fn producer(&self, key: &str) -> Option<Producer<V>> {
        self.producers.read().get(key).map(Arc::clone)
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.producers.read().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }

    /// Marks the key as in-flight, returning a guard that clears the mark on drop.
    ///
    /// Returns `None` if a warm of the key is already in flight.
    pub(crate) fn try_start(&self, key: &str) -> Option<InFlight<'_, V>> {
        let mut in_flight = self.in_flight.lock();
        if in_flight.contains_key(key) {
            return None;
        }
        in_flight.insert(key.to_owned(), false);
        Some(InFlight {
            registry: self,
            key: key.to_owned(),
        })
    }

    /// Marks an in-flight warm of the key as superseded; its value must not be stored.
    pub(crate) fn supersede(&self, key: &str) {
        if let Some(superseded) = self.in_flight.lock().get_mut(key) {
            *superseded = true;
        }
    }

    /// Marks every in-flight warm as superseded.
    pub(crate) fn supersede_all(&self) {
        self.in_flight.lock().values_mut().for_each(|superseded| *superseded = true);
    }

    /// Blocks until no warm of the key is in flight.
    pub(crate) fn wait_for(&self, key: &str) {
        let mut in_flight = self.in_flight.lock();
        while in_flight.contains_key(key) {
            self.finished.wait(&mut in_flight);
        }
    }

    fn finish(&self, key: &str) {
        self.in_flight.lock().remove(key);
        self.finished.notify_all();
    }
}

/// Marks one key as being warmed; the mark is cleared when dropped, including on unwind.
#[derive(Debug)]
pub(crate) struct InFlight<'a, V> {
    registry: &'a WarmerRegistry<V>,
    key: String,
}

impl<V> InFlight<'_, V> {
    /// Returns `true` if a write or delete of the key happened since the warm started.
    pub(crate) fn is_superseded(&self) -> bool {
        self.registry.in_flight.lock().get(&self.key).copied().unwrap_or(true)
    }
}

impl<V> Drop for InFlight<'_, V> {
    fn drop(&mut self) {
        self.registry.finish(&self.key);
    }
}
