// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Periodic removal of expired entries.

use std::fmt::Debug;
use std::sync::Weak;
use std::time::Duration;

use futures::StreamExt;
use tick::PeriodicTimer;

use crate::manager::{CacheManager, CacheValue, Inner};

/// Drives [`CacheManager::sweep_expired`] on a fixed period.
///
/// The sweeper holds only a weak reference to the cache: once every
/// [`CacheManager`] handle is dropped, [`run`](Self::run) returns and
/// [`tick`](Self::tick) yields `None`. Lookups still expire entries lazily;
/// the sweeper only bounds how long unread expired entries occupy a level.
///
/// The sweeper does not spawn anything itself. Hand the future returned by
/// [`run`](Self::run) to the runtime of your choice.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use strata::CacheManager;
/// use tick::Clock;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), strata::Error> {
/// let cache = CacheManager::<String>::builder(Clock::new_tokio()).build()?;
///
/// let sweeper = cache.sweeper(Duration::from_millis(10));
/// let task = tokio::spawn(sweeper.run());
///
/// drop(cache);
/// task.await.expect("sweeper task completes once the cache is gone");
/// # Ok(())
/// # }
/// ```
pub struct ExpirySweeper<V> {
    cache: Weak<Inner<V>>,
    timer: PeriodicTimer,
    period: Duration,
}

impl<V> Debug for ExpirySweeper<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpirySweeper")
            .field("period", &self.period)
            .field("alive", &(self.cache.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl<V: CacheValue> ExpirySweeper<V> {
    pub(crate) fn new(cache: &CacheManager<V>, period: Duration) -> Self {
        Self {
            cache: cache.downgrade(),
            timer: PeriodicTimer::new(cache.clock(), period),
            period,
        }
    }

    /// Returns the sweep period.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Waits for the next period and sweeps once.
    ///
    /// Returns the number of entries removed, or `None` once the cache has been dropped.
    pub async fn tick(&mut self) -> Option<usize> {
        self.timer.next().await?;
        let cache = CacheManager::upgrade(&self.cache)?;
        Some(cache.sweep_expired())
    }

    /// Sweeps every period until the cache is dropped.
    pub async fn run(mut self) {
        while let Some(removed) = self.tick().await {
            if removed > 0 {
                tracing::debug!(removed, "expiry sweep removed entries");
            }
        }
    }
}
