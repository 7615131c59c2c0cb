// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Extension traits for telemetry recording.

use std::time::Duration;

use strata_tier::Tier;
use tick::Clock;

use crate::manager::CacheName;
use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry};

/// Result of a timed operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimedResult<R> {
    /// The result of the operation.
    pub result: R,
    /// The duration of the operation.
    pub duration: Duration,
}

/// Extension trait for timing operations.
pub(crate) trait ClockExt {
    /// Runs `f` and returns both its result and the elapsed duration.
    fn timed<R>(&self, f: impl FnOnce() -> R) -> TimedResult<R>;
}

impl ClockExt for Clock {
    fn timed<R>(&self, f: impl FnOnce() -> R) -> TimedResult<R> {
        let stopwatch = self.stopwatch();
        let result = f();
        TimedResult {
            result,
            duration: stopwatch.elapsed(),
        }
    }
}

pub(crate) trait CacheTelemetryExt {
    /// Records a cache event if telemetry is enabled.
    fn record(&self, name: CacheName, operation: CacheOperation, activity: CacheActivity, level: Option<Tier>, duration: Option<Duration>);

    /// Records an aggregated count if telemetry is enabled.
    fn record_count(&self, name: CacheName, operation: CacheOperation, activity: CacheActivity, level: Option<Tier>, count: u64);

    /// Records the size of a level if telemetry is enabled.
    fn record_size(&self, name: CacheName, level: Tier, size: u64);
}

impl CacheTelemetryExt for Option<CacheTelemetry> {
    fn record(&self, name: CacheName, operation: CacheOperation, activity: CacheActivity, level: Option<Tier>, duration: Option<Duration>) {
        if let Some(t) = self {
            t.record(name, operation, activity, level, duration);
        }
    }

    fn record_count(&self, name: CacheName, operation: CacheOperation, activity: CacheActivity, level: Option<Tier>, count: u64) {
        if let Some(t) = self {
            t.record_count(name, operation, activity, level, count);
        }
    }

    fn record_size(&self, name: CacheName, level: Tier, size: u64) {
        if let Some(t) = self {
            t.record_size(name, level, size);
        }
    }
}
