// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry implementation and recording.

use std::sync::Arc;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::logs::Severity;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, MeterProvider};
use strata_tier::Tier;

use crate::manager::CacheName;
use crate::telemetry::metrics::{create_cache_size_gauge, create_event_counter, create_meter, create_operation_duration_histogram};
use crate::telemetry::{CacheActivity, CacheOperation, CacheTelemetry, attributes};

/// Maximum attributes per event: name, operation, activity, level.
const MAX_ATTRIBUTES: usize = 4;

#[derive(Clone, Debug)]
pub(crate) struct CacheTelemetryInner {
    logging_enabled: bool,
    event_counter: Option<Counter<u64>>,
    operation_duration: Option<Histogram<f64>>,
    cache_size: Option<Gauge<u64>>,
}

impl CacheTelemetry {
    /// Creates a new cache telemetry collector.
    ///
    /// # Arguments
    ///
    /// * `logging_enabled` - Whether cache events are emitted as `tracing` events
    /// * `meter` - The meter used to create instruments; `None` disables metrics
    #[must_use]
    pub fn new(logging_enabled: bool, meter: Option<&Meter>) -> Self {
        Self {
            inner: Arc::new(CacheTelemetryInner {
                logging_enabled,
                event_counter: meter.map(create_event_counter),
                operation_duration: meter.map(create_operation_duration_histogram),
                cache_size: meter.map(create_cache_size_gauge),
            }),
        }
    }

    /// Creates a collector whose instruments come from the `strata` meter of `provider`.
    #[must_use]
    pub fn from_meter_provider(logging_enabled: bool, provider: &dyn MeterProvider) -> Self {
        Self::new(logging_enabled, Some(&create_meter(provider)))
    }

    /// Creates a collector that only emits `tracing` events.
    #[must_use]
    pub fn logs_only() -> Self {
        Self::new(true, None)
    }

    /// Records a single cache event.
    ///
    /// # Arguments
    ///
    /// * `cache_name` - Static string identifying the cache instance
    /// * `operation` - The type of cache operation
    /// * `activity` - The operation activity
    /// * `level` - The cache level the activity applies to, if any
    /// * `duration` - Optional operation duration
    pub(crate) fn record(
        &self,
        cache_name: CacheName,
        operation: CacheOperation,
        activity: CacheActivity,
        level: Option<Tier>,
        duration: Option<Duration>,
    ) {
        let attrs = Self::attributes(cache_name, operation, activity, level);

        if let Some(c) = &self.inner.event_counter {
            c.add(1, &attrs);
        }

        if let (Some(d), Some(h)) = (duration, &self.inner.operation_duration) {
            h.record(d.as_secs_f64(), &attrs);
        }

        if self.inner.logging_enabled {
            Self::emit(cache_name, operation, activity, level, 1, duration);
        }
    }

    /// Records `count` occurrences of an activity as one aggregated event.
    pub(crate) fn record_count(
        &self,
        cache_name: CacheName,
        operation: CacheOperation,
        activity: CacheActivity,
        level: Option<Tier>,
        count: u64,
    ) {
        if count == 0 {
            return;
        }

        if let Some(c) = &self.inner.event_counter {
            c.add(count, &Self::attributes(cache_name, operation, activity, level));
        }

        if self.inner.logging_enabled {
            Self::emit(cache_name, operation, activity, level, count, None);
        }
    }

    /// Records the current number of entries of one level.
    pub(crate) fn record_size(&self, cache_name: CacheName, level: Tier, size: u64) {
        let attrs = [
            KeyValue::new(attributes::CACHE_NAME, cache_name),
            KeyValue::new(attributes::CACHE_LEVEL_NAME, level.as_str()),
        ];
        if let Some(g) = &self.inner.cache_size {
            g.record(size, &attrs);
        }
    }

    fn attributes(cache_name: CacheName, operation: CacheOperation, activity: CacheActivity, level: Option<Tier>) -> Vec<KeyValue> {
        let mut attrs = Vec::with_capacity(MAX_ATTRIBUTES);
        attrs.push(KeyValue::new(attributes::CACHE_NAME, cache_name));
        attrs.push(KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()));
        attrs.push(KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()));
        if let Some(level) = level {
            attrs.push(KeyValue::new(attributes::CACHE_LEVEL_NAME, level.as_str()));
        }
        attrs
    }

    fn emit(
        cache_name: CacheName,
        operation: CacheOperation,
        activity: CacheActivity,
        level: Option<Tier>,
        count: u64,
        duration: Option<Duration>,
    ) {
        let op = operation.as_str();
        let act = activity.as_str();
        let level = level.map(Tier::as_str);
        let duration_ns = duration.map(|d| d.as_nanos());

        // Tracing level must be constant, so we use a macro to select the appropriate level.
        // Field names must match constants in attributes.rs - see logs_emit_contains_all_fields_and_values test.
        macro_rules! emit_event {
            ($level:ident) => {
                tracing::$level!(
                    cache.name = cache_name,
                    cache.operation = op,
                    cache.activity = act,
                    cache.level = ?level,
                    cache.count = count,
                    cache.duration_ns = ?duration_ns,
                    "cache.event"
                )
            };
        }

        match activity.severity() {
            Severity::Error => emit_event!(error),
            Severity::Warn => emit_event!(warn),
            Severity::Info => emit_event!(info),
            Severity::Debug => emit_event!(debug),
            _ => {}
        }
    }
}
