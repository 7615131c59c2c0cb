// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache telemetry integration with OpenTelemetry.
//!
//! This module records cache operations as OpenTelemetry metrics and as
//! structured `tracing` events. Every event carries the cache name, the
//! operation, the activity and, when one applies, the cache level.

use std::sync::Arc;

use cache::CacheTelemetryInner;
use opentelemetry::logs::Severity;

pub(crate) mod attributes;
pub(crate) mod cache;
pub(crate) mod ext;
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

/// Cache telemetry provider for OpenTelemetry integration.
///
/// This type wraps an OpenTelemetry meter and a logging switch, enabling
/// recording of cache operations as metrics and structured logs.
///
/// Construct this and pass it to the cache builder via `.telemetry()`.
///
/// # Examples
///
/// ```
/// use opentelemetry::global;
/// use strata::{CacheManager, CacheTelemetry};
/// use tick::Clock;
///
/// let telemetry = CacheTelemetry::from_meter_provider(true, global::meter_provider().as_ref());
///
/// let cache = CacheManager::<String>::builder(Clock::new_frozen())
///     .name("sessions")
///     .telemetry(telemetry)
///     .build()?;
/// # Ok::<(), strata::Error>(())
/// ```
#[derive(Clone, Debug)]
pub struct CacheTelemetry {
    inner: Arc<CacheTelemetryInner>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Set,
    Delete,
    Clear,
    Warm,
    Sweep,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Set => "cache.set",
            Self::Delete => "cache.delete",
            Self::Clear => "cache.clear",
            Self::Warm => "cache.warm",
            Self::Sweep => "cache.sweep",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Expired,
    Inserted,
    Evicted,
    Promoted,
    Demoted,
    Warmed,
    WarmFailed,
    Invalidated,
    Ok,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Expired => "cache.expired",
            Self::Inserted => "cache.inserted",
            Self::Evicted => "cache.evicted",
            Self::Promoted => "cache.promoted",
            Self::Demoted => "cache.demoted",
            Self::Warmed => "cache.warmed",
            Self::WarmFailed => "cache.warm_failed",
            Self::Invalidated => "cache.invalidated",
            Self::Ok => "cache.ok",
            Self::Error => "cache.error",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::Hit | Self::Miss | Self::Promoted | Self::Ok => Severity::Debug,
            Self::Expired | Self::Inserted | Self::Evicted | Self::Demoted | Self::Warmed | Self::Invalidated => Severity::Info,
            Self::WarmFailed => Severity::Warn,
            Self::Error => Severity::Error,
        }
    }
}
