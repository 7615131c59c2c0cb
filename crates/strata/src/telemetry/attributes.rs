// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub(crate) const CACHE_NAME: &str = "cache.name";

pub(crate) const CACHE_OPERATION_NAME: &str = "cache.operation";

pub(crate) const CACHE_ACTIVITY_NAME: &str = "cache.activity";

pub(crate) const CACHE_LEVEL_NAME: &str = "cache.level";

#[cfg(test)]
pub(crate) const CACHE_EVENT_NAME: &str = "cache.event";

#[cfg(test)]
pub(crate) const CACHE_COUNT_NAME: &str = "cache.count";

#[cfg(test)]
pub(crate) const CACHE_DURATION_NAME: &str = "cache.duration_ns";
