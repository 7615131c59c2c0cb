// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `ExpirySweeper`.

use std::time::Duration;

use strata::{CacheManager, SetOptions};
use tick::Clock;

#[tokio::test]
async fn sweeper_removes_unread_expired_entries() {
    let cache = CacheManager::<u32>::builder(Clock::new_tokio()).build().unwrap();
    cache.set_with("stale", 1, SetOptions::new().ttl(Duration::from_millis(1))).unwrap();
    cache.set("fresh", 2).unwrap();

    let mut sweeper = cache.sweeper(Duration::from_millis(5));
    assert_eq!(sweeper.period(), Duration::from_millis(5));

    let mut removed = 0;
    for _ in 0..100 {
        removed += sweeper.tick().await.unwrap();
        if removed > 0 {
            break;
        }
    }

    assert_eq!(removed, 1);
    assert!(!cache.contains("stale"));
    assert!(cache.contains("fresh"));
    assert_eq!(cache.stats().expirations, 1);
}

#[tokio::test]
async fn sweeper_stops_once_cache_is_dropped() {
    let cache = CacheManager::<u32>::builder(Clock::new_tokio()).build().unwrap();
    let mut sweeper = cache.sweeper(Duration::from_millis(1));

    drop(cache);

    assert_eq!(sweeper.tick().await, None);
}

#[tokio::test]
async fn run_completes_after_last_handle_is_dropped() {
    let cache = CacheManager::<u32>::builder(Clock::new_tokio()).build().unwrap();
    let handle = tokio::spawn(cache.sweeper(Duration::from_millis(1)).run());

    tokio::time::sleep(Duration::from_millis(10)).await;
    drop(cache);

    handle.await.unwrap();
}
