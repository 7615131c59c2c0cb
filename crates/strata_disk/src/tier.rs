// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! File-backed tier implementation.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ohno::EnrichableExt;
use serde::Serialize;
use serde::de::DeserializeOwned;
use strata_tier::{CacheEntry, CacheTier, Error, Evicted, Lookup, Result};

/// File extension of blobs written by the disk tier.
pub const BLOB_EXTENSION: &str = "blob";

/// Default capacity of a disk tier, in entries.
pub const DEFAULT_L3_CAPACITY: usize = 8192;

/// Index record of one blob; the entry itself lives only on disk.
#[derive(Debug, Clone, Copy)]
struct BlobHandle {
    seq: u64,
    size_bytes: u64,
    expires_at: Option<SystemTime>,
}

impl BlobHandle {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|deadline| now > deadline)
    }
}

/// A capacity-bounded tier that stores each entry as one file.
///
/// The index of keys lives in memory; every entry is serialized to its own blob
/// in the tier directory. Blobs are named after a monotonically increasing
/// sequence number, so eviction is always in insertion order and a key that is
/// overwritten moves to the back.
///
/// The index is not persisted. Blobs left behind by a previous process cannot be
/// addressed and are deleted when the tier is opened.
///
/// Reads touch the returned copy but do not rewrite the blob, so access
/// metadata of an entry that stays in this tier is not preserved.
///
/// # Examples
///
/// ```
/// use std::time::SystemTime;
///
/// use strata_disk::DiskTier;
/// use strata_tier::{CacheEntry, CacheTier, Lookup};
///
/// let dir = tempfile::tempdir()?;
/// let mut tier = DiskTier::<String>::open(dir.path(), 100)?;
///
/// let now = SystemTime::UNIX_EPOCH;
/// tier.insert(CacheEntry::new("greeting", "hello".to_string(), now))?;
///
/// let Lookup::Hit(entry) = tier.get("greeting", now)? else {
///     panic!("expected a hit");
/// };
/// assert_eq!(entry.value(), "hello");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct DiskTier<V> {
    dir: PathBuf,
    capacity: usize,
    index: HashMap<String, BlobHandle>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    size_bytes: u64,
    _phantom: PhantomData<fn() -> V>,
}

impl<V> DiskTier<V> {
    /// Opens a tier rooted at `dir`, creating the directory if needed.
    ///
    /// Blobs already present in the directory are treated as orphans of a previous
    /// process and removed. Failing to remove one is logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or listed.
    pub fn open(dir: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| io_error("failed to create tier directory", &dir, e))?;

        let removed = remove_orphans(&dir)?;
        if removed > 0 {
            tracing::info!(dir = %dir.display(), removed, "removed orphaned blobs");
        }

        Ok(Self {
            dir,
            capacity,
            index: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            size_bytes: 0,
            _phantom: PhantomData,
        })
    }

    /// Returns the directory holding the blobs.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Iterates keys from the oldest inserted to the most recent.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.values().map(String::as_str)
    }

    fn blob_path(&self, seq: u64) -> PathBuf {
        self.dir.join(format!("{seq:016x}.{BLOB_EXTENSION}"))
    }

    /// Drops a key from the index and deletes its blob.
    fn discard(&mut self, key: &str) -> bool {
        let Some(handle) = self.index.remove(key) else {
            return false;
        };
        self.order.remove(&handle.seq);
        self.size_bytes = self.size_bytes.saturating_sub(handle.size_bytes);
        delete_blob(&self.blob_path(handle.seq));
        true
    }
}

impl<V> CacheTier<V> for DiskTier<V>
where
    V: Serialize + DeserializeOwned,
{
    fn get(&mut self, key: &str, now: SystemTime) -> Result<Lookup<V>> {
        let Some(handle) = self.index.get(key).copied() else {
            return Ok(Lookup::Miss);
        };

        if handle.is_expired(now) {
            self.discard(key);
            return Ok(Lookup::Expired);
        }

        match read_blob::<V>(&self.blob_path(handle.seq)) {
            Ok(mut entry) => {
                entry.touch(now);
                Ok(Lookup::Hit(entry))
            }
            Err(error) => {
                // An unreadable blob can never be served; drop it so the key reads as a miss next time.
                self.discard(key);
                Err(error)
            }
        }
    }

    fn insert(&mut self, entry: CacheEntry<V>) -> Result<()> {
        let seq = self.next_seq;
        let path = self.blob_path(seq);
        write_blob(&path, &entry)?;
        self.next_seq += 1;

        self.discard(entry.key());
        let key = entry.key().to_owned();
        self.size_bytes = self.size_bytes.saturating_add(entry.size_bytes());
        self.order.insert(seq, key.clone());
        self.index.insert(
            key,
            BlobHandle {
                seq,
                size_bytes: entry.size_bytes(),
                expires_at: entry.expires_at(),
            },
        );
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        Ok(self.discard(key))
    }

    fn evict(&mut self) -> Result<Option<Evicted<V>>> {
        let Some((_, key)) = self.order.first_key_value() else {
            return Ok(None);
        };
        let key = key.clone();
        self.discard(&key);
        Ok(Some(Evicted { key, entry: None }))
    }

    fn clear(&mut self) -> Result<()> {
        for handle in self.index.values() {
            delete_blob(&self.blob_path(handle.seq));
        }
        self.index.clear();
        self.order.clear();
        self.size_bytes = 0;
        Ok(())
    }

    fn purge_expired(&mut self, now: SystemTime) -> Result<usize> {
        let expired: Vec<String> = self
            .index
            .iter()
            .filter(|(_, handle)| handle.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.discard(key);
        }
        Ok(expired.len())
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

fn io_error(context: &'static str, path: &Path, error: std::io::Error) -> Error {
    Error::from_message(error).enrich(format!("{context}: {}", path.display()))
}

fn write_blob<V: Serialize + DeserializeOwned>(path: &Path, entry: &CacheEntry<V>) -> Result<()> {
    let bytes = serde_json::to_vec(entry)
        .map_err(|e| Error::from_message(e).enrich(format!("failed to encode entry '{}'", entry.key())))?;
    // Non-finite floats encode as `null` and cannot be decoded again.
    serde_json::from_slice::<CacheEntry<V>>(&bytes)
        .map_err(|e| Error::from_message(e).enrich(format!("entry '{}' does not survive encoding", entry.key())))?;
    if let Err(error) = fs::write(path, bytes) {
        delete_blob(path);
        return Err(io_error("failed to write blob", path, error));
    }
    Ok(())
}

fn read_blob<V: DeserializeOwned>(path: &Path) -> Result<CacheEntry<V>> {
    let bytes = fs::read(path).map_err(|e| io_error("failed to read blob", path, e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::from_message(e).enrich(format!("failed to decode blob: {}", path.display())))
}

/// Deletes a blob, logging anything but a missing file.
fn delete_blob(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(error) if error.kind() == ErrorKind::NotFound => {}
        Err(error) => tracing::warn!(path = %path.display(), %error, "failed to delete blob"),
    }
}

fn remove_orphans(dir: &Path) -> Result<usize> {
    let listing = fs::read_dir(dir).map_err(|e| io_error("failed to list tier directory", dir, e))?;
    let mut removed = 0;
    for item in listing.flatten() {
        let path = item.path();
        if !path.extension().is_some_and(|ext| ext == BLOB_EXTENSION) {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(error) => tracing::warn!(path = %path.display(), %error, "failed to remove orphaned blob"),
        }
    }
    Ok(removed)
}
