// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! File-backed tier for the strata multi-tier cache.
//!
//! This crate provides [`DiskTier`], the L3 level of a strata cache. Each entry
//! is serialized as JSON into its own blob file; only the key index is kept in
//! memory. Eviction is always in insertion order.
//!
//! # Failure Handling
//!
//! - A blob that cannot be written leaves the tier unchanged and returns an error
//! - A blob that cannot be read or decoded is dropped from the index and reported as an error
//! - Failing to delete a blob is logged and otherwise ignored
//!
//! Blobs do not survive a restart: [`DiskTier::open`] deletes any blob it finds.

pub mod tier;

#[doc(inline)]
pub use tier::{BLOB_EXTENSION, DEFAULT_L3_CAPACITY, DiskTier};
