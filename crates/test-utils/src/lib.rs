//! Shared test utilities for Tessera crates.
//!
//! - [`TestDir`]: managed temporary directory with path and fixture helpers
//! - [`strategies`]: proptest generators for ids, buckets, filters and permissions
//! - [`mocks`]: recording authorizer, in-memory bucket finder, sequential ids
//! - [`verify_buckets`]: order-insensitive bucket list comparison with a diff

#![deny(unsafe_code)]

mod buckets;
pub mod mocks;
pub mod strategies;
mod test_dir;

pub use buckets::{diff_buckets, verify_buckets};
pub use mocks::{MockBucketFinder, MockFinderError, RecordingAuthorizer, SequenceIdGenerator};
pub use test_dir::TestDir;
