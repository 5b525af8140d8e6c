//! tessera-kv: resource services over the Tessera store.
//!
//! - [`Service`]: bucket CRUD with a per-organization name index, and the
//!   [`BucketFinder`](tessera_types::BucketFinder) the pre-authorizer resolves filters with
//! - [`migration`]: the online schema migration of legacy records
//!
//! ## Startup
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tessera_kv::Service;
//! use tessera_store::Database;
//! use tessera_types::Context;
//!
//! let db = Arc::new(Database::open_in_memory()?);
//! let service = Service::new(db);
//! let ctx = Context::background();
//!
//! service.initialize(&ctx)?;
//! service.ensure_migrated(&ctx)?;
//! # Ok::<(), tessera_kv::KvError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bucket;
pub mod error;
pub mod migration;
mod service;

pub use bucket::{BUCKET_INDEX_PARTITION, BUCKETS_PARTITION, bucket_index_key, put_bucket};
pub use error::{KvError, Result};
pub use migration::{
    BUCKET_IS_MIGRATED_INDEX, BucketMigration, DataMigrationService, MIGRATION_FLAG_KEY,
    MIGRATION_MARKER, Migration, MigrationStatus,
};
pub use service::Service;
