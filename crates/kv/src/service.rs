//! The resource service over a shared store.

use std::sync::Arc;

use tessera_store::{Database, StorageBackend};
use tessera_types::{Context, IdGenerator, SnowflakeGenerator};
use tracing::instrument;

use crate::{
    bucket::{BUCKET_INDEX_PARTITION, BUCKETS_PARTITION},
    error::Result,
    migration::{BUCKET_IS_MIGRATED_INDEX, BucketMigration, DataMigrationService},
};

/// Resource services backed by one store.
///
/// The store handle is shared process-wide; a `Service` is cheap to clone.
pub struct Service<B: StorageBackend> {
    db: Arc<Database<B>>,
    ids: Arc<dyn IdGenerator>,
}

impl<B: StorageBackend> Clone for Service<B> {
    fn clone(&self) -> Self {
        Self { db: Arc::clone(&self.db), ids: Arc::clone(&self.ids) }
    }
}

impl<B: StorageBackend> Service<B> {
    /// Creates a service that generates snowflake ids.
    pub fn new(db: Arc<Database<B>>) -> Self {
        Self::with_id_generator(db, Arc::new(SnowflakeGenerator::new()))
    }

    /// Creates a service with a custom id generator.
    pub fn with_id_generator(db: Arc<Database<B>>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { db, ids }
    }

    /// The underlying store.
    pub fn database(&self) -> &Arc<Database<B>> {
        &self.db
    }

    pub(crate) fn id_generator(&self) -> &dyn IdGenerator {
        self.ids.as_ref()
    }

    /// Creates every partition the service uses.
    ///
    /// # Errors
    ///
    /// Returns a store error if the partitions cannot be committed.
    pub fn initialize(&self, ctx: &Context) -> Result<()> {
        self.db.create_partitions(
            ctx,
            &[BUCKETS_PARTITION, BUCKET_INDEX_PARTITION, BUCKET_IS_MIGRATED_INDEX],
        )?;
        Ok(())
    }

    /// Brings stored data to the current schema before the service is used.
    ///
    /// Runs the check-then-convert sequence: conversion only starts when the
    /// migration flag is absent. Returns whether a conversion ran.
    ///
    /// # Errors
    ///
    /// Returns the conversion error; the store is left exactly as before.
    #[instrument(skip_all)]
    pub fn ensure_migrated(&self, ctx: &Context) -> Result<bool> {
        if self.is_migrated(ctx) {
            tracing::debug!("Data already migrated");
            return Ok(false);
        }

        tracing::info!("Data not migrated, converting to current schema");
        self.convert_to_new(ctx)?;
        tracing::info!("Data migration complete");
        Ok(true)
    }

    /// Migrations this service runs, in order.
    pub fn migrations(&self) -> [&'static str; 1] {
        [BucketMigration::NAME]
    }
}
