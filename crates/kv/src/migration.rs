//! Online schema migration.
//!
//! Each resource type keeps a migration-index partition holding a single
//! flag entry. When the flag carries [`MIGRATION_MARKER`], every record of
//! that type is in the current schema. Conversion rewrites every record and
//! then writes the flag, all inside one update transaction, so readers see
//! either the untouched legacy dataset or the fully converted one.
//!
//! ```text
//! bucketIsMigrated_org  "result" -> 0x01
//! ```
//!
//! Conversion is not guarded against re-entry: callers run it only after
//! [`DataMigrationService::is_migrated`] returned `false`.

use serde::de::DeserializeOwned;
use tessera_store::{Database, Error as StoreError, StorageBackend, WriteTransaction};
use tessera_types::{Bucket, Context, OldBucket, convert_old_bucket_to_new, decode};
use tracing::instrument;

use crate::{
    bucket::{BUCKET_INDEX_PARTITION, BUCKETS_PARTITION, put_bucket_at},
    error::{KvError, Result},
    service::Service,
};

/// Migration-index partition for buckets.
pub const BUCKET_IS_MIGRATED_INDEX: &[u8] = b"bucketIsMigrated_org";

/// Key of the flag entry inside a migration-index partition.
pub const MIGRATION_FLAG_KEY: &[u8] = b"result";

/// Flag value meaning "migrated".
pub const MIGRATION_MARKER: [u8; 1] = [0x01];

/// State of a resource type's migration flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// The flag holds the marker.
    Migrated,
    /// The flag (or its partition) is absent.
    NotMigrated,
    /// The flag holds something other than the marker.
    UnexpectedMarker(Vec<u8>),
}

impl MigrationStatus {
    /// Whether the dataset is known to be in the current schema.
    pub fn is_migrated(&self) -> bool {
        matches!(self, Self::Migrated)
    }
}

/// Conversion of one resource type from its legacy schema to the current one.
pub trait Migration {
    /// Schema records may have been written with.
    type Legacy: DeserializeOwned;

    /// Schema records are written with after conversion.
    type Current;

    /// Resource type name, used in logs and errors.
    fn name(&self) -> &'static str;

    /// Partition holding the records.
    fn records_partition(&self) -> &'static [u8];

    /// Partition holding the migration flag.
    fn index_partition(&self) -> &'static [u8];

    /// Converts one legacy record.
    fn convert(&self, legacy: Self::Legacy) -> Self::Current;

    /// Writes a converted record back under its original key.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or any store write fails.
    fn write<B: StorageBackend>(
        &self,
        txn: &mut WriteTransaction<'_, B>,
        key: &[u8],
        record: &Self::Current,
    ) -> Result<()>;

    /// Decodes, converts and rewrites one stored record.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::Unprocessable`] if `value` is not a legacy record.
    fn migrate_record<B: StorageBackend>(
        &self,
        txn: &mut WriteTransaction<'_, B>,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        let legacy = decode(value).map_err(|source| KvError::Unprocessable {
            resource: self.name(),
            raw: String::from_utf8_lossy(value).into_owned(),
            source,
        })?;
        let record = self.convert(legacy);
        self.write(txn, key, &record)
    }
}

/// Bucket records: [`OldBucket`] to [`Bucket`].
#[derive(Debug, Clone, Copy, Default)]
pub struct BucketMigration;

impl BucketMigration {
    /// Resource type name.
    pub const NAME: &'static str = "bucket";
}

impl Migration for BucketMigration {
    type Legacy = OldBucket;
    type Current = Bucket;

    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn records_partition(&self) -> &'static [u8] {
        BUCKETS_PARTITION
    }

    fn index_partition(&self) -> &'static [u8] {
        BUCKET_IS_MIGRATED_INDEX
    }

    fn convert(&self, legacy: OldBucket) -> Bucket {
        convert_old_bucket_to_new(legacy)
    }

    fn write<B: StorageBackend>(
        &self,
        txn: &mut WriteTransaction<'_, B>,
        key: &[u8],
        record: &Bucket,
    ) -> Result<()> {
        put_bucket_at(txn, key, record)
    }
}

/// Reads the migration flag of `migration`.
///
/// A missing index partition reads as [`MigrationStatus::NotMigrated`].
///
/// # Errors
///
/// Returns the context error or a store error.
pub fn migration_status<M: Migration, B: StorageBackend>(
    db: &Database<B>,
    ctx: &Context,
    migration: &M,
) -> Result<MigrationStatus> {
    db.view(ctx, |txn| {
        let index = match txn.partition(migration.index_partition()) {
            Ok(index) => index,
            Err(StoreError::PartitionNotFound { .. }) => return Ok(MigrationStatus::NotMigrated),
            Err(e) => return Err(KvError::from(e)),
        };
        Ok(match index.get(MIGRATION_FLAG_KEY)? {
            None => MigrationStatus::NotMigrated,
            Some(value) if value == MIGRATION_MARKER => MigrationStatus::Migrated,
            Some(value) => MigrationStatus::UnexpectedMarker(value.to_vec()),
        })
    })
}

/// Whether `migration` has completed. Every failure reads as `false`.
pub fn is_migrated<M: Migration, B: StorageBackend>(
    db: &Database<B>,
    ctx: &Context,
    migration: &M,
) -> bool {
    match migration_status(db, ctx, migration) {
        Ok(MigrationStatus::Migrated) => true,
        Ok(MigrationStatus::NotMigrated) => {
            tracing::debug!(migration = migration.name(), "Migration flag absent");
            false
        },
        Ok(MigrationStatus::UnexpectedMarker(value)) => {
            tracing::warn!(
                migration = migration.name(),
                value = ?value,
                "Migration flag holds an unexpected value"
            );
            false
        },
        Err(e) => {
            tracing::warn!(migration = migration.name(), error = %e, "Failed to read migration flag");
            false
        },
    }
}

/// Converts every record of `migration` and sets its flag, atomically.
///
/// Returns the number of records converted. On any error, including
/// cancellation between records, nothing is written.
///
/// # Errors
///
/// Returns [`KvError::Unprocessable`] for the first undecodable record, the
/// context error, or a store error.
#[instrument(skip_all, fields(migration = migration.name()))]
pub fn convert<M: Migration, B: StorageBackend>(
    db: &Database<B>,
    ctx: &Context,
    migration: &M,
) -> Result<u64> {
    let converted = db.update(ctx, |txn| {
        let mut cursor = txn.partition(migration.records_partition())?.cursor();
        let mut converted = 0u64;

        let mut entry = cursor.first().map(|(k, v)| (k.to_vec(), v.to_vec()));
        while let Some((key, value)) = entry {
            ctx.check()?;
            migration.migrate_record(txn, &key, &value)?;
            converted += 1;
            entry = cursor.next().map(|(k, v)| (k.to_vec(), v.to_vec()));
        }

        txn.partition(migration.index_partition())?.put(MIGRATION_FLAG_KEY, &MIGRATION_MARKER)?;
        Ok::<_, KvError>(converted)
    })?;

    tracing::info!(converted, "Converted records to current schema");
    Ok(converted)
}

/// Migration entry points for every resource type a service owns.
pub trait DataMigrationService {
    /// Whether bucket records are in the current schema.
    fn is_bucket_migrated(&self, ctx: &Context) -> bool;

    /// Converts every bucket record to the current schema.
    ///
    /// # Errors
    ///
    /// Returns the first conversion failure; nothing is written in that case.
    fn convert_bucket_to_new(&self, ctx: &Context) -> Result<()>;

    /// Whether every resource type is migrated.
    fn is_migrated(&self, ctx: &Context) -> bool {
        self.is_bucket_migrated(ctx)
    }

    /// Converts every resource type.
    ///
    /// # Errors
    ///
    /// Returns the first conversion failure.
    fn convert_to_new(&self, ctx: &Context) -> Result<()> {
        self.convert_bucket_to_new(ctx)
    }
}

impl<B: StorageBackend> Service<B> {
    /// Three-valued bucket migration state with store errors surfaced.
    ///
    /// # Errors
    ///
    /// Returns the context error or a store error.
    pub fn bucket_migration_status(&self, ctx: &Context) -> Result<MigrationStatus> {
        migration_status(self.database(), ctx, &BucketMigration)
    }
}

impl<B: StorageBackend> DataMigrationService for Service<B> {
    fn is_bucket_migrated(&self, ctx: &Context) -> bool {
        is_migrated(self.database(), ctx, &BucketMigration)
    }

    fn convert_bucket_to_new(&self, ctx: &Context) -> Result<()> {
        convert(self.database(), ctx, &BucketMigration).map(|_| ())
    }
}
