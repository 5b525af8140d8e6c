//! Bucket storage: records keyed by id plus a per-organization name index.
//!
//! ```text
//! bucketsv1       <bucket id hex>                  -> bucket JSON
//! bucketsindexv1  <org id hex><bucket name bytes>  -> <bucket id hex>
//! ```

use tessera_store::{
    Error as StoreError, Partition, ReadTransaction, StorageBackend, WriteTransaction,
};
use tessera_types::{Bucket, BucketFilter, BucketFinder, Context, Id, OldBucket, decode, encode};
use tracing::instrument;

use crate::{
    error::{KvError, Result},
    service::Service,
};

/// Partition holding bucket records.
pub const BUCKETS_PARTITION: &[u8] = b"bucketsv1";

/// Partition holding the organization/name index.
pub const BUCKET_INDEX_PARTITION: &[u8] = b"bucketsindexv1";

/// Index key for a bucket name within an organization.
///
/// # Errors
///
/// Returns [`KvError::InvalidId`] if `org_id` is zero.
pub fn bucket_index_key(org_id: Id, name: &str) -> Result<Vec<u8>> {
    let mut key = org_id.encode()?.to_vec();
    key.extend_from_slice(name.as_bytes());
    Ok(key)
}

fn decode_bucket(key: &[u8], value: &[u8]) -> Result<Bucket> {
    decode(value).map_err(|source| KvError::CorruptRecord {
        key: String::from_utf8_lossy(key).into_owned(),
        source,
    })
}

/// Opens a read-only partition, treating a missing one as empty.
fn open_optional<B: StorageBackend>(
    txn: &ReadTransaction<'_, B>,
    name: &[u8],
) -> Result<Option<Partition>> {
    match txn.partition(name) {
        Ok(partition) => Ok(Some(partition)),
        Err(StoreError::PartitionNotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes `bucket` under its id and refreshes its name index entry.
///
/// No uniqueness check happens here.
///
/// # Errors
///
/// Returns an error if the bucket id is invalid, encoding fails, or a write fails.
pub fn put_bucket<B: StorageBackend>(txn: &mut WriteTransaction<'_, B>, bucket: &Bucket) -> Result<()> {
    put_bucket_at(txn, &bucket.id.encode()?, bucket)
}

/// Writes `bucket` under `key` and refreshes its name index entry.
///
/// The previous record under the same key, in either schema, determines
/// which stale index entry to drop.
pub(crate) fn put_bucket_at<B: StorageBackend>(
    txn: &mut WriteTransaction<'_, B>,
    key: &[u8],
    bucket: &Bucket,
) -> Result<()> {
    let value = encode(bucket).map_err(|source| KvError::Encode { id: bucket.id, source })?;

    let previous: Option<OldBucket> = {
        let records = txn.partition(BUCKETS_PARTITION)?;
        records.get(key)?.and_then(|raw| decode(raw).ok())
    };
    txn.partition(BUCKETS_PARTITION)?.put(key, &value)?;

    let mut index = txn.partition(BUCKET_INDEX_PARTITION)?;
    if let Some(previous) = previous
        && let Some(org_id) = previous.organization_id
        && org_id.is_valid()
        && (previous.organization_id != bucket.organization_id || previous.name != bucket.name)
    {
        index.delete(&bucket_index_key(org_id, &previous.name)?)?;
    }
    if let Some(org_id) = bucket.organization_id {
        index.put(&bucket_index_key(org_id, &bucket.name)?, key)?;
    }
    Ok(())
}

fn validate_bucket(bucket: &Bucket) -> Result<()> {
    if bucket.name.trim().is_empty() {
        return Err(KvError::InvalidBucket { message: "bucket name is required".to_string() });
    }
    if bucket.organization_id.is_some_and(|org_id| !org_id.is_valid()) {
        return Err(KvError::InvalidBucket { message: "organization id is invalid".to_string() });
    }
    Ok(())
}

impl<B: StorageBackend> Service<B> {
    /// Returns the bucket with the given id.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::BucketNotFound`] if it does not exist.
    pub fn find_bucket_by_id(&self, ctx: &Context, id: Id) -> Result<Bucket> {
        let key = id.encode()?;
        self.database().view(ctx, |txn| {
            let Some(records) = open_optional(txn, BUCKETS_PARTITION)? else {
                return Err(KvError::BucketNotFound { filter: BucketFilter::by_id(id) });
            };
            match records.get(&key)? {
                Some(value) => decode_bucket(&key, value),
                None => Err(KvError::BucketNotFound { filter: BucketFilter::by_id(id) }),
            }
        })
    }

    /// Returns the bucket named `name` in organization `org_id`.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::BucketNotFound`] if it does not exist.
    pub fn find_bucket_by_name(&self, ctx: &Context, org_id: Id, name: &str) -> Result<Bucket> {
        let index_key = bucket_index_key(org_id, name)?;
        let not_found = || KvError::BucketNotFound { filter: BucketFilter::by_name(org_id, name) };

        self.database().view(ctx, |txn| {
            let Some(index) = open_optional(txn, BUCKET_INDEX_PARTITION)? else {
                return Err(not_found());
            };
            let Some(key) = index.get(&index_key)? else {
                return Err(not_found());
            };
            let Some(records) = open_optional(txn, BUCKETS_PARTITION)? else {
                return Err(not_found());
            };
            match records.get(key)? {
                Some(value) => decode_bucket(key, value),
                None => Err(not_found()),
            }
        })
    }

    /// Returns every bucket matching `filter`, in id order.
    ///
    /// # Errors
    ///
    /// Returns a store or decode error.
    pub fn find_buckets(&self, ctx: &Context, filter: &BucketFilter) -> Result<Vec<Bucket>> {
        self.database().view(ctx, |txn| {
            let Some(records) = open_optional(txn, BUCKETS_PARTITION)? else {
                return Ok(Vec::new());
            };

            let mut buckets = Vec::new();
            let mut cursor = records.cursor();
            let mut entry = cursor.first().map(|(k, v)| decode_bucket(k, v));
            while let Some(bucket) = entry {
                let bucket = bucket?;
                if filter.matches(&bucket) {
                    buckets.push(bucket);
                }
                entry = cursor.next().map(|(k, v)| decode_bucket(k, v));
            }
            Ok(buckets)
        })
    }

    /// Creates a bucket, assigning a fresh id.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::InvalidBucket`] for an unnamed bucket and
    /// [`KvError::BucketNameConflict`] if the organization already has a
    /// bucket with the same name.
    #[instrument(skip(self, ctx, bucket), fields(name = %bucket.name))]
    pub fn create_bucket(&self, ctx: &Context, bucket: &mut Bucket) -> Result<()> {
        validate_bucket(bucket)?;
        bucket.id = self
            .id_generator()
            .generate()
            .map_err(|source| KvError::IdGeneration { source })?;

        self.database().update(ctx, |txn| {
            self.ensure_name_available(txn, bucket)?;
            put_bucket(txn, bucket)
        })?;

        tracing::debug!(id = %bucket.id, "Created bucket");
        Ok(())
    }

    /// Replaces an existing bucket.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::BucketNotFound`] if no bucket has the id and
    /// [`KvError::BucketNameConflict`] if a rename collides.
    pub fn update_bucket(&self, ctx: &Context, bucket: &Bucket) -> Result<()> {
        validate_bucket(bucket)?;
        let key = bucket.id.encode()?;

        self.database().update(ctx, |txn| {
            if txn.partition(BUCKETS_PARTITION)?.get(&key)?.is_none() {
                return Err(KvError::BucketNotFound { filter: BucketFilter::by_id(bucket.id) });
            }
            self.ensure_name_available(txn, bucket)?;
            put_bucket(txn, bucket)
        })
    }

    /// Deletes a bucket and its index entry.
    ///
    /// # Errors
    ///
    /// Returns [`KvError::BucketNotFound`] if no bucket has the id.
    pub fn delete_bucket(&self, ctx: &Context, id: Id) -> Result<()> {
        let key = id.encode()?;

        self.database().update(ctx, |txn| {
            let existing: OldBucket = {
                let records = txn.partition(BUCKETS_PARTITION)?;
                let Some(raw) = records.get(&key)? else {
                    return Err(KvError::BucketNotFound { filter: BucketFilter::by_id(id) });
                };
                decode(raw).map_err(|source| KvError::CorruptRecord {
                    key: String::from_utf8_lossy(&key).into_owned(),
                    source,
                })?
            };

            txn.partition(BUCKETS_PARTITION)?.delete(&key)?;
            if let Some(org_id) = existing.organization_id.filter(|org_id| org_id.is_valid()) {
                txn.partition(BUCKET_INDEX_PARTITION)?
                    .delete(&bucket_index_key(org_id, &existing.name)?)?;
            }
            Ok(())
        })
    }

    fn ensure_name_available(&self, txn: &mut WriteTransaction<'_, B>, bucket: &Bucket) -> Result<()> {
        let Some(org_id) = bucket.organization_id else {
            return Ok(());
        };
        let index = txn.partition(BUCKET_INDEX_PARTITION)?;
        match index.get(&bucket_index_key(org_id, &bucket.name)?)? {
            Some(owner) if owner != bucket.id.encode()?.as_slice() => {
                Err(KvError::BucketNameConflict { name: bucket.name.clone() })
            },
            _ => Ok(()),
        }
    }
}

impl<B: StorageBackend> BucketFinder for Service<B> {
    type Error = KvError;

    /// Uses the id or the name index when the filter allows, otherwise scans.
    fn find_bucket(&self, ctx: &Context, filter: &BucketFilter) -> Result<Bucket> {
        let not_found = || KvError::BucketNotFound { filter: filter.clone() };

        let candidate = match (filter.id, filter.organization_id, filter.name.as_deref()) {
            (Some(id), _, _) => Some(self.find_bucket_by_id(ctx, id)),
            (None, Some(org_id), Some(name)) => Some(self.find_bucket_by_name(ctx, org_id, name)),
            _ => None,
        };

        match candidate {
            Some(Ok(bucket)) if filter.matches(&bucket) => Ok(bucket),
            Some(Ok(_)) | Some(Err(KvError::BucketNotFound { .. })) => Err(not_found()),
            Some(Err(e)) => Err(e),
            None => self.find_buckets(ctx, filter)?.into_iter().next().ok_or_else(not_found),
        }
    }
}
