//! Database and transaction management for tessera-store.
//!
//! Provides atomic transactions over named partitions. Uses a single-writer
//! model with snapshot-isolated readers.
//!
//! # Example
//!
//! ```no_run
//! use tessera_store::Database;
//! use tessera_types::Context;
//!
//! let db = Database::open_in_memory()?;
//! let ctx = Context::background();
//!
//! db.update(&ctx, |txn| {
//!     txn.partition(b"bucketsv1")?.put(b"0000000000000001", b"{}")?;
//!     Ok::<_, tessera_store::Error>(())
//! })?;
//!
//! let value = db.view(&ctx, |txn| {
//!     Ok::<_, tessera_store::Error>(
//!         txn.partition(b"bucketsv1")?.get(b"0000000000000001")?.map(<[u8]>::to_vec),
//!     )
//! })?;
//! # Ok::<(), tessera_store::Error>(())
//! ```

use std::{collections::BTreeMap, path::Path, sync::Arc};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use snafu::ResultExt;
use tessera_types::Context;

use crate::{
    backend::{CommitSlot, DatabaseHeader, FileBackend, InMemoryBackend, StorageBackend},
    error::{Error, ImageEncodeSnafu, Result},
    partition::{Partition, PartitionMut},
    transaction::{CommittedState, PartitionData, SnapshotId, TransactionTracker},
};

/// Database configuration options.
#[derive(Debug, Clone, bon::Builder)]
pub struct DatabaseConfig {
    /// Whether to sync on every commit (default true for durability).
    #[builder(default = true)]
    pub sync_on_commit: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { sync_on_commit: true }
    }
}

/// The main database handle.
///
/// Generic over [`StorageBackend`]: use [`Database<FileBackend>`] for production
/// and [`Database<InMemoryBackend>`] for testing.
///
/// Thread-safe with interior mutability. Supports concurrent reads
/// and exclusive writes (single-writer model).
///
/// # Transaction Isolation (Copy-on-Write)
///
/// - Read transactions capture an immutable snapshot at start (no locks held)
/// - Write transactions clone only the partitions they modify
/// - Atomic pointer swap makes commits visible instantly, after the new image is durable
///
/// Readers never block writers, writers don't block readers.
pub struct Database<B: StorageBackend> {
    /// Storage backend (file or memory).
    backend: B,
    /// Current committed state (atomically swapped on commit).
    committed_state: ArcSwap<CommittedState>,
    /// In-memory copy of the on-disk header. Only touched under `write_lock`.
    header: Mutex<DatabaseHeader>,
    /// Live transaction bookkeeping.
    tracker: TransactionTracker,
    /// Configuration.
    config: DatabaseConfig,
    /// Ensures only one write transaction at a time.
    write_lock: std::sync::Mutex<()>,
}

impl Database<FileBackend> {
    /// Opens an existing database at the given path.
    ///
    /// Recovers committed state from the dual-slot header, falling back to the
    /// secondary slot when the primary's slot or image checksum fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or read.
    /// Returns [`Error::InvalidMagic`] or [`Error::UnsupportedVersion`] for foreign files.
    /// Returns [`Error::Corrupted`] if neither commit slot yields a verified image.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, DatabaseConfig::default())
    }

    /// Opens an existing database with custom configuration.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn open_with_config<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Self> {
        Self::from_backend(FileBackend::open(path)?, config)
    }

    /// Creates a new database at the given path, truncating any existing file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_config(path, DatabaseConfig::default())
    }

    /// Creates a new database with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created.
    pub fn create_with_config<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Self> {
        Self::from_backend(FileBackend::create(path)?, config)
    }

    /// Opens the database if the file exists, otherwise creates it.
    ///
    /// # Errors
    ///
    /// See [`Database::open`] and [`Database::create`].
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Self> {
        Self::from_backend(FileBackend::open_or_create(path)?, config)
    }
}

impl Database<InMemoryBackend> {
    /// Creates an in-memory database.
    ///
    /// # Errors
    ///
    /// Never fails for a fresh in-memory backend; the signature matches the
    /// file-backed constructors.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_in_memory_with_config(DatabaseConfig::default())
    }

    /// Creates an in-memory database with custom configuration.
    ///
    /// # Errors
    ///
    /// See [`Database::open_in_memory`].
    pub fn open_in_memory_with_config(config: DatabaseConfig) -> Result<Self> {
        Self::from_backend(InMemoryBackend::new(), config)
    }
}

impl<B: StorageBackend> Database<B> {
    /// Creates a database from a backend, recovering any committed state it holds.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is unreadable or no commit slot verifies.
    pub fn from_backend(backend: B, config: DatabaseConfig) -> Result<Self> {
        let (header, initial_state) = Self::load_state(&backend)?;
        let tracker = TransactionTracker::new(initial_state.snapshot_id.next());

        tracing::debug!(
            snapshot_id = initial_state.snapshot_id.raw(),
            partitions = initial_state.partitions.len(),
            "Opened database"
        );

        Ok(Self {
            backend,
            committed_state: ArcSwap::from_pointee(initial_state),
            header: Mutex::new(header),
            tracker,
            config,
            write_lock: std::sync::Mutex::new(()),
        })
    }

    /// Loads the committed state referenced by the header.
    ///
    /// Tries the primary slot first. A slot whose own checksum fails is
    /// skipped; a slot whose image is unreadable or fails its checksum falls
    /// back to the other slot. When the secondary wins, the in-memory header
    /// is flipped so the next commit never overwrites the image just loaded.
    fn load_state(backend: &B) -> Result<(DatabaseHeader, CommittedState)> {
        let mut header = DatabaseHeader::from_bytes(&backend.read_header()?)?;
        let primary = header.primary_slot_index();

        let mut last_error = None;
        for index in header.valid_slots() {
            let slot = header.slot(index).clone();
            match Self::read_image(backend, &slot) {
                Ok(state) => {
                    if index != primary {
                        tracing::warn!(
                            slot = index,
                            snapshot_id = slot.snapshot_id,
                            "Primary commit slot unusable, recovered from secondary"
                        );
                        header.flip_primary_slot();
                    }
                    return Ok((header, state));
                },
                Err(e) => {
                    tracing::warn!(slot = index, error = %e, "Commit slot image failed verification");
                    last_error = Some(e);
                },
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Corrupted {
            reason: "Both commit slots have invalid checksums".to_string(),
        }))
    }

    fn read_image(backend: &B, slot: &CommitSlot) -> Result<CommittedState> {
        let snapshot_id = SnapshotId::new(slot.snapshot_id);
        if slot.image_len == 0 {
            return Ok(CommittedState { partitions: BTreeMap::new(), snapshot_id });
        }

        let len = usize::try_from(slot.image_len).map_err(|_| Error::Corrupted {
            reason: format!("Image length {} exceeds addressable memory", slot.image_len),
        })?;
        let image = backend.read_at(slot.image_offset, len)?;

        let actual = xxhash_rust::xxh3::xxh3_64(&image);
        if actual != slot.image_checksum {
            return Err(Error::Corrupted {
                reason: format!(
                    "Image checksum mismatch at offset {}: expected {:016x}, found {actual:016x}",
                    slot.image_offset, slot.image_checksum
                ),
            });
        }

        let mut state: CommittedState = postcard::from_bytes(&image)
            .map_err(|e| Error::Corrupted { reason: format!("Image decode failed: {e}") })?;
        state.snapshot_id = snapshot_id;
        Ok(state)
    }

    /// Persists `state` with the dual-slot commit protocol.
    ///
    /// 1. Write the image where it cannot overlap the primary slot's image
    /// 2. Write the new slot into the SECONDARY position and write the header
    /// 3. Sync
    /// 4. Flip the god byte and write the header (commit point)
    /// 5. Sync
    ///
    /// A crash before step 4 leaves the old primary and its image intact.
    fn persist_state(&self, state: &CommittedState) -> Result<()> {
        let image = postcard::to_allocvec(state).context(ImageEncodeSnafu)?;
        let image_checksum = xxhash_rust::xxh3::xxh3_64(&image);

        let mut header = self.header.lock();
        let mut next = header.clone();

        let image_offset = next.next_image_offset(image.len() as u64);
        self.backend.write_at(image_offset, &image)?;

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        *next.secondary_slot_mut() = CommitSlot {
            image_offset,
            image_len: image.len() as u64,
            image_checksum,
            snapshot_id: state.snapshot_id.raw(),
            last_write_timestamp: timestamp,
            checksum: 0, // Computed by to_bytes()
        };
        self.backend.write_header(&next.to_bytes())?;
        self.sync_if_configured()?;

        next.flip_primary_slot();
        self.backend.write_header(&next.to_bytes())?;
        self.sync_if_configured()?;

        *header = next;

        tracing::debug!(
            snapshot_id = state.snapshot_id.raw(),
            image_offset,
            image_len = image.len(),
            "Committed image"
        );
        Ok(())
    }

    fn sync_if_configured(&self) -> Result<()> {
        if self.config.sync_on_commit { self.backend.sync() } else { Ok(()) }
    }

    /// Begins a read transaction over the current committed snapshot.
    ///
    /// Lock-free apart from registering with the transaction tracker.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible for backends that load lazily.
    pub fn read(&self) -> Result<ReadTransaction<'_, B>> {
        let snapshot = self.committed_state.load_full();
        self.tracker.register_read_transaction(snapshot.snapshot_id);

        Ok(ReadTransaction { db: self, snapshot })
    }

    /// Begins a write transaction.
    ///
    /// Blocks while another write transaction is live.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Poisoned`] if the write lock is poisoned.
    pub fn write(&self) -> Result<WriteTransaction<'_, B>> {
        let write_guard = self.write_lock.lock().map_err(|_| Error::Poisoned)?;

        let snapshot_id = self.tracker.start_write_transaction();
        let base = self.committed_state.load_full();
        let partitions = base.partitions.clone();

        Ok(WriteTransaction {
            db: self,
            base,
            partitions,
            snapshot_id,
            finished: false,
            _write_guard: write_guard,
        })
    }

    /// Runs `f` in a read transaction.
    ///
    /// # Errors
    ///
    /// Returns the context error if `ctx` is already done, otherwise whatever `f` returns.
    pub fn view<T, E, F>(&self, ctx: &Context, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&ReadTransaction<'_, B>) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        ctx.check().map_err(Error::from)?;
        let txn = self.read()?;
        f(&txn)
    }

    /// Runs `f` in a write transaction and commits if it succeeds.
    ///
    /// If `f` fails, or `ctx` is done before `f` starts or before the commit,
    /// every staged write is discarded.
    ///
    /// # Errors
    ///
    /// Returns the context error, `f`'s error, or the commit error.
    pub fn update<T, E, F>(&self, ctx: &Context, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut WriteTransaction<'_, B>) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        ctx.check().map_err(Error::from)?;
        let mut txn = self.write()?;
        let value = f(&mut txn)?;
        ctx.check().map_err(Error::from)?;
        txn.commit()?;
        Ok(value)
    }

    /// Creates each partition that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartitionNameRequired`] for an empty name, or a commit error.
    pub fn create_partitions(&self, ctx: &Context, names: &[&[u8]]) -> Result<()> {
        self.update(ctx, |txn| {
            for name in names {
                txn.create_partition(name)?;
            }
            Ok(())
        })
    }

    /// Snapshot ID of the current committed state.
    pub fn snapshot_id(&self) -> SnapshotId {
        self.committed_state.load().snapshot_id
    }

    /// Returns database statistics.
    pub fn stats(&self) -> DatabaseStats {
        let state = self.committed_state.load_full();

        DatabaseStats {
            partitions: state.partitions.len(),
            keys: state.key_count(),
            snapshot_id: state.snapshot_id.raw(),
            active_readers: self.tracker.active_reader_count(),
            commits: self.tracker.commit_count(),
        }
    }

    /// The underlying storage backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Database configuration.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }
}

/// Database statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Number of partitions.
    pub partitions: usize,
    /// Keys across all partitions.
    pub keys: usize,
    /// Snapshot ID of the committed state.
    pub snapshot_id: u64,
    /// Live read transactions.
    pub active_readers: usize,
    /// Commits since the database was opened.
    pub commits: u64,
}

/// A read-only transaction.
///
/// Captures an immutable snapshot at creation and can run fully concurrently
/// with write transactions and other readers.
pub struct ReadTransaction<'db, B: StorageBackend> {
    db: &'db Database<B>,
    snapshot: Arc<CommittedState>,
}

impl<B: StorageBackend> ReadTransaction<'_, B> {
    /// Opens a partition.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartitionNameRequired`] for an empty name.
    /// Returns [`Error::PartitionNotFound`] if the partition does not exist.
    pub fn partition(&self, name: &[u8]) -> Result<Partition> {
        require_partition_name(name)?;
        self.snapshot
            .partitions
            .get(name)
            .map(|data| Partition::new(name, Arc::clone(data)))
            .ok_or_else(|| Error::PartitionNotFound { name: name.to_vec() })
    }

    /// Whether a partition exists in this snapshot.
    pub fn has_partition(&self, name: &[u8]) -> bool {
        self.snapshot.partitions.contains_key(name)
    }

    /// Names of all partitions in ascending order.
    pub fn partition_names(&self) -> Vec<Vec<u8>> {
        self.snapshot.partitions.keys().cloned().collect()
    }

    /// Snapshot this transaction reads.
    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot.snapshot_id
    }
}

impl<B: StorageBackend> Drop for ReadTransaction<'_, B> {
    fn drop(&mut self) {
        self.db.tracker.unregister_read_transaction(self.snapshot.snapshot_id);
    }
}

/// A write transaction.
///
/// Changes are staged until commit. On commit the new image is persisted via
/// the dual-slot protocol and then the committed state is atomically swapped.
///
/// # Invariants
///
/// **Lock ordering:** the `write_lock` is acquired first, guaranteeing at most
/// one `WriteTransaction` exists at a time. The header mutex is acquired only
/// inside `commit`.
///
/// **Drop behavior:** if a `WriteTransaction` is dropped without calling
/// `commit()`, every staged write is discarded and the committed state is
/// unchanged.
pub struct WriteTransaction<'db, B: StorageBackend> {
    db: &'db Database<B>,
    /// Committed state the transaction started from.
    base: Arc<CommittedState>,
    /// Staged partitions (share unmodified data with `base`).
    partitions: BTreeMap<Vec<u8>, Arc<PartitionData>>,
    /// Snapshot ID this transaction commits as.
    snapshot_id: SnapshotId,
    /// Whether the transaction has been committed or aborted.
    finished: bool,
    /// Guard to ensure only one write transaction at a time.
    _write_guard: std::sync::MutexGuard<'db, ()>,
}

impl<B: StorageBackend> WriteTransaction<'_, B> {
    /// Opens a partition, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartitionNameRequired`] for an empty name.
    pub fn partition(&mut self, name: &[u8]) -> Result<PartitionMut<'_>> {
        require_partition_name(name)?;
        let data = self.partitions.entry(name.to_vec()).or_default();
        Ok(PartitionMut::new(name, data))
    }

    /// Creates a partition if missing. Returns whether it was created.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartitionNameRequired`] for an empty name.
    pub fn create_partition(&mut self, name: &[u8]) -> Result<bool> {
        require_partition_name(name)?;
        if self.partitions.contains_key(name) {
            return Ok(false);
        }
        self.partitions.insert(name.to_vec(), Arc::default());
        Ok(true)
    }

    /// Deletes a partition and all its keys. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PartitionNameRequired`] for an empty name.
    pub fn delete_partition(&mut self, name: &[u8]) -> Result<bool> {
        require_partition_name(name)?;
        Ok(self.partitions.remove(name).is_some())
    }

    /// Whether a partition exists, including staged creations.
    pub fn has_partition(&self, name: &[u8]) -> bool {
        self.partitions.contains_key(name)
    }

    /// Names of all partitions in ascending order, including staged creations.
    pub fn partition_names(&self) -> Vec<Vec<u8>> {
        self.partitions.keys().cloned().collect()
    }

    /// Snapshot ID this transaction commits as.
    pub fn snapshot_id(&self) -> SnapshotId {
        self.snapshot_id
    }

    /// Whether any partition differs from the starting snapshot.
    fn is_modified(&self) -> bool {
        self.partitions.len() != self.base.partitions.len()
            || self.partitions.iter().any(|(name, data)| {
                self.base.partitions.get(name).is_none_or(|base| !Arc::ptr_eq(base, data))
            })
    }

    /// Commits the transaction.
    ///
    /// A transaction that staged no changes commits without touching storage.
    /// If persistence fails, the committed state is left exactly as before.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageEncode`] if the image cannot be encoded, or
    /// [`Error::Io`] if writing or syncing storage fails.
    pub fn commit(mut self) -> Result<()> {
        if !self.is_modified() {
            self.db.tracker.end_write_transaction(self.snapshot_id, false);
            self.finished = true;
            return Ok(());
        }

        let new_state = CommittedState {
            partitions: std::mem::take(&mut self.partitions),
            snapshot_id: self.snapshot_id,
        };

        // On failure `self` drops unfinished, which ends the transaction.
        self.db.persist_state(&new_state)?;

        self.db.committed_state.store(Arc::new(new_state));
        self.db.tracker.end_write_transaction(self.snapshot_id, true);
        self.finished = true;
        Ok(())
    }

    /// Aborts the transaction, discarding all staged writes.
    pub fn abort(mut self) {
        self.partitions.clear();
        self.db.tracker.end_write_transaction(self.snapshot_id, false);
        self.finished = true;
    }
}

impl<B: StorageBackend> Drop for WriteTransaction<'_, B> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                snapshot_id = self.snapshot_id.raw(),
                "Write transaction dropped without commit, discarding staged writes"
            );
            self.db.tracker.end_write_transaction(self.snapshot_id, false);
        }
    }
}

fn require_partition_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(Error::PartitionNameRequired);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::background()
    }

    fn read_value(db: &Database<InMemoryBackend>, partition: &[u8], key: &[u8]) -> Option<Vec<u8>> {
        db.view(&ctx(), |txn| match txn.partition(partition) {
            Ok(p) => Ok(p.get(key)?.map(<[u8]>::to_vec)),
            Err(Error::PartitionNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        })
        .unwrap()
    }

    #[test]
    fn test_update_then_view() {
        let db = Database::open_in_memory().unwrap();
        db.update(&ctx(), |txn| txn.partition(b"p")?.put(b"k", b"v")).unwrap();

        assert_eq!(read_value(&db, b"p", b"k"), Some(b"v".to_vec()));
        assert_eq!(db.stats().commits, 1);
        assert_eq!(db.stats().keys, 1);
    }

    #[test]
    fn test_view_missing_partition() {
        let db = Database::open_in_memory().unwrap();
        let result = db.view(&ctx(), |txn| txn.partition(b"missing").map(|_| ()));
        assert!(matches!(result, Err(Error::PartitionNotFound { name }) if name == b"missing"));
    }

    #[test]
    fn test_empty_partition_name_rejected() {
        let db = Database::open_in_memory().unwrap();
        let result = db.update(&ctx(), |txn| txn.partition(b"").map(|_| ()));
        assert!(matches!(result, Err(Error::PartitionNameRequired)));
    }

    #[test]
    fn test_failed_update_discards_writes() {
        let db = Database::open_in_memory().unwrap();
        let result: Result<()> = db.update(&ctx(), |txn| {
            txn.partition(b"p")?.put(b"k", b"v")?;
            Err(Error::Corrupted { reason: "boom".to_string() })
        });

        assert!(result.is_err());
        assert_eq!(read_value(&db, b"p", b"k"), None);
        assert_eq!(db.stats().commits, 0);
    }

    #[test]
    fn test_unmodified_update_skips_storage() {
        let db = Database::open_in_memory().unwrap();
        db.create_partitions(&ctx(), &[b"p".as_slice()]).unwrap();
        let syncs = db.backend().sync_count();
        let snapshot = db.snapshot_id();

        db.update(&ctx(), |txn| txn.partition(b"p")?.get(b"k").map(|_| ())).unwrap();

        assert_eq!(db.backend().sync_count(), syncs);
        assert_eq!(db.snapshot_id(), snapshot);
    }

    #[test]
    fn test_create_partitions_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.create_partitions(&ctx(), &[b"a".as_slice(), b"b".as_slice()]).unwrap();
        db.create_partitions(&ctx(), &[b"a".as_slice(), b"b".as_slice()]).unwrap();

        let names = db.view(&ctx(), |txn| Ok::<_, Error>(txn.partition_names())).unwrap();
        assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(db.stats().commits, 1);
    }

    #[test]
    fn test_delete_partition() {
        let db = Database::open_in_memory().unwrap();
        db.update(&ctx(), |txn| txn.partition(b"p")?.put(b"k", b"v")).unwrap();
        db.update(&ctx(), |txn| txn.delete_partition(b"p").map(|_| ())).unwrap();

        let exists = db.view(&ctx(), |txn| Ok::<_, Error>(txn.has_partition(b"p"))).unwrap();
        assert!(!exists);
    }

    #[test]
    fn test_explicit_abort() {
        let db = Database::open_in_memory().unwrap();
        let mut txn = db.write().unwrap();
        txn.partition(b"p").unwrap().put(b"k", b"v").unwrap();
        txn.abort();

        assert_eq!(read_value(&db, b"p", b"k"), None);
        // Lock released: a new writer can start.
        assert!(db.write().is_ok());
    }

    #[test]
    fn test_reader_registration() {
        let db = Database::open_in_memory().unwrap();
        let first = db.read().unwrap();
        let second = db.read().unwrap();
        assert_eq!(db.stats().active_readers, 2);
        drop(first);
        drop(second);
        assert_eq!(db.stats().active_readers, 0);
    }

    #[test]
    fn test_persistence_failure_leaves_state_intact() {
        let db = Database::open_in_memory().unwrap();
        db.update(&ctx(), |txn| txn.partition(b"p")?.put(b"k", b"old")).unwrap();
        let snapshot = db.snapshot_id();

        db.backend().fail_writes(true);
        let result = db.update(&ctx(), |txn| txn.partition(b"p")?.put(b"k", b"new"));
        assert!(matches!(result, Err(Error::Io { .. })));
        db.backend().fail_writes(false);

        assert_eq!(read_value(&db, b"p", b"k"), Some(b"old".to_vec()));
        assert_eq!(db.snapshot_id(), snapshot);

        // The next commit succeeds and survives a reload.
        db.update(&ctx(), |txn| txn.partition(b"p")?.put(b"k", b"newer")).unwrap();
        let bytes = db.backend().raw_bytes();
        let (_, state) = Database::<InMemoryBackend>::load_state(&backend_from(bytes)).unwrap();
        assert_eq!(
            state.partitions[&b"p"[..]].get(&b"k"[..]).map(Vec::as_slice),
            Some(&b"newer"[..])
        );
    }

    #[test]
    fn test_sync_on_commit_disabled() {
        let config = DatabaseConfig::builder().sync_on_commit(false).build();
        let db = Database::open_in_memory_with_config(config).unwrap();
        db.update(&ctx(), |txn| txn.partition(b"p")?.put(b"k", b"v")).unwrap();
        assert_eq!(db.backend().sync_count(), 0);
        assert!(!db.config().sync_on_commit);
    }

    fn backend_from(bytes: Vec<u8>) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend.write_header(&bytes[..crate::backend::HEADER_SIZE]).unwrap();
        backend
            .write_at(crate::backend::HEADER_SIZE as u64, &bytes[crate::backend::HEADER_SIZE..])
            .unwrap();
        backend
    }
}
