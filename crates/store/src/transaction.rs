//! Snapshot state and transaction tracking for copy-on-write isolation.
//!
//! - [`SnapshotId`]: identifier of a committed database state
//! - [`CommittedState`]: the partitions visible at a snapshot
//! - [`TransactionTracker`]: live reader counts and the single writer slot

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Ordered key/value contents of one partition.
pub type PartitionData = BTreeMap<Vec<u8>, Vec<u8>>;

/// Unique identifier for a committed database snapshot.
///
/// Each successful commit increments the snapshot ID. Read transactions
/// capture the current snapshot ID to ensure they see a consistent view.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Default)]
pub struct SnapshotId(u64);

impl SnapshotId {
    /// Creates a snapshot ID with the given value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Returns the following snapshot ID.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// The committed state that readers snapshot.
///
/// Partitions are shared between snapshots through `Arc`; a write
/// transaction clones only the partitions it modifies. This is what gets
/// atomically swapped on commit.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CommittedState {
    /// Partitions by name.
    pub partitions: BTreeMap<Vec<u8>, Arc<PartitionData>>,
    /// The snapshot ID for this committed state.
    #[serde(skip)]
    pub snapshot_id: SnapshotId,
}

impl CommittedState {
    /// Total number of keys across all partitions.
    pub fn key_count(&self) -> usize {
        self.partitions.values().map(|p| p.len()).sum()
    }
}

/// Tracks live transactions.
///
/// Read transactions register the snapshot they captured; the tracker keeps
/// a reference count per snapshot. At most one write transaction is live,
/// which the database's write lock guarantees.
///
/// ```text
/// Time    Action                          live_readers
/// ----    ------                          ------------
/// T1      Commit snapshot 1               {}
/// T2      Read starts (snapshot 1)        {1: 1}
/// T3      Commit snapshot 2               {1: 1}
/// T4      Read starts (snapshot 2)        {1: 1, 2: 1}
/// T5      First read ends                 {2: 1}
/// ```
#[derive(Debug)]
pub struct TransactionTracker {
    state: Mutex<TrackerState>,
    next_snapshot_id: AtomicU64,
    commits: AtomicU64,
}

#[derive(Debug, Default)]
struct TrackerState {
    live_read_transactions: BTreeMap<SnapshotId, u64>,
    live_write_transaction: Option<SnapshotId>,
}

impl TransactionTracker {
    /// Creates a tracker that assigns `initial_snapshot_id` to the next writer.
    pub fn new(initial_snapshot_id: SnapshotId) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            next_snapshot_id: AtomicU64::new(initial_snapshot_id.raw()),
            commits: AtomicU64::new(0),
        }
    }

    /// Registers a read transaction at the given snapshot.
    pub fn register_read_transaction(&self, snapshot_id: SnapshotId) {
        let mut state = self.state.lock();
        *state.live_read_transactions.entry(snapshot_id).or_insert(0) += 1;
    }

    /// Unregisters a read transaction.
    pub fn unregister_read_transaction(&self, snapshot_id: SnapshotId) {
        let mut state = self.state.lock();
        if let Some(count) = state.live_read_transactions.get_mut(&snapshot_id) {
            *count -= 1;
            if *count == 0 {
                state.live_read_transactions.remove(&snapshot_id);
            }
        }
    }

    /// Starts the write transaction and returns the snapshot ID it will commit as.
    pub fn start_write_transaction(&self) -> SnapshotId {
        let snapshot_id = SnapshotId(self.next_snapshot_id.fetch_add(1, Ordering::SeqCst));
        let mut state = self.state.lock();
        debug_assert!(
            state.live_write_transaction.is_none(),
            "Only one write transaction allowed at a time"
        );
        state.live_write_transaction = Some(snapshot_id);
        snapshot_id
    }

    /// Ends the write transaction, counting it when it committed.
    pub fn end_write_transaction(&self, snapshot_id: SnapshotId, committed: bool) {
        let mut state = self.state.lock();
        debug_assert_eq!(
            state.live_write_transaction,
            Some(snapshot_id),
            "Ending wrong write transaction"
        );
        state.live_write_transaction = None;
        if committed {
            self.commits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Oldest snapshot still held by a reader.
    pub fn oldest_live_read_transaction(&self) -> Option<SnapshotId> {
        self.state.lock().live_read_transactions.keys().next().copied()
    }

    /// Number of live read transactions.
    pub fn active_reader_count(&self) -> usize {
        self.state.lock().live_read_transactions.values().sum::<u64>() as usize
    }

    /// Whether a write transaction is live.
    pub fn has_active_writer(&self) -> bool {
        self.state.lock().live_write_transaction.is_some()
    }

    /// Commits since the tracker was created.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }
}

impl Default for TransactionTracker {
    fn default() -> Self {
        Self::new(SnapshotId::new(1))
    }
}
