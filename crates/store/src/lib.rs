//! tessera-store: an embedded transactional key-value store with named partitions.
//!
//! - **Named partitions**: independently keyed regions, created on first write
//! - **Single writer**: one update at a time, readers never block
//! - **Snapshot isolation**: readers see the state committed when they began
//! - **Checksummed images**: XXH3-64 over every persisted image
//! - **Dual-slot commit**: atomic commits via a flipped god byte (no WAL)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                Database API                  │
//! │        (open, view, update, stats)           │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │             Transaction Layer                │
//! │  (ReadTxn: snapshot, WriteTxn: COW+commit)  │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │              Partition Layer                 │
//! │        (get, put, delete, cursor)           │
//! └────────────────┬────────────────────────────┘
//!                  │
//! ┌────────────────▼────────────────────────────┐
//! │            Storage Backend                   │
//! │      (FileBackend / InMemoryBackend)        │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use tessera_store::Database;
//! use tessera_types::Context;
//!
//! let db = Database::open_in_memory()?;
//! let ctx = Context::background();
//!
//! db.update(&ctx, |txn| txn.partition(b"labels")?.put(b"key", b"value"))?;
//!
//! let txn = db.read()?;
//! let value = txn.partition(b"labels")?.get(b"key")?.map(<[u8]>::to_vec);
//! # Ok::<(), tessera_store::Error>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod db;
pub mod error;
pub mod partition;
pub mod transaction;

pub use backend::{
    CommitSlot, DatabaseHeader, FileBackend, HEADER_SIZE, InMemoryBackend, MAGIC, StorageBackend,
};
pub use db::{Database, DatabaseConfig, DatabaseStats, ReadTransaction, WriteTransaction};
pub use error::{Error, Result};
pub use partition::{Cursor, MAX_KEY_SIZE, MAX_VALUE_SIZE, Partition, PartitionMut};
pub use transaction::{CommittedState, PartitionData, SnapshotId, TransactionTracker};

/// Store format version.
pub const VERSION: u16 = backend::FORMAT_VERSION;
