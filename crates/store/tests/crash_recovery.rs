//! Crash recovery tests for the dual-slot commit protocol.
//!
//! Each test:
//!
//! 1. Creates a file-backed database and commits twice (both slots populated)
//! 2. Simulates a crash at a specific point by corrupting the header or image
//! 3. Reopens the database and verifies recovery
//!
//! # Crash Points in Dual-Slot Commit
//!
//! ```text
//! persist_state():
//!   1. Write image to non-overlapping region  ─┐
//!   2. Write secondary slot + header          ─┘ Pre-sync writes
//!   3. SYNC (first)                            ← corrupt secondary slot
//!   4. Flip god byte + write header            ← both slots valid, old primary
//!   5. SYNC (second)                           ← new primary
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use tessera_store::{
    Database, DatabaseHeader, Error, FileBackend, HEADER_SIZE, backend::CommitSlot,
};
use tessera_test_utils::TestDir;
use tessera_types::Context;

const PARTITION: &[u8] = b"bucketsv1";

fn ctx() -> Context {
    Context::background()
}

fn put(db: &Database<FileBackend>, key: &[u8], value: &[u8]) {
    db.update(&ctx(), |txn| txn.partition(PARTITION)?.put(key, value)).unwrap();
}

fn get(db: &Database<FileBackend>, key: &[u8]) -> Option<Vec<u8>> {
    db.view(&ctx(), |txn| match txn.partition(PARTITION) {
        Ok(partition) => Ok(partition.get(key)?.map(<[u8]>::to_vec)),
        Err(Error::PartitionNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    })
    .unwrap()
}

/// Creates a database, commits key1, then commits key2.
/// Both commit slots hold valid images afterwards.
fn setup_two_commits(dir: &Path) -> PathBuf {
    let path = dir.join("crash_test.tsr");
    let db = Database::<FileBackend>::create(&path).unwrap();
    put(&db, b"key1", &[0xAA; 64]);
    put(&db, b"key2", &[0xBB; 64]);
    path
}

fn read_header(path: &Path) -> (Vec<u8>, DatabaseHeader) {
    let mut file = std::fs::File::open(path).unwrap();
    let mut header_bytes = vec![0u8; HEADER_SIZE];
    file.read_exact(&mut header_bytes).unwrap();
    let header = DatabaseHeader::from_bytes(&header_bytes).unwrap();
    (header_bytes, header)
}

fn write_raw(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = std::fs::OpenOptions::new().read(true).write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn corrupt_slot_checksum(header_bytes: &mut [u8], slot_index: usize) {
    let slot_base = DatabaseHeader::SLOT0_OFFSET + slot_index * CommitSlot::SIZE;
    header_bytes[slot_base + 40] ^= 0xFF;
}

#[test]
fn test_reopen_observes_committed_image() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());

    let db = Database::<FileBackend>::open(&path).unwrap();
    assert_eq!(get(&db, b"key1"), Some(vec![0xAA; 64]));
    assert_eq!(get(&db, b"key2"), Some(vec![0xBB; 64]));
    assert_eq!(db.stats().snapshot_id, 2);
}

/// Secondary slot written but never synced: the old primary is used.
#[test]
fn test_crash_before_first_sync_uses_primary() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());

    let (mut header_bytes, header) = read_header(&path);
    corrupt_slot_checksum(&mut header_bytes, header.secondary_slot_index());
    write_raw(&path, 0, &header_bytes);

    let db = Database::<FileBackend>::open(&path).unwrap();
    assert_eq!(get(&db, b"key1"), Some(vec![0xAA; 64]));
    assert_eq!(get(&db, b"key2"), Some(vec![0xBB; 64]));
}

/// Third commit fully written to the secondary slot, god byte never flipped.
#[test]
fn test_crash_before_god_byte_flip_uses_previous_commit() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());
    {
        let db = Database::<FileBackend>::open(&path).unwrap();
        put(&db, b"key3", &[0xCC; 64]);
    }

    // Undo the flip: the previous primary becomes primary again.
    let (mut header_bytes, _) = read_header(&path);
    header_bytes[DatabaseHeader::GOD_BYTE_OFFSET] ^= DatabaseHeader::GOD_BYTE_SLOT_MASK;
    write_raw(&path, 0, &header_bytes);

    let db = Database::<FileBackend>::open(&path).unwrap();
    assert_eq!(get(&db, b"key2"), Some(vec![0xBB; 64]));
    assert_eq!(get(&db, b"key3"), None);
}

#[test]
fn test_corrupt_primary_slot_falls_back_to_previous_commit() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());

    let (mut header_bytes, header) = read_header(&path);
    corrupt_slot_checksum(&mut header_bytes, header.primary_slot_index());
    write_raw(&path, 0, &header_bytes);

    let db = Database::<FileBackend>::open(&path).unwrap();
    assert_eq!(get(&db, b"key1"), Some(vec![0xAA; 64]));
    assert_eq!(get(&db, b"key2"), None);
    assert_eq!(db.stats().snapshot_id, 1);
}

#[test]
fn test_corrupt_primary_image_falls_back_to_previous_commit() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());

    let (_, header) = read_header(&path);
    let primary = header.primary_slot().clone();
    assert!(primary.image_len > 0);

    // Flip one byte in the middle of the primary image; the slot itself stays valid.
    let mut byte = [0u8; 1];
    let target = primary.image_offset + primary.image_len / 2;
    {
        let mut file = std::fs::File::open(&path).unwrap();
        file.seek(SeekFrom::Start(target)).unwrap();
        file.read_exact(&mut byte).unwrap();
    }
    write_raw(&path, target, &[byte[0] ^ 0xFF]);

    let db = Database::<FileBackend>::open(&path).unwrap();
    assert_eq!(get(&db, b"key1"), Some(vec![0xAA; 64]));
    assert_eq!(get(&db, b"key2"), None);
}

#[test]
fn test_commit_after_fallback_survives_reopen() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());

    let (mut header_bytes, header) = read_header(&path);
    corrupt_slot_checksum(&mut header_bytes, header.primary_slot_index());
    write_raw(&path, 0, &header_bytes);

    {
        let db = Database::<FileBackend>::open(&path).unwrap();
        put(&db, b"key4", &[0xDD; 8]);
    }

    let db = Database::<FileBackend>::open(&path).unwrap();
    assert_eq!(get(&db, b"key1"), Some(vec![0xAA; 64]));
    assert_eq!(get(&db, b"key4"), Some(vec![0xDD; 8]));

    // The image recovered from is still referenced by the other slot.
    let (_, header) = read_header(&path);
    assert_eq!(header.valid_slots().len(), 2);
}

#[test]
fn test_both_slots_corrupt_returns_error() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());

    let (mut header_bytes, _) = read_header(&path);
    corrupt_slot_checksum(&mut header_bytes, 0);
    corrupt_slot_checksum(&mut header_bytes, 1);
    write_raw(&path, 0, &header_bytes);

    let result = Database::<FileBackend>::open(&path);
    assert!(matches!(result, Err(Error::Corrupted { .. })));
}

#[test]
fn test_recovery_after_many_commits() {
    let dir = TestDir::new();
    let path = dir.join("many.tsr");
    {
        let db = Database::<FileBackend>::create(&path).unwrap();
        for i in 0u32..50 {
            put(&db, format!("key{i:03}").as_bytes(), &i.to_le_bytes());
        }
    }

    let db = Database::<FileBackend>::open(&path).unwrap();
    for i in 0u32..50 {
        assert_eq!(get(&db, format!("key{i:03}").as_bytes()), Some(i.to_le_bytes().to_vec()));
    }
    assert_eq!(db.stats().snapshot_id, 50);

    // Images alternate between two regions instead of growing without bound.
    let file_size = std::fs::metadata(&path).unwrap().len();
    let (_, header) = read_header(&path);
    assert!(file_size <= HEADER_SIZE as u64 + 3 * header.primary_slot().image_len);
}

#[test]
fn test_recovery_after_delete_commit() {
    let dir = TestDir::new();
    let path = setup_two_commits(dir.path());
    {
        let db = Database::<FileBackend>::open(&path).unwrap();
        db.update(&ctx(), |txn| txn.partition(PARTITION)?.delete(b"key1").map(|_| ())).unwrap();
    }

    let db = Database::<FileBackend>::open(&path).unwrap();
    assert_eq!(get(&db, b"key1"), None);
    assert_eq!(get(&db, b"key2"), Some(vec![0xBB; 64]));
}

#[test]
fn test_open_or_create_on_fresh_path() {
    let dir = TestDir::new();
    let path = dir.join("fresh.tsr");
    {
        let db = Database::<FileBackend>::open_or_create(&path, Default::default()).unwrap();
        assert_eq!(db.stats().partitions, 0);
        put(&db, b"k", b"v");
    }
    let db = Database::<FileBackend>::open_or_create(&path, Default::default()).unwrap();
    assert_eq!(get(&db, b"k"), Some(b"v".to_vec()));
}
