//! Storage backend abstraction for the store.
//!
//! The backend trait abstracts the underlying storage mechanism,
//! allowing both file-based (production) and in-memory (testing) implementations.
//!
//! # File Layout
//!
//! ```text
//! | header (256 bytes) | image region ... |
//! ```
//!
//! The header holds two commit slots. Each slot points at a postcard-encoded
//! image of every partition (offset, length, XXH3-64 checksum) in the image
//! region. A new image is always written where it cannot overlap the image
//! referenced by the active slot.
//!
//! # Crash Safety: Dual-Slot Commit
//!
//! - The header contains TWO commit slots (primary and secondary)
//! - A "god byte" indicates which slot is currently active
//! - Commits write to the INACTIVE slot, then flip the god byte
//! - Recovery reads both slots and uses the valid one

mod file;
mod memory;

pub use file::FileBackend;
pub use memory::InMemoryBackend;

use crate::error::{Error, Result};

/// Database header size.
/// Layout: 16-byte common header + 2 × 64-byte commit slots + 112-byte reserved.
pub const HEADER_SIZE: usize = 256;

/// Magic number for Tessera database files.
pub const MAGIC: &[u8; 8] = b"TESSERA\0";

/// Current format version.
pub const FORMAT_VERSION: u16 = 1;

/// Storage backend trait for abstracting file I/O.
pub trait StorageBackend: Send + Sync {
    /// Reads the database header ([`HEADER_SIZE`] bytes).
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the read fails.
    fn read_header(&self) -> Result<Vec<u8>>;

    /// Writes the database header.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the write fails.
    /// Returns `Error::Corrupted` if the header size is incorrect.
    fn write_header(&self, header: &[u8]) -> Result<()>;

    /// Reads `len` bytes at an absolute byte offset.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the read fails or runs past the end of storage.
    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Writes `data` at an absolute byte offset, growing storage as needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the write fails.
    /// Returns `Error::Corrupted` if the write would touch the header.
    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()>;

    /// Flushes all writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the sync fails.
    fn sync(&self) -> Result<()>;

    /// Returns the current storage size in bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the metadata query fails.
    fn file_size(&self) -> Result<u64>;
}

fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

/// A single commit slot describing one durable image.
///
/// Two of these are stored in the header. The "god byte" indicates which is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSlot {
    /// Byte offset of the image.
    pub image_offset: u64,
    /// Length of the image in bytes (0 = empty database).
    pub image_len: u64,
    /// XXH3-64 checksum of the image bytes.
    pub image_checksum: u64,
    /// Snapshot the image captures.
    pub snapshot_id: u64,
    /// Timestamp of the commit (Unix epoch seconds).
    pub last_write_timestamp: u64,
    /// Checksum of this slot's fields (XXH3-64).
    pub checksum: u64,
}

impl CommitSlot {
    /// Size of a commit slot on disk (64 bytes).
    pub const SIZE: usize = 64;

    /// Size of checksum-protected region (5 × 8-byte fields before checksum).
    pub const CHECKSUMMED_SIZE: usize = 40;

    /// Serializes the slot to bytes, computing the checksum.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];

        buf[0..8].copy_from_slice(&self.image_offset.to_le_bytes());
        buf[8..16].copy_from_slice(&self.image_len.to_le_bytes());
        buf[16..24].copy_from_slice(&self.image_checksum.to_le_bytes());
        buf[24..32].copy_from_slice(&self.snapshot_id.to_le_bytes());
        buf[32..40].copy_from_slice(&self.last_write_timestamp.to_le_bytes());

        let checksum = xxhash_rust::xxh3::xxh3_64(&buf[0..Self::CHECKSUMMED_SIZE]);
        buf[40..48].copy_from_slice(&checksum.to_le_bytes());

        // Bytes 48-63 are reserved/padding
        buf
    }

    /// Deserializes from bytes, keeping the stored checksum.
    pub fn from_bytes(buf: &[u8]) -> Option<Self> {
        if buf.len() < Self::SIZE {
            return None;
        }

        Some(Self {
            image_offset: read_u64(buf, 0),
            image_len: read_u64(buf, 8),
            image_checksum: read_u64(buf, 16),
            snapshot_id: read_u64(buf, 24),
            last_write_timestamp: read_u64(buf, 32),
            checksum: read_u64(buf, 40),
        })
    }

    /// Verifies the checksum of this slot.
    pub fn verify_checksum(&self) -> bool {
        let buf = self.to_bytes();
        let expected = xxhash_rust::xxh3::xxh3_64(&buf[0..Self::CHECKSUMMED_SIZE]);
        self.checksum == expected
    }

    /// First byte past the image.
    pub fn image_end(&self) -> u64 {
        self.image_offset + self.image_len
    }
}

/// Database header structure with dual-slot commit for crash safety.
///
/// # Layout (256 bytes total)
///
/// - Bytes 0-15: Common header (magic, version, reserved, god_byte)
/// - Bytes 16-79: Commit slot 0 (64 bytes)
/// - Bytes 80-143: Commit slot 1 (64 bytes)
/// - Bytes 144-255: Reserved
///
/// Bit 0 of the god byte (byte 15) is the primary slot index.
///
/// # Commit Sequence
///
/// 1. Write the new image where it does not overlap the primary's image.
/// 2. Write the new slot into the secondary position and the header.
/// 3. Sync. The secondary slot now has a valid checksum.
/// 4. Flip the god byte and write the header. This is the commit point.
/// 5. Sync.
///
/// A crash before step 4 leaves the old primary valid; after step 3 both
/// slots describe intact images.
#[derive(Debug, Clone)]
pub struct DatabaseHeader {
    /// Magic number: "TESSERA\0"
    pub magic: [u8; 8],
    /// Format version.
    pub version: u16,
    /// God byte: bit 0 = primary slot.
    pub god_byte: u8,
    /// Commit slot 0.
    pub slot0: CommitSlot,
    /// Commit slot 1.
    pub slot1: CommitSlot,
}

impl DatabaseHeader {
    /// Total header size on disk.
    pub const SIZE: usize = HEADER_SIZE;

    /// Offset of the god byte in the header.
    pub const GOD_BYTE_OFFSET: usize = 15;

    /// Bit mask for primary slot index in god byte.
    pub const GOD_BYTE_SLOT_MASK: u8 = 0x01;

    /// Offset of slot 0.
    pub const SLOT0_OFFSET: usize = 16;

    /// Offset of slot 1.
    pub const SLOT1_OFFSET: usize = Self::SLOT0_OFFSET + CommitSlot::SIZE;

    /// Creates a new empty header. Both slots describe the empty database.
    pub fn new() -> Self {
        Self {
            magic: *MAGIC,
            version: FORMAT_VERSION,
            god_byte: 0,
            slot0: CommitSlot::default(),
            slot1: CommitSlot::default(),
        }
    }

    /// Returns the index of the primary (active) slot.
    pub fn primary_slot_index(&self) -> usize {
        (self.god_byte & Self::GOD_BYTE_SLOT_MASK) as usize
    }

    /// Returns the index of the secondary (inactive) slot.
    pub fn secondary_slot_index(&self) -> usize {
        1 - self.primary_slot_index()
    }

    /// Returns a reference to the primary (active) commit slot.
    pub fn primary_slot(&self) -> &CommitSlot {
        self.slot(self.primary_slot_index())
    }

    /// Returns a mutable reference to the secondary (inactive) commit slot.
    pub fn secondary_slot_mut(&mut self) -> &mut CommitSlot {
        if self.secondary_slot_index() == 0 { &mut self.slot0 } else { &mut self.slot1 }
    }

    /// Returns a reference to a slot by index.
    pub fn slot(&self, index: usize) -> &CommitSlot {
        if index == 0 { &self.slot0 } else { &self.slot1 }
    }

    /// Flips the primary slot (toggle bit 0 of god byte).
    pub fn flip_primary_slot(&mut self) {
        self.god_byte ^= Self::GOD_BYTE_SLOT_MASK;
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];

        buf[0..8].copy_from_slice(&self.magic);
        buf[8..10].copy_from_slice(&self.version.to_le_bytes());
        buf[Self::GOD_BYTE_OFFSET] = self.god_byte;
        buf[Self::SLOT0_OFFSET..Self::SLOT0_OFFSET + CommitSlot::SIZE]
            .copy_from_slice(&self.slot0.to_bytes());
        buf[Self::SLOT1_OFFSET..Self::SLOT1_OFFSET + CommitSlot::SIZE]
            .copy_from_slice(&self.slot1.to_bytes());
        buf
    }

    /// Deserializes from bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::Corrupted` if the buffer is too short.
    /// Returns `Error::InvalidMagic` if the magic number does not match.
    /// Returns `Error::UnsupportedVersion` if the format version is unsupported.
    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(Error::Corrupted { reason: "Header too short".to_string() });
        }

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&buf[0..8]);
        if magic != *MAGIC {
            return Err(Error::InvalidMagic);
        }

        let version = u16::from_le_bytes([buf[8], buf[9]]);
        if version > FORMAT_VERSION {
            return Err(Error::UnsupportedVersion { version });
        }

        let slot = |offset: usize, index: usize| {
            CommitSlot::from_bytes(&buf[offset..offset + CommitSlot::SIZE]).ok_or_else(|| {
                Error::Corrupted { reason: format!("Failed to parse commit slot {index}") }
            })
        };

        Ok(Self {
            magic,
            version,
            god_byte: buf[Self::GOD_BYTE_OFFSET],
            slot0: slot(Self::SLOT0_OFFSET, 0)?,
            slot1: slot(Self::SLOT1_OFFSET, 1)?,
        })
    }

    /// Slot indexes whose checksums verify, primary first.
    pub fn valid_slots(&self) -> Vec<usize> {
        [self.primary_slot_index(), self.secondary_slot_index()]
            .into_iter()
            .filter(|&index| self.slot(index).verify_checksum())
            .collect()
    }

    /// Validates the header and determines which slot to use.
    ///
    /// If the indicated primary slot has an invalid checksum, tries the secondary.
    ///
    /// # Errors
    ///
    /// Returns `Error::Corrupted` if both commit slots have invalid checksums.
    pub fn validate_and_choose_slot(&self) -> Result<usize> {
        self.valid_slots().first().copied().ok_or_else(|| Error::Corrupted {
            reason: "Both commit slots have invalid checksums".to_string(),
        })
    }

    /// Offset at which the next image may be written without overlapping the
    /// primary slot's image.
    pub fn next_image_offset(&self, image_len: u64) -> u64 {
        let start = HEADER_SIZE as u64;
        let primary = self.primary_slot();
        if primary.image_len == 0 || start + image_len <= primary.image_offset {
            start
        } else {
            primary.image_end().max(start)
        }
    }
}

impl Default for DatabaseHeader {
    fn default() -> Self {
        Self::new()
    }
}
