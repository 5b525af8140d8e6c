//! In-memory storage backend for testing and ephemeral stores.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{DatabaseHeader, HEADER_SIZE, StorageBackend};
use crate::error::{Error, Result};

/// In-memory storage backend.
///
/// Holds the whole "file" (header plus image region) in one buffer, so the
/// same dual-slot protocol runs as on disk. Data is lost when the backend is
/// dropped.
///
/// Failure injection: [`fail_writes`](Self::fail_writes) makes every
/// subsequent write or sync return an I/O error.
#[derive(Debug)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
    fail_writes: AtomicBool,
    syncs: AtomicU64,
}

impl InMemoryBackend {
    /// Creates an empty in-memory backend with a fresh header.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(DatabaseHeader::new().to_bytes().to_vec()),
            fail_writes: AtomicBool::new(false),
            syncs: AtomicU64::new(0),
        }
    }

    /// Makes writes and syncs fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful syncs so far.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::SeqCst)
    }

    /// Copy of the raw bytes, header included.
    pub fn raw_bytes(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Flips bits at `offset` (for corruption tests). Out-of-range offsets are ignored.
    pub fn corrupt_byte(&self, offset: usize, mask: u8) {
        if let Some(byte) = self.data.write().get_mut(offset) {
            *byte ^= mask;
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Io {
                source: std::io::Error::other("injected write failure"),
            });
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for InMemoryBackend {
    fn read_header(&self) -> Result<Vec<u8>> {
        Ok(self.data.read()[..HEADER_SIZE].to_vec())
    }

    fn write_header(&self, header: &[u8]) -> Result<()> {
        if header.len() != HEADER_SIZE {
            return Err(Error::Corrupted {
                reason: format!("Invalid header size: {} (expected {})", header.len(), HEADER_SIZE),
            });
        }
        self.check_writable()?;

        self.data.write()[..HEADER_SIZE].copy_from_slice(header);
        Ok(())
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let data = self.data.read();
        let start = offset as usize;
        data.get(start..start + len).map(<[u8]>::to_vec).ok_or_else(|| Error::Io {
            source: std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("read of {len} bytes at {offset} past end of {} bytes", data.len()),
            ),
        })
    }

    fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        if offset < HEADER_SIZE as u64 {
            return Err(Error::Corrupted {
                reason: format!("Image write at offset {offset} overlaps the header"),
            });
        }
        self.check_writable()?;

        let mut data = self.data.write();
        let start = offset as usize;
        let end = start + bytes.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.check_writable()?;
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.data.read().len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_backend_has_header_only() {
        let backend = InMemoryBackend::new();
        assert_eq!(backend.file_size().unwrap(), HEADER_SIZE as u64);
        assert!(DatabaseHeader::from_bytes(&backend.read_header().unwrap()).is_ok());
    }

    #[test]
    fn test_write_grows_storage() {
        let backend = InMemoryBackend::new();
        backend.write_at(HEADER_SIZE as u64 + 4, b"abc").unwrap();
        assert_eq!(backend.file_size().unwrap(), HEADER_SIZE as u64 + 7);
        assert_eq!(backend.read_at(HEADER_SIZE as u64 + 4, 3).unwrap(), b"abc");
    }

    #[test]
    fn test_injected_failures() {
        let backend = InMemoryBackend::new();
        backend.fail_writes(true);
        assert!(matches!(backend.write_at(HEADER_SIZE as u64, b"x"), Err(Error::Io { .. })));
        assert!(backend.sync().is_err());
        assert_eq!(backend.sync_count(), 0);

        backend.fail_writes(false);
        backend.sync().unwrap();
        assert_eq!(backend.sync_count(), 1);
    }

    #[test]
    fn test_corrupt_byte() {
        let backend = InMemoryBackend::new();
        backend.corrupt_byte(0, 0xFF);
        let header = backend.read_header().unwrap();
        assert!(matches!(DatabaseHeader::from_bytes(&header), Err(Error::InvalidMagic)));
    }
}
