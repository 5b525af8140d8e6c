//! File-based storage backend using position-based I/O (`pread`/`pwrite`).
//!
//! On Unix, reads are lock-free via [`std::os::unix::fs::FileExt`]:
//! `read_exact_at()` takes `&self` and never touches the file cursor.
//!
//! Writes are serialized via a [`parking_lot::Mutex`] guard (a unit `()`
//! sentinel, not wrapping the `File`) to prevent concurrent file extensions
//! and torn writes.

#[cfg(unix)]
use std::os::unix::fs::FileExt;
#[cfg(windows)]
use std::os::windows::fs::FileExt;
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;

use super::{DatabaseHeader, HEADER_SIZE, StorageBackend};
use crate::error::{Error, Result};

/// File-based storage backend.
///
/// Durability requires the caller to invoke [`sync`](StorageBackend::sync)
/// after writes. Crash safety is provided by the dual-slot commit protocol
/// in [`DatabaseHeader`], not by this backend alone.
#[derive(Debug)]
pub struct FileBackend {
    file: File,
    write_lock: Mutex<()>,
    path: PathBuf,
}

impl FileBackend {
    /// Opens an existing database file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be opened or the header cannot be read.
    /// Returns [`Error::InvalidMagic`] if the file is not a Tessera database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut header_buf = vec![0u8; HEADER_SIZE];
        read_exact_at_offset(&file, &mut header_buf, 0)?;
        DatabaseHeader::from_bytes(&header_buf)?;

        Ok(Self { file, write_lock: Mutex::new(()), path })
    }

    /// Creates a new database file, truncating any existing one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be created or written.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file =
            OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path)?;

        // Exclusively owned at this point, so plain Write is fine.
        file.write_all(&DatabaseHeader::new().to_bytes())?;
        file.sync_all()?;

        Ok(Self { file, write_lock: Mutex::new(()), path })
    }

    /// Opens the file if it exists, otherwise creates it.
    ///
    /// # Errors
    ///
    /// See [`FileBackend::open`] and [`FileBackend::create`].
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() { Self::open(path) } else { Self::create(path) }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StorageBackend for FileBackend {
    fn read_header(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; HEADER_SIZE];
        read_exact_at_offset(&self.file, &mut buf, 0)?;
        Ok(buf)
    }

    fn write_header(&self, header: &[u8]) -> Result<()> {
        if header.len() != HEADER_SIZE {
            return Err(Error::Corrupted {
                reason: format!("Invalid header size: {} (expected {})", header.len(), HEADER_SIZE),
            });
        }

        let _guard = self.write_lock.lock();
        write_all_at_offset(&self.file, header, 0)?;
        Ok(())
    }

    fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        read_exact_at_offset(&self.file, &mut buf, offset)?;
        Ok(buf)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset < HEADER_SIZE as u64 {
            return Err(Error::Corrupted {
                reason: format!("Image write at offset {offset} overlaps the header"),
            });
        }

        let _guard = self.write_lock.lock();
        write_all_at_offset(&self.file, data, offset)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }
}

// ---------------------------------------------------------------------------
// Platform-specific position-based I/O helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn read_exact_at_offset(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
    file.read_exact_at(buf, offset)?;
    Ok(())
}

/// `seek_read` updates the file cursor, so this is not lock-free.
#[cfg(windows)]
fn read_exact_at_offset(file: &File, buf: &mut [u8], offset: u64) -> Result<()> {
    let mut pos = 0;
    while pos < buf.len() {
        let n = file.seek_read(&mut buf[pos..], offset + pos as u64)?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "unexpected end of file during seek_read",
            )
            .into());
        }
        pos += n;
    }
    Ok(())
}

#[cfg(unix)]
fn write_all_at_offset(file: &File, data: &[u8], offset: u64) -> Result<()> {
    file.write_all_at(data, offset)?;
    Ok(())
}

#[cfg(windows)]
fn write_all_at_offset(file: &File, data: &[u8], offset: u64) -> Result<()> {
    let mut pos = 0;
    while pos < data.len() {
        let n = file.seek_write(&data[pos..], offset + pos as u64)?;
        pos += n;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tessera_test_utils::TestDir;

    use super::*;

    #[test]
    fn test_create_writes_valid_header() {
        let dir = TestDir::new();
        let backend = FileBackend::create(dir.join("t.db")).unwrap();

        assert_eq!(backend.file_size().unwrap(), HEADER_SIZE as u64);
        let header = DatabaseHeader::from_bytes(&backend.read_header().unwrap()).unwrap();
        assert_eq!(header.validate_and_choose_slot().unwrap(), 0);
    }

    #[test]
    fn test_write_and_read_at_offset() {
        let dir = TestDir::new();
        let backend = FileBackend::create(dir.join("t.db")).unwrap();

        let offset = HEADER_SIZE as u64 + 10;
        backend.write_at(offset, b"partition image").unwrap();
        backend.sync().unwrap();

        assert_eq!(backend.read_at(offset, 15).unwrap(), b"partition image");
        assert_eq!(backend.file_size().unwrap(), offset + 15);
    }

    #[test]
    fn test_write_into_header_is_rejected() {
        let dir = TestDir::new();
        let backend = FileBackend::create(dir.join("t.db")).unwrap();
        assert!(matches!(backend.write_at(8, b"x"), Err(Error::Corrupted { .. })));
    }

    #[test]
    fn test_read_past_end_fails() {
        let dir = TestDir::new();
        let backend = FileBackend::create(dir.join("t.db")).unwrap();
        assert!(matches!(backend.read_at(HEADER_SIZE as u64, 1), Err(Error::Io { .. })));
    }

    #[test]
    fn test_open_rejects_foreign_file() {
        let dir = TestDir::new();
        let path = dir.join("foreign.db");
        std::fs::write(&path, vec![0xAB; HEADER_SIZE]).unwrap();
        assert!(matches!(FileBackend::open(&path), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_open_or_create() {
        let dir = TestDir::new();
        let path = dir.join("t.db");
        let created = FileBackend::open_or_create(&path).unwrap();
        assert_eq!(created.path(), path.as_path());
        drop(created);
        assert!(FileBackend::open_or_create(&path).is_ok());
    }
}
