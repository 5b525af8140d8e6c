//! Partition handles and cursors.
//!
//! A partition is a named, independently keyed region of the store. Read
//! transactions hand out [`Partition`], write transactions hand out
//! [`PartitionMut`]; both iterate with a [`Cursor`] in ascending byte order.

use std::{
    ops::Bound::{Excluded, Included, Unbounded},
    sync::Arc,
};

use crate::{
    error::{Error, Result},
    transaction::PartitionData,
};

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: usize = 32 * 1024;

/// Maximum value size in bytes.
pub const MAX_VALUE_SIZE: usize = (1 << 31) - 1;

/// Read-only view of one partition at a snapshot.
#[derive(Debug, Clone)]
pub struct Partition {
    name: Vec<u8>,
    data: Arc<PartitionData>,
}

impl Partition {
    pub(crate) fn new(name: &[u8], data: Arc<PartitionData>) -> Self {
        Self { name: name.to_vec(), data }
    }

    /// Name of the partition.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyRequired`] if `key` is empty.
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        require_key(&self.name, key)?;
        Ok(self.data.get(key).map(Vec::as_slice))
    }

    /// Number of keys in the partition.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the partition holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cursor over the partition in ascending key order.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(Arc::clone(&self.data))
    }
}

/// Writable handle to one partition inside a write transaction.
///
/// Writes are staged in the transaction and become visible to other
/// transactions only on commit. Reads through this handle observe the
/// transaction's own staged writes.
#[derive(Debug)]
pub struct PartitionMut<'txn> {
    name: Vec<u8>,
    data: &'txn mut Arc<PartitionData>,
}

impl<'txn> PartitionMut<'txn> {
    pub(crate) fn new(name: &[u8], data: &'txn mut Arc<PartitionData>) -> Self {
        Self { name: name.to_vec(), data }
    }

    /// Name of the partition.
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Returns the value stored under `key`, including staged writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyRequired`] if `key` is empty.
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        require_key(&self.name, key)?;
        Ok(self.data.get(key).map(Vec::as_slice))
    }

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyRequired`] for an empty key, [`Error::KeyTooLarge`]
    /// or [`Error::ValueTooLarge`] when a size limit is exceeded.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        require_key(&self.name, key)?;
        if key.len() > MAX_KEY_SIZE {
            return Err(Error::KeyTooLarge { size: key.len(), max: MAX_KEY_SIZE });
        }
        if value.len() > MAX_VALUE_SIZE {
            return Err(Error::ValueTooLarge { size: value.len(), max: MAX_VALUE_SIZE });
        }

        Arc::make_mut(self.data).insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    /// Removes `key`. Returns whether it was present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyRequired`] if `key` is empty.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        require_key(&self.name, key)?;
        if !self.data.contains_key(key) {
            return Ok(false);
        }
        Ok(Arc::make_mut(self.data).remove(key).is_some())
    }

    /// Number of keys in the partition, including staged writes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the partition holds no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Cursor over the partition as staged at the time of the call.
    ///
    /// Writes made after the cursor is created do not affect it, so a caller
    /// may rewrite entries while iterating.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(Arc::clone(self.data))
    }
}

/// Ordered cursor over a partition.
///
/// `first` and `next` return `None` once no entry remains.
#[derive(Debug, Clone)]
pub struct Cursor {
    data: Arc<PartitionData>,
    last: Option<Vec<u8>>,
    exhausted: bool,
}

impl Cursor {
    fn new(data: Arc<PartitionData>) -> Self {
        Self { data, last: None, exhausted: false }
    }

    /// Moves to the smallest key.
    pub fn first(&mut self) -> Option<(&[u8], &[u8])> {
        self.last = None;
        self.exhausted = false;
        self.step((Unbounded, Unbounded))
    }

    /// Moves to the smallest key greater than or equal to `key`.
    pub fn seek(&mut self, key: &[u8]) -> Option<(&[u8], &[u8])> {
        self.exhausted = false;
        self.step((Included(key.to_vec()), Unbounded))
    }

    /// Advances to the next key. Before any positioning call this behaves like
    /// [`first`](Self::first).
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<(&[u8], &[u8])> {
        if self.exhausted {
            return None;
        }
        match self.last.take() {
            Some(last) => self.step((Excluded(last), Unbounded)),
            None => self.step((Unbounded, Unbounded)),
        }
    }

    fn step(
        &mut self,
        range: (std::ops::Bound<Vec<u8>>, std::ops::Bound<Vec<u8>>),
    ) -> Option<(&[u8], &[u8])> {
        match self.data.range::<Vec<u8>, _>(range).next() {
            Some((key, value)) => {
                self.last = Some(key.clone());
                Some((key.as_slice(), value.as_slice()))
            },
            None => {
                self.last = None;
                self.exhausted = true;
                None
            },
        }
    }
}

fn require_key(partition: &[u8], key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::KeyRequired { partition: partition.to_vec() });
    }
    Ok(())
}
