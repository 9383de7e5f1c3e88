//! In-memory record store
//!
//! Suitable for testing and for channels that should not touch the disk.

use async_trait::async_trait;
use parking_lot::RwLock;
use recordlog_core::RecordBlock;
use tracing::trace;

use crate::RecordStore;
use crate::error::StorageError;

/// In-memory implementation of [`RecordStore`]
///
/// Behaves like a record file that already exists: an empty store counts
/// zero entries instead of reporting not found.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    blocks: RwLock<Vec<RecordBlock>>,
}

impl InMemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }

    /// Drop every stored record
    pub fn clear(&self) {
        self.blocks.write().clear();
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn append(&self, block: &RecordBlock) -> Result<(), StorageError> {
        let mut blocks = self.blocks.write();
        blocks.push(*block);
        trace!(entries = blocks.len(), "Appended record in memory");
        Ok(())
    }

    async fn read_at(&self, index: u32) -> Result<RecordBlock, StorageError> {
        let blocks = self.blocks.read();
        blocks
            .get(index as usize)
            .copied()
            .ok_or(StorageError::OutOfRange {
                index,
                entries: blocks.len() as u32,
            })
    }

    async fn count_entries(&self) -> Result<u32, StorageError> {
        Ok(self.blocks.read().len() as u32)
    }
}
