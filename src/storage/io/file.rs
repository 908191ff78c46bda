//! File-backed storage implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex as SyncMutex;
use tokio::fs::{File as TokioFile, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageId};

/// File-backed storage.
///
/// Stores pages as contiguous 8KB blocks in a single file; page `n` lives at
/// byte offset `n * PAGE_SIZE`.
///
/// ```text
/// +------------------+------------------+------------------+
/// | Page 0 (8KB)     | Page 1 (8KB)     | Page 2 (8KB)     | ...
/// +------------------+------------------+------------------+
/// ^ offset 0         ^ offset 8192      ^ offset 16384
/// ```
///
/// Deallocated pages keep their slot in the file; their ids are remembered in
/// memory for the lifetime of the handle and refused by `read_page` and
/// `write_page`. The file handle sits behind a `tokio::sync::Mutex`, so I/O is
/// serialized.
pub struct FileStorage {
    path: PathBuf,
    file: Mutex<TokioFile>,
    /// Number of page slots in the file, live or deallocated.
    page_slots: AtomicU64,
    deallocated: SyncMutex<HashSet<PageId>>,
}

impl FileStorage {
    /// Opens or creates a storage file at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupted` if the file size is not a multiple
    /// of PAGE_SIZE.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        let file_size = file.metadata().await?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::Corrupted(format!(
                "file size {} is not a multiple of page size {}",
                file_size, PAGE_SIZE
            )));
        }

        tracing::debug!(path = %path.display(), pages = file_size / PAGE_SIZE as u64, "opened page file");

        Ok(Self {
            path,
            file: Mutex::new(file),
            page_slots: AtomicU64::new(file_size / PAGE_SIZE as u64),
            deallocated: SyncMutex::new(HashSet::new()),
        })
    }

    /// Returns the path to the storage file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_access(&self, page_id: PageId, len: usize) -> Result<(), StorageError> {
        if len != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: len,
            });
        }

        let in_file = page_id.page_num() < self.page_slots.load(Ordering::Acquire);
        let released = self.deallocated.lock().contains(&page_id);
        if !in_file || released {
            return Err(StorageError::PageNotFound(page_id));
        }
        Ok(())
    }
}

impl Storage for FileStorage {
    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check_access(page_id, buf.len())?;

        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(page_id.byte_offset()))
            .await?;
        file.read_exact(buf).await?;
        Ok(())
    }

    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        self.check_access(page_id, buf.len())?;

        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(page_id.byte_offset()))
            .await?;
        file.write_all(buf).await?;
        Ok(())
    }

    async fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut file = self.file.lock().await;

        let page_id = PageId::new(self.page_slots.load(Ordering::Acquire));

        // Extend the file with a zeroed page.
        file.seek(std::io::SeekFrom::Start(page_id.byte_offset()))
            .await?;
        file.write_all(&[0u8; PAGE_SIZE]).await?;

        self.page_slots
            .store(page_id.page_num() + 1, Ordering::Release);
        Ok(page_id)
    }

    async fn deallocate_page(&self, page_id: PageId) -> Result<(), StorageError> {
        if page_id.page_num() < self.page_slots.load(Ordering::Acquire) {
            self.deallocated.lock().insert(page_id);
        }
        Ok(())
    }

    async fn page_count(&self) -> usize {
        let slots = self.page_slots.load(Ordering::Acquire) as usize;
        slots - self.deallocated.lock().len()
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        let file = self.file.lock().await;
        file.sync_all().await?;
        Ok(())
    }
}
