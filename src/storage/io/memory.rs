//! In-memory page storage.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::Storage;
use crate::storage::error::StorageError;
use crate::storage::page::{PAGE_SIZE, PageId};

/// In-memory page storage for tests and scratch pools.
///
/// Pages live in a `HashMap` keyed by id; ids come from a monotonic counter
/// so a deallocated id is never handed out again. Nothing survives a drop.
pub struct MemoryStorage {
    inner: Mutex<MemoryInner>,
    /// Maximum number of live pages, for exercising `StorageFull`.
    max_pages: Option<usize>,
}

struct MemoryInner {
    pages: HashMap<PageId, Box<[u8; PAGE_SIZE]>>,
    next_page_id: u64,
}

impl MemoryStorage {
    /// Creates a new empty in-memory storage.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MemoryInner {
                pages: HashMap::new(),
                next_page_id: 0,
            }),
            max_pages: None,
        }
    }

    /// Creates a storage that refuses to hold more than `max_pages` live pages.
    pub fn with_max_pages(max_pages: usize) -> Self {
        Self {
            max_pages: Some(max_pages),
            ..Self::new()
        }
    }

    fn check_buffer(len: usize) -> Result<(), StorageError> {
        if len != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: len,
            });
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        Self::check_buffer(buf.len())?;

        let inner = self.inner.lock();
        let page = inner
            .pages
            .get(&page_id)
            .ok_or(StorageError::PageNotFound(page_id))?;
        buf.copy_from_slice(page.as_slice());
        Ok(())
    }

    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        Self::check_buffer(buf.len())?;

        let mut inner = self.inner.lock();
        let page = inner
            .pages
            .get_mut(&page_id)
            .ok_or(StorageError::PageNotFound(page_id))?;
        page.copy_from_slice(buf);
        Ok(())
    }

    async fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut inner = self.inner.lock();
        if let Some(max) = self.max_pages
            && inner.pages.len() >= max
        {
            return Err(StorageError::StorageFull);
        }

        let page_id = PageId::new(inner.next_page_id);
        inner.next_page_id += 1;
        inner.pages.insert(page_id, Box::new([0u8; PAGE_SIZE]));
        Ok(page_id)
    }

    async fn deallocate_page(&self, page_id: PageId) -> Result<(), StorageError> {
        self.inner.lock().pages.remove(&page_id);
        Ok(())
    }

    async fn page_count(&self) -> usize {
        self.inner.lock().pages.len()
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}
