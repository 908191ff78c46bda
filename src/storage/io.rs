//! Page I/O backends.
//!
//! The buffer pool talks to durable storage only through the [`Storage`]
//! trait. Two backends ship with the crate: [`MemoryStorage`] for tests and
//! [`FileStorage`] for a single data file.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::future::Future;
use std::sync::Arc;

use super::page::PageId;
use crate::storage::error::StorageError;

/// Durable page storage.
///
/// Implementations read and write whole pages into caller-owned buffers and
/// hand out page ids. They do no caching; that is the buffer pool's job.
///
/// # Contract
///
/// - Buffers must be exactly `PAGE_SIZE` bytes, otherwise
///   `StorageError::InvalidBufferSize`.
/// - A freshly allocated page reads back as zeros.
/// - Page ids are never reused, even after `deallocate_page`.
/// - Reading or writing an unknown or deallocated page yields
///   `StorageError::PageNotFound`.
///
/// Implementations must be `Send + Sync`; the pool serializes nothing on
/// their behalf beyond its own locking.
pub trait Storage: Send + Sync {
    /// Reads a page into `buf`.
    fn read_page(
        &self,
        page_id: PageId,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Writes `buf` as the page's new content.
    fn write_page(
        &self,
        page_id: PageId,
        buf: &[u8],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Allocates a new zeroed page and returns its id.
    fn allocate_page(&self) -> impl Future<Output = Result<PageId, StorageError>> + Send;

    /// Releases a page. Unknown or already released ids are a no-op.
    fn deallocate_page(
        &self,
        page_id: PageId,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Returns the number of live pages.
    fn page_count(&self) -> impl Future<Output = usize> + Send;

    /// Forces written pages to durable media. A no-op for memory backends.
    fn sync_all(&self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

impl<S: Storage> Storage for Arc<S> {
    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        (**self).read_page(page_id, buf).await
    }

    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        (**self).write_page(page_id, buf).await
    }

    async fn allocate_page(&self) -> Result<PageId, StorageError> {
        (**self).allocate_page().await
    }

    async fn deallocate_page(&self, page_id: PageId) -> Result<(), StorageError> {
        (**self).deallocate_page(page_id).await
    }

    async fn page_count(&self) -> usize {
        (**self).page_count().await
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        (**self).sync_all().await
    }
}
