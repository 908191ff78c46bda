//! Storage layer errors.

use thiserror::Error;

use crate::storage::PageId;

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The page was never allocated, or has been deallocated.
    #[error("page not found: {0}")]
    PageNotFound(PageId),

    /// Buffers passed to `read_page`/`write_page` must be exactly PAGE_SIZE bytes.
    #[error("invalid buffer size: expected {expected}, got {actual}")]
    InvalidBufferSize { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend refuses to allocate more pages.
    #[error("storage is full")]
    StorageFull,

    /// The backing file has an invalid format or size.
    #[error("data corruption: {0}")]
    Corrupted(String),
}
