//! Buffer pool errors.

use thiserror::Error;

use crate::storage::{PageId, StorageError};

/// Buffer pool errors.
///
/// Wraps storage-level errors and adds the conditions the pool itself can
/// hit.
#[derive(Debug, Error)]
pub enum BufferPoolError {
    /// Every frame is pinned; nothing can be evicted.
    ///
    /// The pool reports this immediately instead of waiting for an unpin.
    #[error("buffer pool exhausted: all frames are pinned")]
    NoFreeFrames,

    /// The handle's frame has since been given to another page.
    #[error("stale handle for page {page_id}: frame was reassigned")]
    StaleHandle { page_id: PageId },

    /// Underlying storage error.
    ///
    /// This includes `StorageError::PageNotFound` when fetching a page that
    /// doesn't exist in storage.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
