//! Buffer pool for caching pages in memory.
//!
//! The buffer pool sits between the storage layer and its callers, keeping a
//! fixed set of frames filled with recently used pages to minimize I/O.
//!
//! # Components
//!
//! - [`BufferPool`]: page table, free list and pin bookkeeping
//! - [`FrameHandle`]: a pinned page's frame, checked on every content access
//! - [`PageReadGuard`], [`PageWriteGuard`]: latched access to page bytes
//! - [`Replacer`]: trait for page replacement policies
//! - [`ClockReplacer`]: clock (second chance) implementation
//! - [`PoolObserver`]: optional before/after hooks
//!
//! # Latch Hierarchy
//!
//! 1. Pool state lock (page table, frame metadata, free list, replacer)
//! 2. Frame content locks
//!
//! See [`BufferPool`] for the rules callers must follow.
//!
//! # Example
//!
//! ```no_run
//! use pagepool::storage::{BufferPool, BufferPoolConfig, MemoryStorage};
//!
//! # async fn example() -> Result<(), pagepool::storage::BufferPoolError> {
//! let bpm = BufferPool::new(MemoryStorage::new(), BufferPoolConfig::new(100));
//!
//! // Create a new page
//! let handle = bpm.new_page().await?;
//! let mut page = bpm.write_page(&handle).await?;
//! page[0] = 42;
//! drop(page);
//! let page_id = handle.page_id();
//! bpm.unpin_page(page_id, true).await;
//!
//! // Fetch it later
//! let handle = bpm.fetch_page(page_id).await?;
//! assert_eq!(bpm.read_page(&handle).await?[0], 42);
//! bpm.unpin_page(page_id, false).await;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod frame;
mod guard;
mod observer;
mod pool;
mod replacer;

pub use config::BufferPoolConfig;
pub use error::BufferPoolError;
pub use frame::{FrameHandle, FrameId};
pub use guard::{PageReadGuard, PageWriteGuard};
pub use observer::{PoolObserver, PoolOp};
pub use pool::BufferPool;
pub use replacer::{ClockReplacer, Replacer};
