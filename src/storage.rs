//! Storage layer: page I/O and the buffer pool on top of it.
//!
//! All persistent data is stored in 8KB pages.
//!
//! # Architecture
//!
//! ```text
//! +-------------------+
//! | BufferPool        |  <- frames, page table, clock replacer
//! +-------------------+
//!          |
//!          v
//! +-------------------+
//! | Storage trait     |  <- io
//! +-------------------+
//!       /      \
//!      v        v
//! +--------------+ +-------------+
//! | MemoryStorage| | FileStorage |
//! +--------------+ +-------------+
//! ```

pub mod buffer;
pub mod error;
pub mod io;
pub mod page;

pub use buffer::{
    BufferPool, BufferPoolConfig, BufferPoolError, ClockReplacer, FrameHandle, FrameId,
    PageReadGuard, PageWriteGuard, PoolObserver, PoolOp, Replacer,
};
pub use error::StorageError;
pub use io::{FileStorage, MemoryStorage, Storage};
pub use page::{PAGE_SIZE, PageData, PageId};
