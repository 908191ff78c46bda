//! Buffer pool frame management.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::storage::{PageData, PageId};

/// Identifier for a frame within the buffer pool.
///
/// FrameId is an index into the pool's frame array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(usize);

impl FrameId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A slot in the pool holding one page's bytes.
///
/// The content lives behind its own `RwLock`, separate from the pool's
/// metadata lock. `generation` is bumped every time the frame changes hands
/// (page loaded, evicted, deleted), always while the content write lock is
/// held, so a reader holding the content lock sees a stable value.
pub(crate) struct Frame {
    data: RwLock<PageData>,
    generation: AtomicU64,
}

impl Frame {
    pub fn new() -> Self {
        Self {
            data: RwLock::new(PageData::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Bumps the generation and returns the new value.
    ///
    /// Callers must hold the content write lock.
    pub fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, PageData> {
        self.data.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, PageData> {
        self.data.write().await
    }
}

/// Per-frame bookkeeping, guarded by the pool's state lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FrameMeta {
    /// Page currently held, or `None` for a free frame.
    pub page_id: Option<PageId>,
    pub pin_count: u32,
    pub is_dirty: bool,
    /// Bumped on every `mark_dirty`; flush clears `is_dirty` only if this
    /// did not move while the write was in flight.
    pub dirty_seq: u64,
}

impl FrameMeta {
    pub fn new() -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            is_dirty: false,
            dirty_seq: 0,
        }
    }

    /// Records a freshly loaded page, pinned once by the loader.
    pub fn assign(&mut self, page_id: PageId) {
        self.page_id = Some(page_id);
        self.pin_count = 1;
        self.is_dirty = false;
    }

    pub fn reset(&mut self) {
        self.page_id = None;
        self.pin_count = 0;
        self.is_dirty = false;
    }

    /// Increments the pin count. Returns the new count.
    pub fn pin(&mut self) -> u32 {
        self.pin_count += 1;
        self.pin_count
    }

    /// Decrements the pin count. Returns the new count, or `None` (leaving
    /// the count untouched) if it was already zero.
    pub fn unpin(&mut self) -> Option<u32> {
        self.pin_count = self.pin_count.checked_sub(1)?;
        Some(self.pin_count)
    }

    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
        self.dirty_seq = self.dirty_seq.wrapping_add(1);
    }
}

/// A caller's claim on a resident page.
///
/// Returned by `fetch_page` and `new_page`. The handle names the frame and
/// the generation it was issued under; content access through a handle whose
/// frame has since been given to another page fails with
/// `BufferPoolError::StaleHandle` instead of exposing the wrong bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandle {
    frame_id: FrameId,
    page_id: PageId,
    generation: u64,
}

impl FrameHandle {
    pub(crate) const fn new(frame_id: FrameId, page_id: PageId, generation: u64) -> Self {
        Self {
            frame_id,
            page_id,
            generation,
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}
