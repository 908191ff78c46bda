//! Buffer pool manager for caching pages in memory.
//!
//! The buffer pool sits between the storage layer and higher-level
//! components, caching frequently accessed pages in memory to reduce I/O.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tokio::sync::{RwLock, RwLockWriteGuard};
use tracing::{debug, trace, warn};

use crate::storage::{PageData, PageId, Storage, StorageError};

use super::config::BufferPoolConfig;
use super::error::BufferPoolError;
use super::frame::{Frame, FrameHandle, FrameId, FrameMeta};
use super::guard::{PageReadGuard, PageWriteGuard};
use super::observer::{PoolObserver, PoolOp};
use super::replacer::{ClockReplacer, Replacer};

/// Buffer pool manager for caching pages in memory.
///
/// The pool owns a fixed number of frames and maps pages from storage into
/// them on demand. Callers pin a page with [`fetch_page`](Self::fetch_page)
/// or [`new_page`](Self::new_page), reach its bytes through the returned
/// [`FrameHandle`], and release it with [`unpin_page`](Self::unpin_page).
/// When no frame is free, the replacer picks an unpinned victim; dirty
/// victims are written back before the frame is reused.
///
/// # Thread Safety
///
/// - The state (page table, frame metadata, free list, replacer) sits behind
///   one `tokio::sync::RwLock`. Diagnostics take it shared; every mutating
///   operation takes it exclusively, including across miss-path I/O.
/// - Each frame's bytes sit behind their own `RwLock`: many readers or one
///   writer per page.
///
/// # Latch Hierarchy
///
/// 1. State lock
/// 2. Frame content lock
///
/// **NEVER** wait on the state lock while holding a content guard. Drop
/// [`PageReadGuard`]/[`PageWriteGuard`] before calling `unpin_page`,
/// `flush_page` or `flush_all` for the same page.
///
/// A fully pinned pool fails with `NoFreeFrames` immediately; nothing waits
/// for a frame to free up.
pub struct BufferPool<S: Storage, R: Replacer = ClockReplacer> {
    storage: S,
    frames: Vec<Frame>,
    state: RwLock<PoolState<R>>,
    observer: Option<Arc<dyn PoolObserver>>,
    pool_size: usize,
}

/// Mutable state protected by the state lock.
struct PoolState<R: Replacer> {
    /// Maps PageId -> FrameId for resident pages.
    page_table: HashMap<PageId, FrameId>,

    /// Metadata for each frame (indexed by FrameId).
    frame_meta: Vec<FrameMeta>,

    /// Frames holding no page. Taken from the front.
    free_list: VecDeque<FrameId>,

    replacer: R,
}

type StateGuard<'a, R> = RwLockWriteGuard<'a, PoolState<R>>;

impl<R: Replacer> PoolState<R> {
    /// Looks up a resident page, checking the frame agrees about what it holds.
    fn lookup(&self, page_id: PageId) -> Option<FrameId> {
        let frame_id = *self.page_table.get(&page_id)?;
        let recorded = self.frame_meta[frame_id.index()].page_id;
        assert_eq!(
            recorded,
            Some(page_id),
            "page table maps {page_id} to frame {frame_id}, which records {recorded:?}"
        );
        Some(frame_id)
    }

    fn meta(&self, frame_id: FrameId) -> &FrameMeta {
        &self.frame_meta[frame_id.index()]
    }

    fn meta_mut(&mut self, frame_id: FrameId) -> &mut FrameMeta {
        &mut self.frame_meta[frame_id.index()]
    }
}

impl<S: Storage> BufferPool<S> {
    /// Creates a buffer pool with the clock replacer.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_size` is 0.
    pub fn new(storage: S, config: BufferPoolConfig) -> Self {
        let replacer = ClockReplacer::new(config.pool_size);
        Self::with_replacer(storage, replacer, config)
    }
}

impl<S: Storage, R: Replacer> BufferPool<S, R> {
    /// Creates a buffer pool with a custom replacement policy.
    ///
    /// The replacer must be able to track every frame: a frame it ignores
    /// could never be evicted.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_size` is 0, or if `replacer.capacity()` is
    /// smaller than `config.pool_size`.
    pub fn with_replacer(storage: S, replacer: R, config: BufferPoolConfig) -> Self {
        let pool_size = config.pool_size;
        assert!(pool_size > 0, "pool_size must be > 0");
        if let Some(capacity) = replacer.capacity() {
            assert!(
                capacity >= pool_size,
                "replacer covers {capacity} frames, pool has {pool_size}"
            );
        }

        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let frame_meta = (0..pool_size).map(|_| FrameMeta::new()).collect();

        // All frames start as free
        let free_list = (0..pool_size).map(FrameId::new).collect();

        let state = PoolState {
            page_table: HashMap::with_capacity(pool_size),
            frame_meta,
            free_list,
            replacer,
        };

        Self {
            storage,
            frames,
            state: RwLock::new(state),
            observer: None,
            pool_size,
        }
    }

    /// Installs hooks called before and after each public operation.
    pub fn with_observer(mut self, observer: Arc<dyn PoolObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Returns the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Pins a page, loading it from storage if it is not resident.
    ///
    /// Each successful call must be balanced by an `unpin_page`.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::NoFreeFrames` if the page is not resident and
    ///   every frame is pinned
    /// - `BufferPoolError::Storage` if the page doesn't exist or I/O fails
    pub async fn fetch_page(&self, page_id: PageId) -> Result<FrameHandle, BufferPoolError> {
        self.notify_before(PoolOp::Fetch, page_id);
        let result = self.fetch_page_inner(page_id).await;
        self.notify_after(PoolOp::Fetch, page_id);
        result
    }

    async fn fetch_page_inner(&self, page_id: PageId) -> Result<FrameHandle, BufferPoolError> {
        if !page_id.is_valid() {
            return Err(StorageError::PageNotFound(page_id).into());
        }

        let mut guard = self.state.write().await;

        if let Some(frame_id) = guard.lookup(page_id) {
            let state = &mut *guard;
            let pins = state.meta_mut(frame_id).pin();
            if pins == 1 {
                state.replacer.pin(frame_id);
            }
            trace!(%page_id, frame = %frame_id, pins, "page hit");
            let generation = self.frames[frame_id.index()].generation();
            return Ok(FrameHandle::new(frame_id, page_id, generation));
        }

        trace!(%page_id, "page miss");
        let (frame_id, mut data) = self.take_frame(&mut guard).await?;

        if let Err(e) = self.storage.read_page(page_id, data.as_mut_slice()).await {
            warn!(%page_id, frame = %frame_id, error = %e, "page load failed");
            data.clear();
            guard.free_list.push_front(frame_id);
            return Err(e.into());
        }

        Ok(self.install(&mut guard, &data, frame_id, page_id))
    }

    /// Releases one pin on a page.
    ///
    /// `is_dirty` reports that the caller modified the page; the flag is only
    /// ever set here, never cleared. When the last pin goes, the frame becomes
    /// evictable.
    ///
    /// Returns `false` (changing nothing) if the page is not resident or not
    /// pinned.
    pub async fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.notify_before(PoolOp::Unpin, page_id);
        let unpinned = self.unpin_page_inner(page_id, is_dirty).await;
        self.notify_after(PoolOp::Unpin, page_id);
        unpinned
    }

    async fn unpin_page_inner(&self, page_id: PageId, is_dirty: bool) -> bool {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(frame_id) = state.lookup(page_id) else {
            warn!(%page_id, "unpin of non-resident page");
            return false;
        };

        let meta = state.meta_mut(frame_id);
        let Some(pins) = meta.unpin() else {
            warn!(%page_id, frame = %frame_id, "unpin of page with no pins");
            return false;
        };
        if is_dirty {
            meta.mark_dirty();
        }
        if pins == 0 {
            state.replacer.unpin(frame_id);
        }

        trace!(%page_id, frame = %frame_id, pins, is_dirty, "page unpinned");
        true
    }

    /// Writes a resident page to storage and clears its dirty flag.
    ///
    /// The write happens whether or not the page is dirty. Pin count and
    /// residency are unchanged.
    ///
    /// Returns `Ok(false)` if the page is not resident, or if its frame is
    /// reused by another page while the flush is in progress.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Storage` if the write fails; the page stays
    /// dirty.
    pub async fn flush_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        self.notify_before(PoolOp::Flush, page_id);
        let result = self.flush_resident(page_id).await;
        self.notify_after(PoolOp::Flush, page_id);
        result
    }

    /// Flush without the observer call-outs.
    ///
    /// The state lock is released while waiting for the content lock and
    /// writing, so a content holder that goes on to fetch other pages cannot
    /// deadlock against the flush. The dirty flag is cleared only if the frame
    /// still holds the same page and nobody reported a write meanwhile.
    async fn flush_resident(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let (frame_id, generation, dirty_seq) = {
            let state = self.state.read().await;
            let Some(frame_id) = state.lookup(page_id) else {
                return Ok(false);
            };
            let generation = self.frames[frame_id.index()].generation();
            (frame_id, generation, state.meta(frame_id).dirty_seq)
        };

        let frame = &self.frames[frame_id.index()];
        {
            let data = frame.read().await;
            if frame.generation() != generation {
                // Evicted (written back if dirty) or deleted in the meantime.
                return Ok(false);
            }
            if let Err(e) = self.storage.write_page(page_id, data.as_slice()).await {
                warn!(%page_id, frame = %frame_id, error = %e, "flush failed");
                return Err(e.into());
            }
        }

        let mut guard = self.state.write().await;
        if frame.generation() != generation {
            // The write landed, but the frame was reused before we got back.
            return Ok(false);
        }
        let meta = guard.meta_mut(frame_id);
        if meta.dirty_seq == dirty_seq {
            meta.is_dirty = false;
        }
        trace!(%page_id, frame = %frame_id, "page flushed");
        Ok(true)
    }

    /// Allocates a fresh page in storage and pins it in a zeroed frame.
    ///
    /// The new page starts dirty, so it reaches storage even if the caller
    /// never writes to it. Its id is `handle.page_id()`.
    ///
    /// # Errors
    ///
    /// - `BufferPoolError::NoFreeFrames` if every frame is pinned; storage is
    ///   not touched
    /// - `BufferPoolError::Storage` if allocation or a victim write-back fails
    pub async fn new_page(&self) -> Result<FrameHandle, BufferPoolError> {
        self.notify_before(PoolOp::NewPage, PageId::INVALID);
        let result = self.new_page_inner().await;
        let page_id = result
            .as_ref()
            .map_or(PageId::INVALID, FrameHandle::page_id);
        self.notify_after(PoolOp::NewPage, page_id);
        result
    }

    async fn new_page_inner(&self) -> Result<FrameHandle, BufferPoolError> {
        let mut guard = self.state.write().await;

        // Get the frame first so a full pool doesn't leak a storage page.
        let (frame_id, mut data) = self.take_frame(&mut guard).await?;

        let page_id = match self.storage.allocate_page().await {
            Ok(page_id) => page_id,
            Err(e) => {
                warn!(frame = %frame_id, error = %e, "page allocation failed");
                data.clear();
                guard.free_list.push_front(frame_id);
                return Err(e.into());
            }
        };

        data.clear();
        let handle = self.install(&mut guard, &data, frame_id, page_id);
        guard.meta_mut(frame_id).mark_dirty();
        debug!(%page_id, frame = %frame_id, "new page");
        Ok(handle)
    }

    /// Deletes a page from the pool and deallocates it in storage.
    ///
    /// Returns `Ok(true)` if the page was deleted or was not resident to begin
    /// with (storage is not touched then), `Ok(false)` if it is pinned.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::Storage` if deallocation fails; the page
    /// stays resident.
    pub async fn delete_page(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        self.notify_before(PoolOp::Delete, page_id);
        let result = self.delete_page_inner(page_id).await;
        self.notify_after(PoolOp::Delete, page_id);
        result
    }

    async fn delete_page_inner(&self, page_id: PageId) -> Result<bool, BufferPoolError> {
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(frame_id) = state.lookup(page_id) else {
            return Ok(true);
        };
        let pins = state.meta(frame_id).pin_count;
        if pins > 0 {
            debug!(%page_id, frame = %frame_id, pins, "refusing to delete pinned page");
            return Ok(false);
        }

        let frame = &self.frames[frame_id.index()];
        let mut data = frame.write().await;

        if let Err(e) = self.storage.deallocate_page(page_id).await {
            warn!(%page_id, frame = %frame_id, error = %e, "page deallocation failed");
            return Err(e.into());
        }

        state.page_table.remove(&page_id);
        state.replacer.remove(frame_id);
        state.meta_mut(frame_id).reset();
        data.clear();
        frame.bump_generation();
        state.free_list.push_back(frame_id);

        debug!(%page_id, frame = %frame_id, "deleted page");
        Ok(true)
    }

    /// Flushes every resident page, then syncs storage.
    ///
    /// # Errors
    ///
    /// Returns the first `BufferPoolError::Storage` hit; pages after it are
    /// not flushed.
    pub async fn flush_all(&self) -> Result<(), BufferPoolError> {
        self.notify_before(PoolOp::FlushAll, PageId::INVALID);
        let result = self.flush_all_inner().await;
        self.notify_after(PoolOp::FlushAll, PageId::INVALID);
        result
    }

    async fn flush_all_inner(&self) -> Result<(), BufferPoolError> {
        let mut resident: Vec<PageId> = {
            let state = self.state.read().await;
            state.page_table.keys().copied().collect()
        };
        resident.sort_unstable();

        debug!(pages = resident.len(), "flushing all resident pages");
        for page_id in resident {
            self.flush_resident(page_id).await?;
        }

        self.storage.sync_all().await?;
        Ok(())
    }

    /// Takes the content lock for shared access to a pinned page.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::StaleHandle` if the frame no longer holds the
    /// page the handle was issued for.
    pub async fn read_page(
        &self,
        handle: &FrameHandle,
    ) -> Result<PageReadGuard<'_>, BufferPoolError> {
        let frame = self.frame_for(handle)?;
        let data = frame.read().await;
        if frame.generation() != handle.generation() {
            return Err(BufferPoolError::StaleHandle {
                page_id: handle.page_id(),
            });
        }
        Ok(PageReadGuard::new(handle.page_id(), data))
    }

    /// Takes the content lock for exclusive access to a pinned page.
    ///
    /// Writes do not mark the page dirty; report them via `unpin_page`.
    ///
    /// # Errors
    ///
    /// Returns `BufferPoolError::StaleHandle` if the frame no longer holds the
    /// page the handle was issued for.
    pub async fn write_page(
        &self,
        handle: &FrameHandle,
    ) -> Result<PageWriteGuard<'_>, BufferPoolError> {
        let frame = self.frame_for(handle)?;
        let data = frame.write().await;
        if frame.generation() != handle.generation() {
            return Err(BufferPoolError::StaleHandle {
                page_id: handle.page_id(),
            });
        }
        Ok(PageWriteGuard::new(handle.page_id(), data))
    }

    /// Returns the number of frames in the buffer pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of resident pages.
    pub async fn page_table_size(&self) -> usize {
        self.state.read().await.page_table.len()
    }

    pub async fn is_resident(&self, page_id: PageId) -> bool {
        self.state.read().await.lookup(page_id).is_some()
    }

    /// Returns the pin count of a resident page.
    pub async fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.read().await;
        let frame_id = state.lookup(page_id)?;
        Some(state.meta(frame_id).pin_count)
    }

    /// Returns whether a resident page has unflushed changes.
    pub async fn is_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.state.read().await;
        let frame_id = state.lookup(page_id)?;
        Some(state.meta(frame_id).is_dirty)
    }

    /// Returns the number of evictable frames.
    pub async fn replacer_size(&self) -> usize {
        self.state.read().await.replacer.size()
    }

    pub async fn free_list_size(&self) -> usize {
        self.state.read().await.free_list.len()
    }

    fn frame_for(&self, handle: &FrameHandle) -> Result<&Frame, BufferPoolError> {
        self.frames
            .get(handle.frame_id().index())
            .ok_or(BufferPoolError::StaleHandle {
                page_id: handle.page_id(),
            })
    }

    /// Obtains an unassigned frame, evicting a victim if the free list is empty.
    ///
    /// Takes the held state guard, so it can only run under the exclusive
    /// lock. Returns the frame with its content lock held. A dirty victim is
    /// written back first; if that fails the victim goes back to the replacer
    /// with its mapping and dirty flag intact.
    async fn take_frame(
        &self,
        guard: &mut StateGuard<'_, R>,
    ) -> Result<(FrameId, RwLockWriteGuard<'_, PageData>), BufferPoolError> {
        let state = &mut **guard;

        if let Some(frame_id) = state.free_list.pop_front() {
            let data = self.frames[frame_id.index()].write().await;
            return Ok((frame_id, data));
        }

        let Some(frame_id) = state.replacer.evict() else {
            warn!("no evictable frame: all frames are pinned");
            return Err(BufferPoolError::NoFreeFrames);
        };

        let meta = state.meta(frame_id);
        let old_page_id = meta
            .page_id
            .unwrap_or_else(|| panic!("replacer chose frame {frame_id}, which holds no page"));
        assert_eq!(
            meta.pin_count, 0,
            "replacer chose frame {frame_id}, which is pinned"
        );
        let is_dirty = meta.is_dirty;

        let frame = &self.frames[frame_id.index()];
        let data = frame.write().await;

        if is_dirty {
            if let Err(e) = self.storage.write_page(old_page_id, data.as_slice()).await {
                warn!(page_id = %old_page_id, frame = %frame_id, error = %e, "write-back failed");
                state.replacer.unpin(frame_id);
                return Err(e.into());
            }
            debug!(page_id = %old_page_id, frame = %frame_id, "wrote back dirty victim");
        }

        state.page_table.remove(&old_page_id);
        state.meta_mut(frame_id).reset();
        frame.bump_generation();

        debug!(page_id = %old_page_id, frame = %frame_id, is_dirty, "evicted page");
        Ok((frame_id, data))
    }

    /// Maps `page_id` to a frame taken by `take_frame`, pinned once and clean.
    ///
    /// `_data` is the frame's content guard, proof the caller still holds it.
    fn install(
        &self,
        guard: &mut StateGuard<'_, R>,
        _data: &PageData,
        frame_id: FrameId,
        page_id: PageId,
    ) -> FrameHandle {
        let previous = guard.page_table.insert(page_id, frame_id);
        assert!(previous.is_none(), "page {page_id} mapped twice");
        guard.meta_mut(frame_id).assign(page_id);
        let generation = self.frames[frame_id.index()].bump_generation();
        FrameHandle::new(frame_id, page_id, generation)
    }

    fn notify_before(&self, op: PoolOp, page_id: PageId) {
        if let Some(observer) = &self.observer {
            observer.before(op, page_id);
        }
    }

    fn notify_after(&self, op: PoolOp, page_id: PageId) {
        if let Some(observer) = &self.observer {
            observer.after(op, page_id);
        }
    }
}
