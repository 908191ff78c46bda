//! Latched access to a resident page's bytes.
//!
//! A guard holds the frame's content lock, nothing more: it neither pins nor
//! unpins. Drop it before calling `unpin_page` or `flush_page` for the same
//! page.

use std::ops::{Deref, DerefMut};

use tokio::sync::{RwLockReadGuard, RwLockWriteGuard};

use crate::storage::{PageData, PageId};

/// Shared access to a page. Any number may coexist for one frame.
pub struct PageReadGuard<'a> {
    page_id: PageId,
    data: RwLockReadGuard<'a, PageData>,
}

impl<'a> PageReadGuard<'a> {
    pub(super) fn new(page_id: PageId, data: RwLockReadGuard<'a, PageData>) -> Self {
        Self { page_id, data }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_slice()
    }
}

/// Exclusive access to a page.
///
/// Writing through the guard does not mark the page dirty; pass
/// `is_dirty = true` to `unpin_page` for that.
pub struct PageWriteGuard<'a> {
    page_id: PageId,
    data: RwLockWriteGuard<'a, PageData>,
}

impl<'a> PageWriteGuard<'a> {
    pub(super) fn new(page_id: PageId, data: RwLockWriteGuard<'a, PageData>) -> Self {
        Self { page_id, data }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data.as_slice()
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }
}
