//! Page-aligned frame memory.

use std::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use std::ptr::NonNull;

use super::PAGE_SIZE;

/// Alignment of every frame buffer (typical OS page size, and what direct
/// I/O expects).
const OS_PAGE_ALIGNMENT: usize = 4096;

/// One page worth of bytes, 4KB aligned and zero-initialized.
///
/// The buffer pool allocates one of these per frame at construction and keeps
/// it for the pool's lifetime; only its contents churn.
///
/// # Safety
///
/// - `ptr` is valid for `PAGE_SIZE` bytes and aligned to `OS_PAGE_ALIGNMENT`
/// - the allocation is freed exactly once, in `Drop`
pub struct PageData {
    ptr: NonNull<u8>,
}

impl PageData {
    const LAYOUT: Layout = match Layout::from_size_align(PAGE_SIZE, OS_PAGE_ALIGNMENT) {
        Ok(layout) => layout,
        Err(_) => panic!("PAGE_SIZE and OS_PAGE_ALIGNMENT must form a valid layout"),
    };

    /// Allocates a zeroed page.
    pub fn new() -> Self {
        // SAFETY: LAYOUT has a non-zero size.
        let ptr = unsafe { alloc_zeroed(Self::LAYOUT) };
        let Some(ptr) = NonNull::new(ptr) else {
            handle_alloc_error(Self::LAYOUT)
        };
        Self { ptr }
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for PAGE_SIZE bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), PAGE_SIZE) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: ptr is valid for PAGE_SIZE bytes and &mut self is exclusive.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), PAGE_SIZE) }
    }

    /// Zeroes the whole page.
    pub fn clear(&mut self) {
        self.as_mut_slice().fill(0);
    }
}

impl Default for PageData {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageData {
    fn drop(&mut self) {
        // SAFETY: ptr came from alloc_zeroed with the same layout.
        unsafe { dealloc(self.ptr.as_ptr(), Self::LAYOUT) }
    }
}

// SAFETY: PageData owns its allocation outright.
unsafe impl Send for PageData {}
// SAFETY: shared access only hands out &[u8].
unsafe impl Sync for PageData {}

impl AsRef<[u8]> for PageData {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsMut<[u8]> for PageData {
    fn as_mut(&mut self) -> &mut [u8] {
        self.as_mut_slice()
    }
}
