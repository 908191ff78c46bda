//! Page identifier and size constants.

mod data;

pub use data::PageData;

/// 8KB page size.
pub const PAGE_SIZE: usize = 8192;

/// Unique identifier for a page within the storage system.
///
/// Page ids are handed out by the storage backend and are never reused while
/// anything still refers to them. [`PageId::INVALID`] stands for "no page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub u64);

impl PageId {
    /// Sentinel for "no page".
    pub const INVALID: PageId = PageId(u64::MAX);

    /// Creates a new PageId from a page number.
    pub const fn new(page_num: u64) -> Self {
        Self(page_num)
    }

    /// Returns the page number.
    pub const fn page_num(&self) -> u64 {
        self.0
    }

    /// Returns false for the sentinel.
    pub const fn is_valid(&self) -> bool {
        self.0 != u64::MAX
    }

    /// Byte offset of this page in a single-file backend.
    pub const fn byte_offset(&self) -> u64 {
        self.0 * PAGE_SIZE as u64
    }
}

impl std::fmt::Display for PageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("INVALID")
        }
    }
}
