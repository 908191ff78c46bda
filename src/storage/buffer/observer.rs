//! Instrumentation hooks around pool operations.

use crate::storage::PageId;

/// Public pool operations an observer is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolOp {
    Fetch,
    Unpin,
    Flush,
    NewPage,
    Delete,
    FlushAll,
}

/// Receives a call before and after each public pool operation.
///
/// `before` runs on entry, before any lock is taken; `after` runs once the
/// operation's locks are released, on success and failure alike. `NewPage`
/// reports `PageId::INVALID` before and the new id after (`INVALID` if it
/// failed). `FlushAll` reports `PageId::INVALID` both times.
///
/// Hooks run inline on the calling task and must not call back into the
/// pool. Both methods default to no-ops.
pub trait PoolObserver: Send + Sync {
    fn before(&self, op: PoolOp, page_id: PageId) {
        let _ = (op, page_id);
    }

    fn after(&self, op: PoolOp, page_id: PageId) {
        let _ = (op, page_id);
    }
}
