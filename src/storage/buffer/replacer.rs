//! Page replacement policies for the buffer pool.

use super::frame::FrameId;

/// Page replacement policy.
///
/// Tracks the frames that may be evicted: resident frames whose pin count is
/// zero. The pool calls into it under its state lock, so implementations need
/// no locking of their own.
///
/// # Usage Contract
///
/// - `unpin(frame_id)`: pin count reached 0; the frame becomes a candidate
/// - `pin(frame_id)`: pin count left 0; the frame stops being a candidate
/// - `remove(frame_id)`: the frame's page was deleted
/// - `evict()`: pick a victim and stop tracking it
pub trait Replacer: Send + Sync {
    /// Registers an unpinned frame as a candidate, marked recently used.
    fn unpin(&mut self, frame_id: FrameId);

    /// Removes a frame from the candidates because it was pinned again.
    fn pin(&mut self, frame_id: FrameId);

    /// Drops a frame from tracking regardless of its state.
    fn remove(&mut self, frame_id: FrameId);

    /// Evicts and returns a frame, or `None` if no frames are evictable.
    fn evict(&mut self) -> Option<FrameId>;

    /// Returns the number of evictable frames.
    fn size(&self) -> usize;

    /// Returns how many frames the policy can track, if it is bounded.
    ///
    /// A bounded policy must cover every frame of the pool it serves.
    fn capacity(&self) -> Option<usize> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Untracked,
    Tracked { referenced: bool },
}

/// Clock (second chance) replacement.
///
/// Every frame has a slot on a circular dial. Candidates carry a reference
/// bit that is set whenever they are registered by `unpin`. The hand sweeps the
/// dial: a set bit is cleared and the frame skipped, a clear bit makes the
/// frame the victim. Bookkeeping per access is O(1); a sweep visits each
/// candidate at most twice.
pub struct ClockReplacer {
    slots: Vec<Slot>,
    hand: usize,
    tracked: usize,
}

impl ClockReplacer {
    /// Creates a replacer for frames `0..capacity`. Ids outside that range
    /// are ignored.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![Slot::Untracked; capacity],
            hand: 0,
            tracked: 0,
        }
    }

    fn untrack(&mut self, frame_id: FrameId) {
        if let Some(slot) = self.slots.get_mut(frame_id.index())
            && matches!(slot, Slot::Tracked { .. })
        {
            *slot = Slot::Untracked;
            self.tracked -= 1;
        }
    }
}

impl Replacer for ClockReplacer {
    fn unpin(&mut self, frame_id: FrameId) {
        let Some(slot) = self.slots.get_mut(frame_id.index()) else {
            return;
        };
        if *slot == Slot::Untracked {
            self.tracked += 1;
        }
        *slot = Slot::Tracked { referenced: true };
    }

    fn pin(&mut self, frame_id: FrameId) {
        self.untrack(frame_id);
    }

    fn remove(&mut self, frame_id: FrameId) {
        self.untrack(frame_id);
    }

    fn evict(&mut self) -> Option<FrameId> {
        if self.tracked == 0 {
            return None;
        }

        loop {
            let index = self.hand;
            self.hand = (self.hand + 1) % self.slots.len();

            let slot = self.slots[index];
            match slot {
                Slot::Tracked { referenced: true } => {
                    self.slots[index] = Slot::Tracked { referenced: false };
                }
                Slot::Tracked { referenced: false } => {
                    self.slots[index] = Slot::Untracked;
                    self.tracked -= 1;
                    return Some(FrameId::new(index));
                }
                Slot::Untracked => {}
            }
        }
    }

    fn size(&self) -> usize {
        self.tracked
    }

    fn capacity(&self) -> Option<usize> {
        Some(self.slots.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(index: usize) -> FrameId {
        FrameId::new(index)
    }

    #[test]
    fn test_evict_empty() {
        let mut replacer = ClockReplacer::new(3);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_zero_capacity() {
        let mut replacer = ClockReplacer::new(0);
        replacer.unpin(f(0));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_first_sweep_clears_then_evicts_in_dial_order() {
        let mut replacer = ClockReplacer::new(3);
        replacer.unpin(f(0));
        replacer.unpin(f(1));
        replacer.unpin(f(2));
        assert_eq!(replacer.size(), 3);

        // All bits set: one full sweep clears them, then 0 goes first.
        assert_eq!(replacer.evict(), Some(f(0)));
        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_second_chance_sequence() {
        let mut replacer = ClockReplacer::new(4);
        for i in 0..4 {
            replacer.unpin(f(i));
        }

        // Clears every bit, evicts 0, hand rests on 1.
        assert_eq!(replacer.evict(), Some(f(0)));

        // Alternate the bits: 0 set, 1 clear, 2 set, 3 clear.
        replacer.unpin(f(0));
        replacer.pin(f(2));
        replacer.unpin(f(2));

        assert_eq!(replacer.evict(), Some(f(1)));
        // 2 gets its reprieve, 3 goes.
        assert_eq!(replacer.evict(), Some(f(3)));
        // Hand wraps: 0 cleared and skipped, 2 now clear.
        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), Some(f(0)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_pin_removes_from_eviction() {
        let mut replacer = ClockReplacer::new(3);
        replacer.unpin(f(0));
        replacer.unpin(f(1));
        replacer.unpin(f(2));

        replacer.pin(f(1));
        assert_eq!(replacer.size(), 2);

        assert_eq!(replacer.evict(), Some(f(0)));
        assert_eq!(replacer.evict(), Some(f(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_pin_untracked_is_noop() {
        let mut replacer = ClockReplacer::new(3);
        replacer.pin(f(1));
        replacer.remove(f(2));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_unpin_twice_counts_once() {
        let mut replacer = ClockReplacer::new(3);
        replacer.unpin(f(1));
        replacer.unpin(f(1));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_remove() {
        let mut replacer = ClockReplacer::new(3);
        replacer.unpin(f(0));
        replacer.unpin(f(1));

        replacer.remove(f(0));
        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(f(1)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_out_of_range_ignored() {
        let mut replacer = ClockReplacer::new(2);
        replacer.unpin(f(5));
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.capacity(), Some(2));
    }

    #[test]
    fn test_pin_unpin_cycle() {
        let mut replacer = ClockReplacer::new(3);

        replacer.unpin(f(0));
        assert_eq!(replacer.size(), 1);

        replacer.pin(f(0));
        assert_eq!(replacer.size(), 0);

        replacer.unpin(f(0));
        assert_eq!(replacer.size(), 1);

        assert_eq!(replacer.evict(), Some(f(0)));
    }
}
