use std::collections::VecDeque;

use crate::segment::Segment;

/// FIFO of [`Segment`]s with a running byte count.
///
/// Always accessed under the owning [`crate::Pipe`]'s mutex; this type
/// has no internal locking of its own. `VecDeque` gives O(1)
/// push-at-tail and pop-at-head, which is the only access pattern this
/// queue needs: only the head is ever consumed, only the tail ever
/// gains a successor.
#[derive(Default)]
pub(crate) struct SegmentQueue {
    segments: VecDeque<Segment>,
    total: usize,
}

impl SegmentQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Invariant Q-1: `total == 0` iff the queue holds no segments.
    pub(crate) fn total(&self) -> usize {
        self.total
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub(crate) fn push(&mut self, segment: Segment) {
        if segment.is_empty() {
            return;
        }
        self.total += segment.remaining();
        self.segments.push_back(segment);
    }

    /// Drain up to `dst.len()` bytes across however many segments are
    /// needed, in FIFO order. Returns the number of bytes copied, which
    /// is `min(dst.len(), total())`.
    pub(crate) fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        while copied < dst.len() {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            let n = front.drain_into(&mut dst[copied..]);
            copied += n;
            self.total -= n;
            if front.is_empty() {
                self.segments.pop_front();
            }
        }
        copied
    }

    /// Drain a single byte from the head, or `None` if the queue is empty.
    pub(crate) fn drain_byte(&mut self) -> Option<u8> {
        let front = self.segments.front_mut()?;
        let b = front.drain_byte();
        self.total -= 1;
        if front.is_empty() {
            self.segments.pop_front();
        }
        Some(b)
    }

    /// Discard all buffered bytes (used by `ReadHalf::close`/`flush`).
    pub(crate) fn clear(&mut self) {
        self.segments.clear();
        self.total = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue_invariant() {
        let q = SegmentQueue::new();
        assert!(q.is_empty());
        assert_eq!(q.total(), 0);
    }

    #[test]
    fn push_accumulates_total() {
        let mut q = SegmentQueue::new();
        q.push(Segment::owned(vec![1, 2, 3]));
        q.push(Segment::owned(vec![4, 5]));
        assert_eq!(q.total(), 5);
    }

    #[test]
    fn drain_into_crosses_segment_boundaries() {
        let mut q = SegmentQueue::new();
        q.push(Segment::owned(vec![0x0a]));
        q.push(Segment::owned(vec![0x0d]));
        q.push(Segment::owned(vec![0x09]));
        let mut buf = [0u8; 2];
        assert_eq!(q.drain_into(&mut buf), 2);
        assert_eq!(buf, [0x0a, 0x0d]);
        assert_eq!(q.total(), 1);
        let mut buf = [0u8; 2];
        assert_eq!(q.drain_into(&mut buf), 1);
        assert_eq!(&buf[..1], &[0x09]);
        assert!(q.is_empty());
    }

    #[test]
    fn drain_into_stops_when_queue_runs_dry() {
        let mut q = SegmentQueue::new();
        q.push(Segment::owned(vec![1, 2]));
        let mut buf = [0u8; 5];
        assert_eq!(q.drain_into(&mut buf), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        assert!(q.is_empty());
    }

    #[test]
    fn clear_discards_everything() {
        let mut q = SegmentQueue::new();
        q.push(Segment::owned(vec![1, 2, 3]));
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.total(), 0);
    }

    #[test]
    fn zero_length_push_is_ignored() {
        let mut q = SegmentQueue::new();
        q.push(Segment::owned(Vec::new()));
        assert!(q.is_empty());
    }
}
