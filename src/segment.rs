use std::sync::Arc;

/// Backing storage for a [`Segment`].
///
/// `Owned` is a private copy the pipe took of the caller's bytes.
/// `Shared` is the zero-copy path: the caller handed the pipe an
/// `Arc<[u8]>` it promises not to mutate again (see `NoCopy` in
/// [`crate::Flags`]).
#[derive(Debug)]
enum SegmentData {
    Owned(Vec<u8>),
    Shared(Arc<[u8]>),
}

impl SegmentData {
    fn as_slice(&self) -> &[u8] {
        match self {
            SegmentData::Owned(v) => v,
            SegmentData::Shared(a) => a,
        }
    }
}

/// One contiguous run of buffered bytes, immutable after construction
/// except for `read_pos` advancing as the consumer drains it.
///
/// Segments form a single-linked FIFO inside [`crate::queue::SegmentQueue`];
/// only the head may be consumed and only the tail may gain a successor.
#[derive(Debug)]
pub(crate) struct Segment {
    data: SegmentData,
    read_pos: usize,
    end_pos: usize,
}

impl Segment {
    /// Build a segment that owns a private copy of `bytes`.
    pub(crate) fn owned(bytes: Vec<u8>) -> Self {
        let end_pos = bytes.len();
        Segment {
            data: SegmentData::Owned(bytes),
            read_pos: 0,
            end_pos,
        }
    }

    /// Build a segment that aliases a caller-provided buffer (the
    /// `NoCopy` path). The caller must not mutate `bytes` after this call.
    pub(crate) fn shared(bytes: Arc<[u8]>) -> Self {
        let end_pos = bytes.len();
        Segment {
            data: SegmentData::Shared(bytes),
            read_pos: 0,
            end_pos,
        }
    }

    /// Bytes not yet consumed from this segment.
    pub(crate) fn remaining(&self) -> usize {
        self.end_pos - self.read_pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn unread(&self) -> &[u8] {
        &self.data.as_slice()[self.read_pos..self.end_pos]
    }

    /// Copy `min(dst.len(), remaining())` bytes into `dst`, advancing
    /// `read_pos`. Returns the number of bytes copied.
    pub(crate) fn drain_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.unread()[..n]);
        self.read_pos += n;
        n
    }

    /// Consume and return a single byte. Panics if the segment is empty;
    /// callers must check [`Segment::is_empty`] first.
    pub(crate) fn drain_byte(&mut self) -> u8 {
        let b = self.unread()[0];
        self.read_pos += 1;
        b
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owned_segment_drains_in_order() {
        let mut seg = Segment::owned(vec![1, 2, 3, 4]);
        assert_eq!(seg.remaining(), 4);
        let mut buf = [0u8; 2];
        assert_eq!(seg.drain_into(&mut buf), 2);
        assert_eq!(buf, [1, 2]);
        assert_eq!(seg.remaining(), 2);
        assert_eq!(seg.drain_byte(), 3);
        assert_eq!(seg.remaining(), 1);
        assert!(!seg.is_empty());
        assert_eq!(seg.drain_byte(), 4);
        assert!(seg.is_empty());
    }

    #[test]
    fn drain_into_clamps_to_remaining() {
        let mut seg = Segment::owned(vec![9, 8]);
        let mut buf = [0u8; 5];
        assert_eq!(seg.drain_into(&mut buf), 2);
        assert_eq!(&buf[..2], &[9, 8]);
        assert!(seg.is_empty());
    }

    #[test]
    fn shared_segment_aliases_caller_buffer() {
        let shared: Arc<[u8]> = Arc::from(vec![5, 6, 7]);
        let mut seg = Segment::shared(Arc::clone(&shared));
        let mut buf = [0u8; 3];
        assert_eq!(seg.drain_into(&mut buf), 3);
        assert_eq!(buf, [5, 6, 7]);
        // The original Arc is untouched: two strong references existed
        // (the caller's `shared` and the segment's own), now back to one.
        assert_eq!(Arc::strong_count(&shared), 1);
    }
}
