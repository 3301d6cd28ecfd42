use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{PipeError, Result};
use crate::flags::Flags;
use crate::queue::SegmentQueue;
use crate::read_half::ReadHalf;
use crate::segment::Segment;
use crate::write_half::WriteHalf;

/// Default capacity: 256 MiB.
pub const DEFAULT_CAPACITY: usize = 268_435_456;

/// `-1`: wait forever.
pub const INFINITE_TIMEOUT: i64 = -1;

struct PipeState {
    queue: SegmentQueue,
    capacity: usize,
    in_flags: Flags,
    out_flags: Flags,
    /// The write end has been closed or disposed.
    in_closed: bool,
    /// The read end has been closed or disposed.
    out_closed: bool,
    flushing: bool,
    read_timeout_ms: i64,
    write_timeout_ms: i64,
}

/// The concurrency primitive at the core of this crate: a bounded,
/// segmented byte buffer guarded by one mutex and one condition
/// variable, with independent read/write timeouts and close semantics.
///
/// Construct one with [`Pipe::new`] or [`PipeConfig`], then obtain the
/// [`crate::WriteHalf`] and [`crate::ReadHalf`] facades with
/// [`Pipe::write_half`] / [`Pipe::read_half`].
pub struct Pipe {
    state: Mutex<PipeState>,
    cv: Condvar,
    name: Option<String>,
}

impl Pipe {
    /// Create a pipe with the default 256 MiB capacity, infinite
    /// timeouts in both directions, and `Default` flags.
    pub fn new() -> Arc<Pipe> {
        PipeConfig::default().build()
    }

    /// Create a pipe with the given capacity and default flags/timeouts.
    pub fn with_capacity(capacity: usize) -> Result<Arc<Pipe>> {
        PipeConfig::default().capacity(capacity).try_build()
    }

    fn from_config(config: PipeConfig) -> Pipe {
        Pipe {
            state: Mutex::new(PipeState {
                queue: SegmentQueue::new(),
                capacity: config.capacity,
                in_flags: config.in_flags,
                out_flags: config.out_flags,
                in_closed: false,
                out_closed: false,
                flushing: false,
                read_timeout_ms: config.read_timeout_ms,
                write_timeout_ms: config.write_timeout_ms,
            }),
            cv: Condvar::new(),
            name: config.name,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn span(&self) -> tracing::Span {
        tracing::debug_span!("pipe", name = self.name.as_deref().unwrap_or("unnamed"))
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.lock().queue.total()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opaque-handle accessor: returns `None` when `PipeInvisible` is
    /// set on either direction's flags, so a half can hide the owning
    /// pipe from whoever holds it.
    pub fn visible(self: &Arc<Self>, flags: Flags) -> Option<Arc<Pipe>> {
        if flags.contains(Flags::PIPE_INVISIBLE) {
            None
        } else {
            Some(Arc::clone(self))
        }
    }

    /// Change the pipe's capacity. Must be positive; any positive value
    /// is accepted even if smaller than the current byte count —
    /// blocked writers then simply continue waiting. Broadcasts so
    /// waiters re-evaluate.
    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        let _span = self.span().entered();
        if capacity == 0 {
            return Err(PipeError::invalid_argument("capacity must be positive"));
        }
        let mut guard = self.lock();
        let previous = guard.capacity;
        guard.capacity = capacity;
        tracing::debug!(previous, capacity, "capacity changed");
        self.cv.notify_all();
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Assign new in-direction (write-side) flags, preserving
    /// `PipeInvisible` stickiness.
    pub fn set_in_flags(&self, flags: Flags) {
        let mut guard = self.lock();
        guard.in_flags.assign_preserving_invisible(flags);
        self.cv.notify_all();
    }

    pub fn in_flags(&self) -> Flags {
        self.lock().in_flags
    }

    /// Assign new out-direction (read-side) flags, preserving
    /// `PipeInvisible` stickiness.
    pub fn set_out_flags(&self, flags: Flags) {
        let mut guard = self.lock();
        guard.out_flags.assign_preserving_invisible(flags);
        self.cv.notify_all();
    }

    pub fn out_flags(&self) -> Flags {
        self.lock().out_flags
    }

    pub fn set_read_timeout_ms(&self, ms: i64) {
        let mut guard = self.lock();
        guard.read_timeout_ms = ms;
        self.cv.notify_all();
    }

    pub fn read_timeout_ms(&self) -> i64 {
        self.lock().read_timeout_ms
    }

    pub fn set_write_timeout_ms(&self, ms: i64) {
        let mut guard = self.lock();
        guard.write_timeout_ms = ms;
        self.cv.notify_all();
    }

    pub fn write_timeout_ms(&self) -> i64 {
        self.lock().write_timeout_ms
    }

    pub fn is_read_end_closed(&self) -> bool {
        self.lock().out_closed
    }

    pub fn is_write_end_closed(&self) -> bool {
        self.lock().in_closed
    }

    /// Close the read end: discards any buffered bytes and wakes every
    /// waiter. Idempotent.
    pub(crate) fn close_read_end(&self) {
        let _span = self.span().entered();
        let mut guard = self.lock();
        if guard.out_closed {
            return;
        }
        guard.out_closed = true;
        guard.queue.clear();
        tracing::debug!("read end closed, buffer discarded");
        self.cv.notify_all();
    }

    /// Close the write end: leaves buffered bytes in place for the
    /// reader to drain, then wakes every waiter. Idempotent.
    pub(crate) fn close_write_end(&self) {
        let _span = self.span().entered();
        let mut guard = self.lock();
        if guard.in_closed {
            return;
        }
        guard.in_closed = true;
        tracing::debug!("write end closed");
        self.cv.notify_all();
    }

    /// Append an owned buffer to the pipe. If `NoCopy` is set on
    /// `in_flags`, `data` is converted into a shared `Arc<[u8]>` so it can
    /// be aliased by later reads without a further copy; otherwise `data`
    /// is queued directly — no intermediate allocation, since this crate
    /// already owns it.
    pub fn append_owned(&self, data: Vec<u8>) -> Result<usize> {
        let len = data.len();
        self.append_locked(len, move |no_copy| {
            if no_copy {
                Segment::shared(Arc::from(data))
            } else {
                Segment::owned(data)
            }
        })
    }

    /// Append an already-shared buffer to the pipe. If `NoCopy` is set on
    /// `in_flags`, the `Arc` is queued directly (zero-copy — the caller
    /// must not mutate the bytes behind it afterwards, which the type
    /// system already enforces once ownership has passed through this
    /// call); otherwise the bytes are copied into a private `Vec` so the
    /// pipe's segment is not aliasing the caller's `Arc`.
    pub fn append_shared(&self, data: Arc<[u8]>) -> Result<usize> {
        let len = data.len();
        self.append_locked(len, move |no_copy| {
            if no_copy {
                Segment::shared(data)
            } else {
                Segment::owned(data.to_vec())
            }
        })
    }

    /// Shared wait-for-space/enqueue protocol for [`Pipe::append_owned`]
    /// and [`Pipe::append_shared`]. `build_segment` is called with the
    /// pipe's current `NoCopy` setting once the wait succeeds, so each
    /// caller can pick the cheapest path for its own input type instead
    /// of funnelling both through a common intermediate representation.
    fn append_locked(
        &self,
        len: usize,
        build_segment: impl FnOnce(bool) -> Segment,
    ) -> Result<usize> {
        let _span = self.span().entered();
        let mut guard = self.lock();
        let timeout_ms = guard.write_timeout_ms;

        let (g, waited_ok) = wait_for(guard, &self.cv, timeout_ms, |s| {
            (s.queue.total() + len > s.capacity || s.flushing) && !s.out_closed && !s.in_closed
        });
        guard = g;

        if guard.out_closed {
            return Err(PipeError::OutputEndClosed);
        }
        if guard.in_closed {
            return Err(PipeError::InputEndClosed);
        }
        if !waited_ok {
            tracing::debug!(timeout_ms, "append timed out waiting for space");
            return Err(PipeError::Timeout(ms_to_duration(timeout_ms)));
        }

        let no_copy = guard.in_flags.contains(Flags::NO_COPY);
        guard.queue.push(build_segment(no_copy));
        let sync = guard.in_flags.contains(Flags::SYNC);
        let write_timeout_ms = guard.write_timeout_ms;
        self.cv.notify_all();
        drop(guard);

        if sync {
            self.flush(write_timeout_ms)?;
        }
        Ok(len)
    }

    /// Append a single byte.
    pub fn append_byte(&self, byte: u8) -> Result<()> {
        self.append_owned(vec![byte]).map(|_| ())
    }

    /// Block until the buffer drains to empty, or the read end closes,
    /// or `timeout_ms` elapses.
    pub fn flush(&self, timeout_ms: i64) -> Result<()> {
        let _span = self.span().entered();
        let mut guard = self.lock();
        if guard.out_closed {
            return Err(PipeError::OutputEndClosed);
        }
        guard.flushing = true;
        tracing::debug!(pending = guard.queue.total(), "flush started");
        self.cv.notify_all();

        let (g, waited_ok) = wait_for(guard, &self.cv, timeout_ms, |s| {
            s.queue.total() > 0 && !s.out_closed
        });
        guard = g;
        guard.flushing = false;
        self.cv.notify_all();

        if guard.out_closed {
            tracing::debug!("flush aborted: output end closed");
            return Err(PipeError::OutputEndClosed);
        }
        if !waited_ok {
            tracing::debug!(timeout_ms, "flush timed out before buffer drained");
            return Err(PipeError::Timeout(ms_to_duration(timeout_ms)));
        }
        tracing::debug!("flush complete, buffer empty");
        Ok(())
    }

    /// Keep waiting while the buffer is empty, the write end is open,
    /// and this (read) end has not itself been closed. Shared by the
    /// three drain operations below.
    fn wait_for_data(&self) -> Result<MutexGuard<'_, PipeState>> {
        let _span = self.span().entered();
        let guard = self.lock();
        let timeout_ms = guard.read_timeout_ms;
        let (guard, waited_ok) = wait_for(guard, &self.cv, timeout_ms, |s| {
            s.queue.is_empty() && !s.in_closed && !s.out_closed
        });
        if guard.out_closed {
            return Err(PipeError::OutputEndClosed);
        }
        if !waited_ok {
            tracing::debug!(timeout_ms, "read timed out waiting for data");
            return Err(PipeError::Timeout(ms_to_duration(timeout_ms)));
        }
        Ok(guard)
    }

    /// Drain up to `dst.len()` bytes. Returns the number of bytes
    /// copied, which is `0` only at EOF (write end closed and buffer
    /// empty).
    pub fn drain_into(&self, dst: &mut [u8]) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        let mut guard = self.wait_for_data()?;
        let copied = guard.queue.drain_into(dst);
        self.cv.notify_all();
        Ok(copied)
    }

    /// Drain a single byte. `None` means EOF.
    pub fn drain_byte(&self) -> Result<Option<u8>> {
        let mut guard = self.wait_for_data()?;
        let byte = guard.queue.drain_byte();
        self.cv.notify_all();
        Ok(byte)
    }

    /// Discard any buffered bytes without closing either end. This is
    /// what a `ReadHalf`'s `flush`/`discard_buffered` calls; unlike
    /// [`Pipe::close_read_end`] it leaves `out_closed` untouched.
    pub(crate) fn clear_buffer(&self) {
        let mut guard = self.lock();
        guard.queue.clear();
        self.cv.notify_all();
    }

    /// `true` iff data is available, or EOF is reached, within
    /// `timeout_ms`. A non-negative `timeout_ms` of `0` checks once
    /// without blocking.
    pub(crate) fn poll_read_ready(&self, timeout_ms: i64) -> bool {
        let guard = self.lock();
        let (guard, _) = wait_for(guard, &self.cv, timeout_ms, |s| {
            s.queue.is_empty() && !s.in_closed && !s.out_closed
        });
        !guard.queue.is_empty() || guard.in_closed || guard.out_closed
    }

    /// Build the write-only facade for this pipe.
    pub fn write_half(self: &Arc<Self>) -> WriteHalf {
        WriteHalf::new(Arc::clone(self))
    }

    /// Build the read-only facade for this pipe.
    pub fn read_half(self: &Arc<Self>) -> ReadHalf {
        ReadHalf::new(Arc::clone(self))
    }

    /// Drain up to `max` bytes into a freshly allocated buffer. `None`
    /// means EOF; `max` must be positive.
    pub fn drain_available(&self, max: usize) -> Result<Option<Vec<u8>>> {
        if max == 0 {
            return Err(PipeError::invalid_argument(
                "drain_available: max must be positive",
            ));
        }
        let mut guard = self.wait_for_data()?;
        if guard.queue.is_empty() {
            self.cv.notify_all();
            return Ok(None);
        }
        let n = max.min(guard.queue.total());
        let mut buf = vec![0u8; n];
        guard.queue.drain_into(&mut buf);
        self.cv.notify_all();
        Ok(Some(buf))
    }
}

/// Wait while `condition` holds, honoring `timeout_ms`: a zero timeout
/// checks the condition once and never blocks beyond that first check,
/// applied uniformly to every wait in this crate so both directions
/// share one consistent rule. Returns `(guard, true)` if the condition
/// became false before the deadline, `(guard, false)` on timeout.
fn wait_for<'a>(
    guard: MutexGuard<'a, PipeState>,
    cv: &Condvar,
    timeout_ms: i64,
    mut condition: impl FnMut(&PipeState) -> bool,
) -> (MutexGuard<'a, PipeState>, bool) {
    if timeout_ms < 0 {
        let guard = cv
            .wait_while(guard, |s| condition(s))
            .unwrap_or_else(|e| e.into_inner());
        (guard, true)
    } else if timeout_ms == 0 {
        let still_blocked = condition(&guard);
        (guard, !still_blocked)
    } else {
        let (guard, result) = cv
            .wait_timeout_while(guard, Duration::from_millis(timeout_ms as u64), |s| {
                condition(s)
            })
            .unwrap_or_else(|e| e.into_inner());
        (guard, !result.timed_out())
    }
}

fn ms_to_duration(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

/// Builder for [`Pipe`].
pub struct PipeConfig {
    capacity: usize,
    in_flags: Flags,
    out_flags: Flags,
    read_timeout_ms: i64,
    write_timeout_ms: i64,
    name: Option<String>,
}

impl Default for PipeConfig {
    fn default() -> Self {
        PipeConfig {
            capacity: DEFAULT_CAPACITY,
            in_flags: Flags::DEFAULT,
            out_flags: Flags::DEFAULT,
            read_timeout_ms: INFINITE_TIMEOUT,
            write_timeout_ms: INFINITE_TIMEOUT,
            name: None,
        }
    }
}

impl PipeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn in_flags(mut self, flags: Flags) -> Self {
        self.in_flags = flags;
        self
    }

    pub fn out_flags(mut self, flags: Flags) -> Self {
        self.out_flags = flags;
        self
    }

    pub fn read_timeout_ms(mut self, ms: i64) -> Self {
        self.read_timeout_ms = ms;
        self
    }

    pub fn write_timeout_ms(mut self, ms: i64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Name used only in `tracing` spans, to tell apart e.g. the
    /// stdout/stderr/stdin pipes of one command in logs.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build(self) -> Arc<Pipe> {
        Arc::new(Pipe::from_config(self))
    }

    /// Like [`PipeConfig::build`], but validates `capacity` first.
    pub fn try_build(self) -> Result<Arc<Pipe>> {
        if self.capacity == 0 {
            return Err(PipeError::invalid_argument("capacity must be positive"));
        }
        Ok(self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn append_then_drain_round_trips() {
        let pipe = Pipe::new();
        pipe.append_owned(vec![1u8, 2, 3]).unwrap();
        assert_eq!(pipe.len(), 3);
        let mut buf = [0u8; 3];
        assert_eq!(pipe.drain_into(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert!(pipe.is_empty());
    }

    #[test]
    fn multi_segment_writes_concatenate_in_order() {
        let pipe = Pipe::new();
        pipe.append_owned(vec![0x0au8]).unwrap();
        pipe.append_owned(vec![0x0du8]).unwrap();
        pipe.append_owned(vec![0x09u8]).unwrap();
        let mut buf = [0u8; 3];
        assert_eq!(pipe.drain_into(&mut buf).unwrap(), 3);
        assert_eq!(buf, [0x0a, 0x0d, 0x09]);
    }

    #[test]
    fn drain_into_returns_zero_at_eof() {
        let pipe = Pipe::new();
        pipe.close_write_end();
        let mut buf = [0u8; 4];
        assert_eq!(pipe.drain_into(&mut buf).unwrap(), 0);
    }

    #[test]
    fn drain_byte_returns_none_at_eof() {
        let pipe = Pipe::new();
        pipe.close_write_end();
        assert_eq!(pipe.drain_byte().unwrap(), None);
    }

    #[test]
    fn drain_available_returns_none_at_eof() {
        let pipe = Pipe::new();
        pipe.close_write_end();
        assert_eq!(pipe.drain_available(8).unwrap(), None);
    }

    #[test]
    fn drain_available_rejects_zero_max() {
        let pipe = Pipe::new();
        assert!(matches!(
            pipe.drain_available(0),
            Err(PipeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn set_capacity_rejects_zero() {
        let pipe = Pipe::new();
        assert!(matches!(
            pipe.set_capacity(0),
            Err(PipeError::InvalidArgument(_))
        ));
    }

    #[test]
    fn append_resumes_exactly_when_space_frees_up() {
        let pipe = PipeConfig::new().capacity(4).build();
        pipe.append_owned(vec![1u8, 2, 3, 4]).unwrap();
        let pipe2 = Arc::clone(&pipe);
        let writer = thread::spawn(move || {
            pipe2.append_owned(vec![5u8, 6]).unwrap();
        });
        thread::sleep(Duration::from_millis(50));
        let mut buf = [0u8; 2];
        assert_eq!(pipe.drain_into(&mut buf).unwrap(), 2);
        assert_eq!(buf, [1, 2]);
        writer.join().unwrap();
        assert_eq!(pipe.len(), 4);
    }

    #[test]
    fn closing_read_end_unblocks_pending_append() {
        let pipe = PipeConfig::new().capacity(1).build();
        pipe.append_owned(vec![1u8]).unwrap();
        let pipe2 = Arc::clone(&pipe);
        let start = Instant::now();
        let writer = thread::spawn(move || pipe2.append_owned(vec![2u8]));
        thread::sleep(Duration::from_millis(30));
        pipe.close_read_end();
        let result = writer.join().unwrap();
        assert!(matches!(result, Err(PipeError::OutputEndClosed)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn closing_write_end_unblocks_pending_drain() {
        let pipe = Pipe::new();
        let pipe2 = Arc::clone(&pipe);
        let reader = thread::spawn(move || {
            let mut buf = [0u8; 4];
            pipe2.drain_into(&mut buf)
        });
        thread::sleep(Duration::from_millis(30));
        pipe.close_write_end();
        assert_eq!(reader.join().unwrap().unwrap(), 0);
    }

    #[test]
    fn zero_timeout_write_fails_fast_when_full() {
        let pipe = PipeConfig::new().capacity(1).write_timeout_ms(0).build();
        pipe.append_owned(vec![1u8]).unwrap();
        let start = Instant::now();
        let err = pipe.append_owned(vec![2u8]).unwrap_err();
        assert!(matches!(err, PipeError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn positive_timeout_elapses_when_no_data_arrives() {
        let pipe = PipeConfig::new().read_timeout_ms(30).build();
        let start = Instant::now();
        let err = pipe.drain_byte().unwrap_err();
        assert!(matches!(err, PipeError::Timeout(_)));
        assert!(start.elapsed() >= Duration::from_millis(25));
    }

    #[test]
    fn no_copy_flag_avoids_duplicating_shared_bytes() {
        let pipe = PipeConfig::new().in_flags(Flags::NO_COPY).build();
        let shared: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        pipe.append_shared(Arc::clone(&shared)).unwrap();
        // One extra reference is held by the segment inside the pipe.
        assert_eq!(Arc::strong_count(&shared), 2);
        let mut buf = [0u8; 3];
        pipe.drain_into(&mut buf).unwrap();
        assert_eq!(Arc::strong_count(&shared), 1);
    }

    #[test]
    fn append_shared_copies_into_a_private_vec_without_no_copy() {
        let pipe = Pipe::new();
        let shared: Arc<[u8]> = Arc::from(vec![9u8, 8, 7]);
        pipe.append_shared(Arc::clone(&shared)).unwrap();
        // Default (copy) in-flags: the pipe must not be aliasing the
        // caller's Arc, so the caller's reference count stays at 1.
        assert_eq!(Arc::strong_count(&shared), 1);
        let mut buf = [0u8; 3];
        pipe.drain_into(&mut buf).unwrap();
        assert_eq!(buf, [9, 8, 7]);
    }

    #[test]
    fn flags_can_be_reassigned_with_sticky_invisible() {
        let pipe = Pipe::new();
        pipe.set_in_flags(Flags::PIPE_INVISIBLE);
        pipe.set_in_flags(Flags::NO_COPY);
        let flags = pipe.in_flags();
        assert!(flags.contains(Flags::NO_COPY));
        assert!(flags.contains(Flags::PIPE_INVISIBLE));
    }
}
