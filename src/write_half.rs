use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PipeError, Result};
use crate::pipe::Pipe;

/// Write-only facade over a [`Pipe`].
///
/// Closing a `WriteHalf` closes the pipe's write end: pending reads
/// drain whatever remains buffered, then see EOF. Read-style operations
/// on this half always fail with [`PipeError::NotSupported`].
pub struct WriteHalf {
    owner: Arc<Pipe>,
    self_closed: AtomicBool,
}

impl WriteHalf {
    pub(crate) fn new(owner: Arc<Pipe>) -> Self {
        WriteHalf {
            owner,
            self_closed: AtomicBool::new(false),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.self_closed.load(Ordering::Acquire) {
            Err(PipeError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Write `buf` to the pipe. This copies `buf` into an owned `Vec`
    /// once, here, to hand the pipe ownership of a borrowed slice; the
    /// pipe itself then queues that `Vec` directly with no further copy
    /// (see [`WriteHalf::write_shared`] for the zero-copy path when the
    /// caller already owns an `Arc<[u8]>`).
    pub fn write(&self, buf: &[u8]) -> Result<usize> {
        self.check_open()?;
        self.owner.append_owned(buf.to_vec())
    }

    /// Write an already-shared buffer. If the pipe's `NoCopy` in-flag is
    /// set, the bytes are aliased rather than duplicated.
    pub fn write_shared(&self, buf: Arc<[u8]>) -> Result<usize> {
        self.check_open()?;
        self.owner.append_shared(buf)
    }

    pub fn write_byte(&self, byte: u8) -> Result<()> {
        self.check_open()?;
        self.owner.append_byte(byte)
    }

    /// Block until the pipe drains to empty.
    pub fn flush(&self) -> Result<()> {
        self.check_open()?;
        self.owner.flush(self.owner.write_timeout_ms())
    }

    /// Close this half: idempotent, wakes any blocked reader/writer.
    pub fn close(&self) {
        if !self.self_closed.swap(true, Ordering::AcqRel) {
            self.owner.close_write_end();
        }
    }

    /// Alias for [`WriteHalf::close`].
    pub fn dispose(&self) {
        self.close();
    }

    /// Opaque-handle accessor: `None` if `PipeInvisible` is set on the
    /// pipe's in-flags, otherwise a handle to the owning [`Pipe`].
    pub fn pipe(&self) -> Option<Arc<Pipe>> {
        let flags = self.owner.in_flags();
        self.owner.visible(flags)
    }

    /// Current number of bytes buffered in the owning pipe.
    pub fn length(&self) -> usize {
        self.owner.len()
    }

    /// Always equal to [`WriteHalf::length`].
    pub fn position(&self) -> usize {
        self.length()
    }

    /// Always fails: `WriteHalf` has no concept of a settable position.
    pub fn set_position(&self, _pos: usize) -> Result<()> {
        Err(PipeError::NotSupported("set_position on WriteHalf"))
    }

    pub fn can_write(&self) -> bool {
        !self.self_closed.load(Ordering::Acquire) && !self.owner.is_read_end_closed()
    }

    pub fn can_read(&self) -> bool {
        false
    }

    pub const fn can_seek(&self) -> bool {
        false
    }

    pub const fn can_timeout(&self) -> bool {
        true
    }

    pub fn set_write_timeout_ms(&self, ms: i64) {
        self.owner.set_write_timeout_ms(ms);
    }

    pub fn write_timeout_ms(&self) -> i64 {
        self.owner.write_timeout_ms()
    }

    /// Read-direction operations are cross-direction and unsupported on
    /// a write-only half.
    pub fn set_read_timeout_ms(&self, _ms: i64) -> Result<()> {
        Err(PipeError::NotSupported("set_read_timeout_ms on WriteHalf"))
    }

    pub fn read(&self, _buf: &mut [u8]) -> Result<usize> {
        Err(PipeError::NotSupported("read on WriteHalf"))
    }
}

impl io::Write for WriteHalf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        WriteHalf::write(self, buf).map_err(to_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        WriteHalf::flush(self).map_err(to_io_error)
    }
}

pub(crate) fn to_io_error(err: PipeError) -> io::Error {
    use io::ErrorKind;
    let kind = match err {
        PipeError::Timeout(_) => ErrorKind::TimedOut,
        PipeError::OutputEndClosed => ErrorKind::BrokenPipe,
        PipeError::InputEndClosed => ErrorKind::BrokenPipe,
        PipeError::Disposed => ErrorKind::NotConnected,
        PipeError::NotSupported(_) => ErrorKind::Unsupported,
        PipeError::InvalidArgument(_) => ErrorKind::InvalidInput,
    };
    io::Error::new(kind, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::Pipe;

    #[test]
    fn write_after_close_is_disposed() {
        let pipe = Pipe::new();
        let wh = WriteHalf::new(Arc::clone(&pipe));
        wh.close();
        assert!(matches!(wh.write(b"x"), Err(PipeError::Disposed)));
    }

    #[test]
    fn close_is_idempotent() {
        let pipe = Pipe::new();
        let wh = WriteHalf::new(pipe);
        wh.close();
        wh.close();
        assert!(!wh.can_write());
    }

    #[test]
    fn read_side_operations_are_not_supported() {
        let pipe = Pipe::new();
        let wh = WriteHalf::new(pipe);
        let mut buf = [0u8; 4];
        assert!(matches!(wh.read(&mut buf), Err(PipeError::NotSupported(_))));
        assert!(matches!(
            wh.set_read_timeout_ms(10),
            Err(PipeError::NotSupported(_))
        ));
        assert!(!wh.can_read());
        assert!(!wh.can_seek());
    }

    #[test]
    fn pipe_invisible_hides_owner() {
        let pipe = crate::pipe::PipeConfig::new()
            .in_flags(crate::flags::Flags::PIPE_INVISIBLE)
            .build();
        let wh = pipe.write_half();
        assert!(wh.pipe().is_none());

        let visible_pipe = Pipe::new();
        let visible_wh = visible_pipe.write_half();
        assert!(visible_wh.pipe().is_some());
    }

    #[test]
    fn position_tracks_length() {
        let pipe = Pipe::new();
        let wh = WriteHalf::new(pipe);
        wh.write(b"hello").unwrap();
        assert_eq!(wh.position(), 5);
        assert_eq!(wh.length(), 5);
    }
}
