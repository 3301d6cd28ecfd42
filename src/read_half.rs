use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{PipeError, Result};
use crate::pipe::Pipe;
use crate::write_half::to_io_error;

/// Default `max` for [`ReadHalf::drain_available`].
pub const DEFAULT_DRAIN_AVAILABLE_MAX: usize = 65_536;

/// Chunk size used by [`ReadHalf::write_to`].
const WRITE_TO_CHUNK: usize = 4096;

/// Select-style poll mode. Only [`PollMode::SelectRead`] is supported;
/// any other mode fails with [`PipeError::InvalidArgument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    SelectRead,
    SelectWrite,
    SelectError,
}

/// Read-only facade over a [`Pipe`].
///
/// Closing a `ReadHalf` closes the pipe's read end *and* discards any
/// buffered bytes — unlike `WriteHalf::close`, which leaves the buffer
/// intact for the reader. Write-style operations on this half always
/// fail with [`PipeError::NotSupported`].
pub struct ReadHalf {
    owner: Arc<Pipe>,
    self_closed: AtomicBool,
}

impl ReadHalf {
    pub(crate) fn new(owner: Arc<Pipe>) -> Self {
        ReadHalf {
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

    /// Read up to `buf.len()` bytes. Returns `0` at EOF.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.check_open()?;
        self.owner.drain_into(buf)
    }

    /// Read a single byte. Returns `-1` at EOF — the rest of this
    /// crate's reads use idiomatic `Option`/`usize` returns, but this
    /// one keeps the `-1` sentinel as part of its documented external
    /// contract.
    pub fn read_byte(&self) -> Result<i32> {
        self.check_open()?;
        Ok(self.owner.drain_byte()?.map_or(-1, i32::from))
    }

    /// Drain up to `max` bytes into a freshly allocated buffer, or
    /// `None` at EOF.
    pub fn drain_available(&self, max: usize) -> Result<Option<Vec<u8>>> {
        self.check_open()?;
        self.owner.drain_available(max)
    }

    /// [`ReadHalf::drain_available`] with the default cap.
    pub fn drain_available_default(&self) -> Result<Option<Vec<u8>>> {
        self.drain_available(DEFAULT_DRAIN_AVAILABLE_MAX)
    }

    /// Discard all buffered bytes. This is what `flush` means on a
    /// `ReadHalf` — surprising for a stream, so it is exposed under
    /// this clearer name too.
    pub fn discard_buffered(&self) -> Result<()> {
        self.check_open()?;
        self.owner.clear_buffer();
        Ok(())
    }

    /// Stream-conformant alias for [`ReadHalf::discard_buffered`]: this
    /// crate keeps the surprising `flush == clear` contract rather than
    /// silently reinterpreting it as a no-op.
    pub fn flush(&self) -> Result<()> {
        self.discard_buffered()
    }

    /// Wait up to `micros` microseconds (rounded down to milliseconds)
    /// for data to become available. Only [`PollMode::SelectRead`] is
    /// supported.
    pub fn poll(&self, micros: u64, mode: PollMode) -> Result<bool> {
        self.check_open()?;
        if mode != PollMode::SelectRead {
            return Err(PipeError::invalid_argument(
                "poll: only SelectRead is supported",
            ));
        }
        let millis = micros / 1_000;
        let deadline_ms: i64 = millis.min(i64::MAX as u64) as i64;
        Ok(self.owner.poll_read_ready(deadline_ms))
    }

    /// Forward 4096-byte chunks to `sink` until EOF.
    pub fn write_to(&self, sink: &mut impl io::Write) -> Result<()> {
        self.check_open()?;
        let mut scratch = [0u8; WRITE_TO_CHUNK];
        loop {
            let n = self.owner.drain_into(&mut scratch)?;
            if n == 0 {
                return Ok(());
            }
            sink.write_all(&scratch[..n])
                .map_err(|_| PipeError::OutputEndClosed)?;
        }
    }

    /// Close this half: idempotent, discards buffered bytes, wakes any
    /// blocked writer.
    pub fn close(&self) {
        if !self.self_closed.swap(true, Ordering::AcqRel) {
            self.owner.close_read_end();
        }
    }

    /// Alias for [`ReadHalf::close`].
    pub fn dispose(&self) {
        self.close();
    }

    /// Opaque-handle accessor: `None` if `PipeInvisible` is set on the
    /// pipe's out-flags, otherwise a handle to the owning [`Pipe`].
    pub fn pipe(&self) -> Option<Arc<Pipe>> {
        let flags = self.owner.out_flags();
        self.owner.visible(flags)
    }

    pub fn position(&self) -> usize {
        0
    }

    /// Always fails: `ReadHalf` has no concept of a settable position.
    pub fn set_position(&self, _pos: usize) -> Result<()> {
        Err(PipeError::NotSupported("set_position on ReadHalf"))
    }

    pub fn can_read(&self) -> bool {
        !self.self_closed.load(Ordering::Acquire)
            && (self.owner.len() > 0 || !self.owner.is_write_end_closed())
    }

    pub fn can_write(&self) -> bool {
        false
    }

    pub const fn can_seek(&self) -> bool {
        false
    }

    pub const fn can_timeout(&self) -> bool {
        true
    }

    pub fn set_read_timeout_ms(&self, ms: i64) {
        self.owner.set_read_timeout_ms(ms);
    }

    pub fn read_timeout_ms(&self) -> i64 {
        self.owner.read_timeout_ms()
    }

    /// Write-direction operations are cross-direction and unsupported on
    /// a read-only half.
    pub fn set_write_timeout_ms(&self, _ms: i64) -> Result<()> {
        Err(PipeError::NotSupported("set_write_timeout_ms on ReadHalf"))
    }

    pub fn write(&self, _buf: &[u8]) -> Result<usize> {
        Err(PipeError::NotSupported("write on ReadHalf"))
    }
}

impl io::Read for ReadHalf {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ReadHalf::read(self, buf).map_err(to_io_error)
    }
}
