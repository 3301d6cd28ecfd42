use std::time::Duration;

use thiserror::Error;

/// Errors produced by [`crate::Pipe`] and its [`crate::WriteHalf`] /
/// [`crate::ReadHalf`] facades.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipeError {
    /// A caller-supplied argument was out of range: a nil/zero-length
    /// buffer where data was required, a negative or out-of-bounds
    /// offset/count, a non-positive capacity or block size, or an
    /// unsupported poll mode.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The operation was invoked on a half that has already been
    /// closed (`WriteHalf::close` / `ReadHalf::close`) or disposed.
    #[error("operation invoked on a disposed pipe half")]
    Disposed,

    /// The wait exceeded its configured deadline.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// A write (or flush) was attempted, or was in progress, while the
    /// read end of the pipe was closed.
    #[error("output end of the pipe is closed")]
    OutputEndClosed,

    /// A write was attempted, or was in progress, while the write end
    /// of the pipe itself had already been closed by another caller.
    #[error("input end of the pipe is closed")]
    InputEndClosed,

    /// A structural or cross-direction operation unsupported by this
    /// half: seek, set-length, write-on-`ReadHalf`, read-on-`WriteHalf`,
    /// or setting the timeout of the opposite direction.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),
}

impl PipeError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

/// Result alias used throughout this crate.
pub type Result<T> = std::result::Result<T, PipeError>;
