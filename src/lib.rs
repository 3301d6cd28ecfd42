//! A bounded, thread-safe byte pipe.
//!
//! A [`Pipe`] is a single buffer shared between a producer and a
//! consumer, each of which sees only the half of the API relevant to
//! it: [`WriteHalf`] for appending bytes, [`ReadHalf`] for draining
//! them. Both halves can be handed to different threads; all access is
//! serialized through one mutex and one condition variable inside the
//! `Pipe` itself, so neither half needs its own synchronization.
//!
//! This is the transport this crate's command-streaming path is built
//! on: a remote command's stdout, stderr and stdin are each one `Pipe`,
//! fed by whatever delivers the underlying bytes (a channel, a socket,
//! a test harness) and drained by whatever consumes them. See
//! [`command`] for a minimal illustration of wiring three pipes
//! together this way.
//!
//! # Capacity and backpressure
//!
//! Every `Pipe` has a capacity (default 256 MiB, see
//! [`DEFAULT_CAPACITY`]). A write that would exceed it blocks the
//! writer until the reader drains enough bytes, or until the writer's
//! own timeout elapses. This is deliberate backpressure: a slow or
//! absent reader stalls the writer rather than letting memory grow
//! without bound.
//!
//! # Timeouts
//!
//! Each direction has an independent timeout, in milliseconds:
//! negative means wait forever, zero means check once and never block,
//! positive bounds the wait. The same rule is applied uniformly to
//! every blocking operation in this crate (append, flush, drain, poll)
//! — see [`pipe::Pipe`]'s internal `wait_for` helper.
//!
//! # Closing
//!
//! Closing the write end ([`WriteHalf::close`]) lets the reader drain
//! whatever remains buffered before it sees EOF. Closing the read end
//! ([`ReadHalf::close`]) is more abrupt: it discards anything still
//! buffered and immediately unblocks any writer stuck waiting for
//! space, since there is no longer anyone left to read it.
//!
//! # Zero-copy writes
//!
//! By default `append`/`write` duplicate the caller's bytes into a
//! private buffer. Setting [`Flags::NO_COPY`] on a pipe's in-flags lets
//! a caller who already holds an `Arc<[u8]>` hand it over without a
//! copy; see [`WriteHalf::write_shared`].

#![forbid(unsafe_code)]

mod command;
mod error;
mod flags;
mod pipe;
mod queue;
mod read_half;
mod segment;
mod write_half;

pub use command::{run_command, CommandOutcome, CommandSink};
pub use error::{PipeError, Result};
pub use flags::Flags;
pub use pipe::{Pipe, PipeConfig, DEFAULT_CAPACITY, INFINITE_TIMEOUT};
pub use read_half::{PollMode, ReadHalf, DEFAULT_DRAIN_AVAILABLE_MAX};
pub use write_half::WriteHalf;
