use std::thread;

use crate::flags::Flags;
use crate::pipe::PipeConfig;
use crate::write_half::WriteHalf;

/// Cap passed to the stdin-draining `drain_available` call. Large enough
/// that a single drain almost always empties the pipe in one pass.
const STDIN_DRAIN_MAX: usize = 5_000_000;

/// Receives bytes read back off a command's stdin pipe.
pub trait CommandSink: Send {
    fn accept(&mut self, bytes: &[u8]);
}

impl<F: FnMut(&[u8]) + Send> CommandSink for F {
    fn accept(&mut self, bytes: &[u8]) {
        self(bytes)
    }
}

/// stdout/stderr collected once a command-shaped pipe trio has run to
/// completion.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Wires up three pipes the way a remote command's stdout, stderr and
/// stdin streams are wired in this crate's intended use (see the
/// crate-level docs): stdout/stderr are `NoCopy | PipeInvisible` since
/// their `Pipe` handles have no business leaking past this module,
/// stdin additionally carries `Sync` on its write side so every byte
/// the caller hands in is immediately visible to whatever drains it.
///
/// `produce` stands in for a channel delivering command output: it
/// receives the stdout and stderr `WriteHalf`s, writes to them, and
/// must close both when the command has finished. `feed_stdin` is
/// handed the stdin `WriteHalf`; it must close it once there is no
/// more input to send. `sink` receives each chunk drained from stdin
/// as it arrives.
///
/// This is a minimal, self-contained stand-in for the adapter that
/// would sit between an SSH channel and this crate's pipes — not a
/// real SSH implementation.
pub fn run_command(
    produce: impl FnOnce(WriteHalf, WriteHalf) + Send + 'static,
    feed_stdin: impl FnOnce(WriteHalf) + Send + 'static,
    mut sink: impl CommandSink + 'static,
) -> CommandOutcome {
    let stdout_pipe = PipeConfig::new()
        .in_flags(Flags::NO_COPY | Flags::PIPE_INVISIBLE)
        .out_flags(Flags::NO_COPY | Flags::PIPE_INVISIBLE)
        .name("stdout")
        .build();
    let stderr_pipe = PipeConfig::new()
        .in_flags(Flags::NO_COPY | Flags::PIPE_INVISIBLE)
        .out_flags(Flags::NO_COPY | Flags::PIPE_INVISIBLE)
        .name("stderr")
        .build();
    let stdin_pipe = PipeConfig::new()
        .in_flags(Flags::PIPE_INVISIBLE | Flags::SYNC)
        .name("stdin")
        .build();

    let producer = {
        let stdout_wh = stdout_pipe.write_half();
        let stderr_wh = stderr_pipe.write_half();
        thread::spawn(move || produce(stdout_wh, stderr_wh))
    };

    let stdin_feeder = {
        let stdin_wh = stdin_pipe.write_half();
        thread::spawn(move || feed_stdin(stdin_wh))
    };

    let stdout_collector = {
        let stdout_rh = stdout_pipe.read_half();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stdout_rh.write_to(&mut buf);
            buf
        })
    };

    let stderr_collector = {
        let stderr_rh = stderr_pipe.read_half();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = stderr_rh.write_to(&mut buf);
            buf
        })
    };

    let stdin_drainer = {
        let stdin_rh = stdin_pipe.read_half();
        thread::spawn(move || {
            while let Ok(Some(chunk)) = stdin_rh.drain_available(STDIN_DRAIN_MAX) {
                sink.accept(&chunk);
            }
        })
    };

    producer.join().expect("producer thread panicked");
    stdin_feeder.join().expect("stdin feeder thread panicked");
    let stdout = stdout_collector
        .join()
        .expect("stdout collector thread panicked");
    let stderr = stderr_collector
        .join()
        .expect("stderr collector thread panicked");
    stdin_drainer.join().expect("stdin drainer thread panicked");

    CommandOutcome { stdout, stderr }
}
