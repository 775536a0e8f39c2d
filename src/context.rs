//! The context handed to command functions and DAG task functions: a
//! cancellation flag plus, when a `Graph` has output buffering enabled,
//! the combined stdout/stderr buffer (spec.md §6.2).

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// The non-error return channel for a task function (spec.md §6.1):
/// `Done` is the ordinary case, `SkipParents` requests the scheduler mark
/// every ancestor vertex as skipped without treating this as a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Done,
    SkipParents,
}

#[derive(Clone)]
pub struct Context {
    cancel: Arc<AtomicBool>,
    stdout_buffer: Option<Arc<Mutex<Vec<u8>>>>,
    stderr_buffer: Option<Arc<Mutex<Vec<u8>>>>,
}

impl Context {
    pub fn new(cancel: Arc<AtomicBool>) -> Self {
        Self {
            cancel,
            stdout_buffer: None,
            stderr_buffer: None,
        }
    }

    pub fn with_buffers(
        cancel: Arc<AtomicBool>,
        stdout_buffer: Arc<Mutex<Vec<u8>>>,
        stderr_buffer: Arc<Mutex<Vec<u8>>>,
    ) -> Self {
        Self {
            cancel,
            stdout_buffer: Some(stdout_buffer),
            stderr_buffer: Some(stderr_buffer),
        }
    }

    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Falls back to the process's real stdout when no buffer is attached
    /// (spec.md §6.2).
    pub fn stdout_buffer(&self) -> BufferOrStdio {
        match &self.stdout_buffer {
            Some(buf) => BufferOrStdio::Buffer(Arc::clone(buf)),
            None => BufferOrStdio::Stdout(io::stdout()),
        }
    }

    pub fn stderr_buffer(&self) -> BufferOrStdio {
        match &self.stderr_buffer {
            Some(buf) => BufferOrStdio::Buffer(Arc::clone(buf)),
            None => BufferOrStdio::Stderr(io::stderr()),
        }
    }
}

/// A `Write` target that is either a shared in-memory buffer or one of the
/// process's real standard streams.
pub enum BufferOrStdio {
    Buffer(Arc<Mutex<Vec<u8>>>),
    Stdout(io::Stdout),
    Stderr(io::Stderr),
}

impl Write for BufferOrStdio {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            BufferOrStdio::Buffer(b) => b.lock().unwrap().write(buf),
            BufferOrStdio::Stdout(s) => s.write(buf),
            BufferOrStdio::Stderr(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            BufferOrStdio::Buffer(_) => Ok(()),
            BufferOrStdio::Stdout(s) => s.flush(),
            BufferOrStdio::Stderr(s) => s.flush(),
        }
    }
}
