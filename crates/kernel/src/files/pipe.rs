use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use types::Errno;

use crate::signal::Signals;
use crate::wake::POLL_INTERVAL;

#[derive(Debug, Default)]
struct Buffer {
    data: VecDeque<u8>,
    readers: usize,
    writers: usize,
}

/// An unbounded byte queue with reader and writer counts.
#[derive(Debug, Default)]
struct Pipe {
    buffer: Mutex<Buffer>,
    changed: Condvar,
}

impl Pipe {
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read end. Dropping the last reader makes writes fail with EPIPE.
#[derive(Debug)]
pub struct PipeReader(Arc<Pipe>);

/// Write end. Dropping the last writer gives readers EOF.
#[derive(Debug)]
pub struct PipeWriter(Arc<Pipe>);

pub fn pipe() -> (PipeReader, PipeWriter) {
    let pipe = Arc::new(Pipe::default());
    {
        let mut buffer = pipe.lock();
        buffer.readers = 1;
        buffer.writers = 1;
    }
    (PipeReader(Arc::clone(&pipe)), PipeWriter(pipe))
}

impl PipeReader {
    /// Block until data arrives or every writer is gone.
    ///
    /// The wait re-checks the caller's signals every poll interval and
    /// gives up with EINTR when one can be delivered.
    pub fn read(&self, buf: &mut [u8], nonblocking: bool, signals: &Signals) -> Result<usize, Errno> {
        let mut buffer = self.0.lock();
        loop {
            if !buffer.data.is_empty() {
                let n = buf.len().min(buffer.data.len());
                for (dst, src) in buf.iter_mut().zip(buffer.data.drain(..n)) {
                    *dst = src;
                }
                return Ok(n);
            }
            if buffer.writers == 0 || buf.is_empty() {
                return Ok(0);
            }
            if nonblocking {
                return Err(Errno::EAGAIN);
            }
            if signals.interrupted() {
                return Err(Errno::EINTR);
            }
            buffer = self
                .0
                .changed
                .wait_timeout(buffer, POLL_INTERVAL)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Data is waiting or the pipe is at EOF.
    pub fn readable(&self) -> bool {
        let buffer = self.0.lock();
        !buffer.data.is_empty() || buffer.writers == 0
    }

    pub fn available(&self) -> usize {
        self.0.lock().data.len()
    }
}

impl PipeWriter {
    pub fn write(&self, data: &[u8]) -> Result<usize, Errno> {
        let mut buffer = self.0.lock();
        if buffer.readers == 0 {
            return Err(Errno::EPIPE);
        }
        buffer.data.extend(data);
        self.0.changed.notify_all();
        Ok(data.len())
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.0.lock().readers -= 1;
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.0.lock().writers -= 1;
        self.0.changed.notify_all();
    }
}
