use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use vm::memory::DEFAULT_STACK_SIZE;
use vm::Instrumentation;

/// Which run loop drives each process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    Fast,
    Instrumented,
}

/// A byte buffer shared between the emulator and whoever inspects it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contents(bytes: &[u8]) -> Self {
        Self(Arc::new(Mutex::new(bytes.to_vec())))
    }

    pub fn append(&self, bytes: &[u8]) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }

    /// Remove and return up to `max` bytes from the front.
    pub fn take(&self, max: usize) -> Vec<u8> {
        let mut buf = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let n = max.min(buf.len());
        buf.drain(..n).collect()
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Where descriptors 0, 1 and 2 of the first process go.
#[derive(Debug, Clone, Default)]
pub enum Stdio {
    #[default]
    Inherit,
    /// Read from `input` (EOF when drained), write into the two buffers.
    Capture {
        input: SharedBuffer,
        output: SharedBuffer,
        error: SharedBuffer,
    },
}

impl Stdio {
    pub fn capture() -> Self {
        Stdio::Capture {
            input: SharedBuffer::new(),
            output: SharedBuffer::new(),
            error: SharedBuffer::new(),
        }
    }
}

/// Runtime options, fixed for the life of a registry.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host directory served as the guest `/`.
    pub root: PathBuf,
    pub strategy: Strategy,
    pub disasm: bool,
    pub regprint: bool,
    pub funlog: bool,
    pub interactive: bool,
    /// Function names to stop at.
    pub breakpoints: Vec<String>,
    pub syscall_trace: bool,
    pub stack_size: u32,
    pub stdio: Stdio,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            strategy: Strategy::Fast,
            disasm: false,
            regprint: false,
            funlog: false,
            interactive: false,
            breakpoints: Vec::new(),
            syscall_trace: false,
            stack_size: DEFAULT_STACK_SIZE,
            stdio: Stdio::Inherit,
        }
    }
}

impl Config {
    pub fn instrumentation(&self) -> Instrumentation {
        Instrumentation {
            disasm: self.disasm,
            regprint: self.regprint,
            funlog: self.funlog,
            interactive: self.interactive,
        }
    }
}
