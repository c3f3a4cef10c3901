use loader::LoadError;
use vm::{Fault, MemoryError, Trap};

/// Kernel-side inconsistencies. None of these are guest-visible; each one
/// ends the process that hit it.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("unbalanced signal restore: sp 0x{found:08x}, frame ends at 0x{expected:08x}")]
    UnbalancedRestore { expected: u32, found: u32 },
    #[error("signal frame needs an 8-aligned stack, sp is 0x{0:08x}")]
    MisalignedFrame(u32),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Fault(#[from] Fault),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("cannot start process thread: {0}")]
    Spawn(#[source] std::io::Error),
}

impl From<KernelError> for Trap {
    fn from(err: KernelError) -> Self {
        match err {
            KernelError::Fault(fault) => Trap::Fault(fault),
            other => Trap::Fault(Fault::Internal(other.to_string())),
        }
    }
}
