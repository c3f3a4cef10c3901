use types::Signal;

use crate::memory::MemoryError;

/// Engine faults. Any of these ends the offending process with the
/// crashed status after a diagnostic dump.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    #[error("invalid instruction 0x{word:08x} at 0x{pc:08x}")]
    InvalidInstruction { pc: u32, word: u32 },
    #[error("register 0 corrupted by instruction at 0x{pc:08x}")]
    ZeroRegister { pc: u32 },
    #[error("memory fault at 0x{pc:08x}: {source}")]
    Memory {
        pc: u32,
        #[source]
        source: MemoryError,
    },
    #[error("unimplemented fp control register {0}")]
    ControlRegister(usize),
    #[error("unknown fp rounding mode 0x{0:x}")]
    RoundingMode(u32),
    #[error("integer overflow at 0x{pc:08x}")]
    Overflow { pc: u32 },
    #[error("break {code} at 0x{pc:08x}")]
    Break { pc: u32, code: u32 },
    /// teq/tne with a true condition; code 7 is gcc's divide-by-zero check.
    #[error("conditional trap {code} at 0x{pc:08x}")]
    ConditionalTrap { pc: u32, code: u32 },
    /// Kernel-side bookkeeping went wrong, e.g. an unbalanced signal frame.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Why a run loop stopped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    /// exit or exit_group with the low byte of the code.
    #[error("exit {0}")]
    Exit(u8),
    /// An unhandled terminating or aborting signal.
    #[error("killed by {0}")]
    Killed(Signal),
    #[error(transparent)]
    Fault(#[from] Fault),
}
