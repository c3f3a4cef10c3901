//! MIPS32 (big-endian, o32) user-mode engine.
//!
//! The pieces a process needs that do not depend on the kernel: the
//! instruction engine and its FPU, paged copy-on-write memory, function
//! logging and crash diagnostics.

pub mod asm;
pub mod coproc;
pub mod cpu;
pub mod decoder;
pub mod diag;
pub mod funlog;
pub mod instruction;
pub mod isa;
pub mod memory;
pub mod registers;
pub mod symbols;
pub mod sys_call;
pub mod trap;

mod exe;

pub use coproc::{Coprocessor, Rounding, FPU_FRAME_WORDS};
pub use cpu::{Instrumentation, Step, CPU};
pub use funlog::FunctionLog;
pub use instruction::{Fmt, FpOp, Instruction};
pub use memory::{AddressSpace, MemoryError, PageAllocator, PageStats};
pub use registers::Register;
pub use symbols::SymbolTable;
pub use sys_call::SyscallHandler;
pub use trap::{Fault, Trap};
