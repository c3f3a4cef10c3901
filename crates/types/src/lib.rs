//! ABI vocabulary shared by the engine, the kernel layer and the runner:
//! errno codes, signal numbers, syscall numbers and the constant table that
//! resolves struct layouts for the target C library.

pub mod abi;
pub mod errno;
pub mod signal;
pub mod syscall;

pub use abi::{ConstantTable, Field};
pub use errno::Errno;
pub use signal::{DefaultAction, SigSet, Signal};
