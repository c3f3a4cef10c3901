//! Unix process layer over the MIPS engine.
//!
//! Each guest process is one host thread owning its CPU, address space and
//! [`Task`]. The [`Registry`] links them: pids, parentage, exit statuses
//! and signal delivery between processes.

// exports
pub mod config;
pub mod error;
pub mod files;
pub mod process;
pub mod registry;
pub mod signal;
pub mod syscall;
pub mod task;
pub mod wake;

pub use config::{Config, SharedBuffer, Stdio, Strategy};
pub use error::KernelError;
pub use process::{program_name, run_program, spawn, ExitStatus, Process};
pub use registry::{Pid, Registry, RegistryListener};
pub use syscall::Reply;
pub use task::Task;
