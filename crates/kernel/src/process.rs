//! A running process: engine state plus its kernel-side task, driven by
//! one host thread.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use loader::ProgramImage;
use log::{error, warn};
use types::Signal;
use vm::diag::crash_report;
use vm::{AddressSpace, Trap, CPU};

use crate::config::Strategy;
use crate::error::KernelError;
use crate::registry::{Pid, Registry};
use crate::signal::SignalState;
use crate::task::Task;

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(u8),
    Signaled(Signal),
    /// An engine fault or internal error.
    Crashed,
}

impl ExitStatus {
    pub fn from_trap(trap: &Trap) -> Self {
        match trap {
            Trap::Exit(code) => ExitStatus::Exited(*code),
            Trap::Killed(sig) => ExitStatus::Signaled(*sig),
            Trap::Fault(_) => ExitStatus::Crashed,
        }
    }

    /// Host-style exit code.
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Exited(code) => code,
            ExitStatus::Signaled(sig) => 128 + sig.number() as u8,
            ExitStatus::Crashed => 255,
        }
    }

    /// Status word as waitpid stores it.
    pub fn wait_status(self) -> u32 {
        match self {
            ExitStatus::Exited(code) => (code as u32) << 8,
            ExitStatus::Signaled(sig) => sig.number(),
            ExitStatus::Crashed => 255 << 8,
        }
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Exited(code) => write!(f, "exited with {code}"),
            ExitStatus::Signaled(sig) => write!(f, "killed by {sig}"),
            ExitStatus::Crashed => write!(f, "crashed"),
        }
    }
}

pub struct Process {
    pub cpu: CPU,
    pub memory: AddressSpace,
    pub task: Task,
}

impl Process {
    pub fn new(cpu: CPU, memory: AddressSpace, task: Task) -> Self {
        Self { cpu, memory, task }
    }

    pub fn pid(&self) -> Pid {
        self.task.pid()
    }

    /// Hand the process to a detached thread of its own.
    pub fn start(self) -> Result<(), KernelError> {
        let pid = self.pid();
        thread::Builder::new()
            .name(format!("pid{pid}"))
            .spawn(move || {
                self.run();
            })
            .map(drop)
            .map_err(KernelError::Spawn)
    }

    /// Run to the end and report to the registry.
    pub fn run(mut self) -> ExitStatus {
        let registry = Arc::clone(self.task.registry());
        let config = registry.config();
        let pid = self.pid();
        warn!("pid {} program start: {:?} strategy", pid, config.strategy);

        let started = Instant::now();
        let trap = match config.strategy {
            Strategy::Fast => self.cpu.run(&mut self.memory, &mut self.task),
            Strategy::Instrumented => {
                self.cpu
                    .run_instrumented(&mut self.memory, &mut self.task, &config.instrumentation())
            }
        };
        let status = ExitStatus::from_trap(&trap);

        match &trap {
            Trap::Fault(fault) => error!(
                "pid {} ({}): {}\n{}",
                pid,
                self.task.name(),
                fault,
                crash_report(&self.cpu, &self.memory, self.task.symbols())
            ),
            _ => warn!(
                "pid {} program exit: {}, took {} ms",
                pid,
                status,
                started.elapsed().as_millis()
            ),
        }

        self.task.close_files();
        self.memory.clear();
        warn!("{}", self.memory.stats());
        registry.exit(pid, status);
        status
    }
}

/// basename of argv[0].
pub fn program_name(argv: &[String]) -> String {
    argv.first()
        .and_then(|arg| Path::new(arg).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "?".to_string())
}

/// Create the first process of a run from `image` and start its thread.
pub fn spawn(
    registry: &Arc<Registry>,
    image: &ProgramImage,
    argv: &[String],
    envp: &[String],
) -> Result<Pid, KernelError> {
    let (pid, signals) = registry.register(None, &program_name(argv), SignalState::new());
    let mut task = Task::new(pid, Arc::clone(registry), signals);
    let mut cpu = CPU::new();
    let mut memory = AddressSpace::new(registry.allocator().clone());

    let started = task
        .load(&mut cpu, &mut memory, image, argv, envp)
        .and_then(|()| Process::new(cpu, memory, task).start());
    if let Err(err) = started {
        error!("pid {}: {}", pid, err);
        registry.exit(pid, ExitStatus::Crashed);
        registry.wait_for(pid);
        return Err(err);
    }
    Ok(pid)
}

/// Run `image` and every process it forks until the first one exits.
pub fn run_program(
    registry: &Arc<Registry>,
    image: &ProgramImage,
    argv: &[String],
    envp: &[String],
) -> Result<ExitStatus, KernelError> {
    let pid = spawn(registry, image, argv, envp)?;
    Ok(registry.wait_for(pid).unwrap_or(ExitStatus::Crashed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_encodings() {
        assert_eq!(ExitStatus::Exited(7).wait_status(), 0x700);
        assert_eq!(ExitStatus::Signaled(Signal::SIGTERM).wait_status(), 15);
        assert_eq!(ExitStatus::Crashed.wait_status() >> 8, 255);
        assert_eq!(ExitStatus::Crashed.code(), 255);
        assert_eq!(ExitStatus::Signaled(Signal::SIGKILL).code(), 137);
        assert_eq!(ExitStatus::Crashed.to_string(), "crashed");
    }

    #[test]
    fn name_is_basename_of_argv0() {
        assert_eq!(program_name(&["/bin/sh".to_string()]), "sh");
        assert_eq!(program_name(&["ls".to_string()]), "ls");
        assert_eq!(program_name(&[]), "?");
    }
}
