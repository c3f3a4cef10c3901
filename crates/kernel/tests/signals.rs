mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::*;
use kernel::{ExitStatus, Pid, Registry};
use types::Signal;
use vm::asm::*;
use vm::registers::Register::*;

/// Handler that records its signal number at DATA and scribbles over the
/// registers the tests check, followed by main.
fn with_handler(main: &[&[u32]]) -> Guest {
    let handler = program(&[
        &li32(T0, DATA),
        &[sw(A0, 0, T0)],
        &[li(S0, 0x40), li(S1, 0x40), li(S2, 0x40), li(S3, 0x40), li(T1, 0x40), li(T2, 0x40)],
        &[jr(Ra), NOP],
    ]);
    let entry = handler.len();
    let mut words = handler;
    words.extend(program(main));
    Guest::new(&words, entry, &[0, 0, 0, 0, 0, 0, 0x80, 0])
}

fn install(sig: Signal) -> Vec<u32> {
    program(&[&[li(A0, sig.number() as i32)], &li32(A1, BASE), &sys(SYS_SIGNAL)])
}

fn raise(sig: Signal) -> Vec<u32> {
    program(&[&sys(SYS_GETPID), &[mov(A0, V0), li(A1, sig.number() as i32)], &sys(SYS_KILL)])
}

#[test]
fn handler_runs_and_registers_survive() {
    // one bit per live register, plus the signal number the handler saw
    let guest = with_handler(&[
        &install(Signal::SIGUSR1),
        &[li(S0, 1), li(S1, 2), li(S2, 4), li(S3, 8), li(T1, 0x10), li(T2, 0x20)],
        &raise(Signal::SIGUSR1),
        &li32(T0, DATA),
        &[lw(T3, 0, T0), or(T0, S0, S1), or(T0, T0, S2), or(T0, T0, S3)],
        &[or(T0, T0, T1), or(T0, T0, T2), addu(T0, T0, T3)],
        &exit_with(T0),
    ]);
    let out = run(&guest);
    assert_eq!(out.status, ExitStatus::Exited(0x3f + 16));
}

#[test]
fn blocked_signal_waits_for_unblock() {
    // DATA+4 holds the set {SIGUSR1}
    let guest = with_handler(&[
        &install(Signal::SIGUSR1),
        &[li(A0, 1)],
        &li32(A1, DATA + 4),
        &[li(A2, 0)],
        &sys(SYS_SIGPROCMASK),
        &raise(Signal::SIGUSR1),
        &li32(T0, DATA),
        &[lw(S1, 0, T0), li(A0, 2)],
        &li32(A1, DATA + 4),
        &[li(A2, 0)],
        &sys(SYS_SIGPROCMASK),
        &li32(T0, DATA),
        &[lw(S2, 0, T0), addu(T0, S1, S2)],
        &exit_with(T0),
    ]);
    let out = run(&guest);
    assert_eq!(out.status, ExitStatus::Exited(16));
}

#[test]
fn default_action_terminates() {
    let guest = with_handler(&[&raise(Signal::SIGTERM), &[li(A0, 0)], &sys(SYS_EXIT)]);
    let out = run(&guest);
    assert_eq!(out.status, ExitStatus::Signaled(Signal::SIGTERM));
    assert_eq!(out.status.code(), 128 + 15);
}

#[test]
fn ignored_default_is_harmless() {
    let guest = with_handler(&[&raise(Signal::SIGCHLD), &[li(A0, 3)], &sys(SYS_EXIT)]);
    assert_eq!(run(&guest).status, ExitStatus::Exited(3));
}

/// A program that stops itself and exits with 5 once continued.
fn stopped_program() -> (Arc<Registry>, Pid) {
    let guest = Guest::new(
        &program(&[&raise(Signal::SIGSTOP), &[li(A0, 5)], &sys(SYS_EXIT)]),
        0,
        &[],
    );
    let registry = Registry::new(kernel::Config::default());
    let pid = kernel::spawn(&registry, &guest.image, &["stopper".to_string()], &[]).unwrap();
    for _ in 0..500 {
        if registry.signals(pid).is_some_and(|s| s.lock().is_stopped()) {
            return (registry, pid);
        }
        thread::sleep(Duration::from_millis(2));
    }
    panic!("pid {pid} never stopped");
}

#[test]
fn stop_then_continue() {
    let (registry, pid) = stopped_program();
    let signals = registry.signals(pid).unwrap();

    // already stopped: another stop changes nothing
    signals.raise(Signal::SIGTSTP, false);
    thread::sleep(Duration::from_millis(30));
    assert!(signals.lock().is_stopped());

    signals.raise(Signal::SIGCONT, false);
    assert_eq!(registry.wait_for(pid), Some(ExitStatus::Exited(5)));
}

#[test]
fn kill_ends_a_stopped_process() {
    let (registry, pid) = stopped_program();
    registry.signals(pid).unwrap().raise(Signal::SIGKILL, false);
    assert_eq!(registry.wait_for(pid), Some(ExitStatus::Signaled(Signal::SIGKILL)));
}
