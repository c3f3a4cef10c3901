//! Guest programs assembled in place and run through a fresh registry.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use kernel::{run_program, Config, ExitStatus, Registry, SharedBuffer, Stdio};
use loader::{ProgramImage, Segment};
use vm::asm::*;
use vm::registers::Register::{self, *};

pub const BASE: u32 = 0x0040_0000;
pub const DATA: u32 = 0x0041_0000;

pub const SYS_EXIT: i32 = 4001;
pub const SYS_FORK: i32 = 4002;
pub const SYS_READ: i32 = 4003;
pub const SYS_WRITE: i32 = 4004;
pub const SYS_OPEN: i32 = 4005;
pub const SYS_CLOSE: i32 = 4006;
pub const SYS_WAITPID: i32 = 4007;
pub const SYS_GETPID: i32 = 4020;
pub const SYS_KILL: i32 = 4037;
pub const SYS_PIPE: i32 = 4042;
pub const SYS_SIGNAL: i32 = 4056;
pub const SYS_GETPPID: i32 = 4064;
pub const SYS_SIGPROCMASK: i32 = 4126;

/// `v0 = nr; syscall`
pub fn sys(nr: i32) -> [u32; 2] {
    [li(V0, nr), SYSCALL]
}

pub fn exit_with(reg: Register) -> [u32; 3] {
    [mov(A0, reg), li(V0, SYS_EXIT), SYSCALL]
}

pub struct Guest {
    pub image: ProgramImage,
}

impl Guest {
    /// Text at BASE entered at `entry` words in, `data` at DATA with a
    /// zeroed tail.
    pub fn new(words: &[u32], entry: usize, data: &[u8]) -> Self {
        let mut image = ProgramImage::from_words(BASE, words);
        image.entry = BASE + 4 * entry as u32;
        image.segments.push(Segment::with_bss(DATA, data.to_vec(), 0x100));
        Self { image }
    }
}

pub struct Outcome {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub registry: Arc<Registry>,
}

pub fn run_in(guest: &Guest, root: Option<PathBuf>) -> Outcome {
    let output = SharedBuffer::new();
    let config = Config {
        root: root.unwrap_or_else(|| PathBuf::from("/")),
        stdio: Stdio::Capture {
            input: SharedBuffer::new(),
            output: output.clone(),
            error: SharedBuffer::new(),
        },
        ..Config::default()
    };
    let registry = Registry::new(config);
    let status = run_program(&registry, &guest.image, &["test".to_string()], &[]).unwrap();
    Outcome {
        status,
        stdout: output.contents(),
        registry,
    }
}

pub fn run(guest: &Guest) -> Outcome {
    run_in(guest, None)
}

/// Flatten instruction groups into one program.
pub fn program(parts: &[&[u32]]) -> Vec<u32> {
    parts.concat()
}
