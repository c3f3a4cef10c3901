mod common;

use std::fs;
use std::path::PathBuf;
use std::process;

use common::*;
use kernel::ExitStatus;
use vm::asm::*;
use vm::registers::Register::*;

fn scratch_root(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("mipsrun-{}-{}", name, process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn created_file_lands_under_the_root() {
    let root = scratch_root("create");
    // fd = open("/out.txt", O_WRONLY | O_CREAT | O_TRUNC, 0644); write(fd, "data", 4)
    let words = program(&[
        &li32(A0, DATA),
        &[li(A1, 0x301), li(A2, 0o644)],
        &sys(SYS_OPEN),
        &[mov(S0, V0), mov(A0, V0)],
        &li32(A1, DATA + 16),
        &[li(A2, 4)],
        &sys(SYS_WRITE),
        &[mov(A0, S0)],
        &sys(SYS_CLOSE),
        &exit_with(S0),
    ]);
    let mut data = b"/out.txt\0".to_vec();
    data.resize(16, 0);
    data.extend_from_slice(b"data");

    let out = run_in(&Guest::new(&words, 0, &data), Some(root.clone()));
    assert_eq!(out.status, ExitStatus::Exited(3));
    assert_eq!(fs::read(root.join("out.txt")).unwrap(), b"data");
    fs::remove_dir_all(root).unwrap();
}

#[test]
fn missing_file_sets_error_flag() {
    let root = scratch_root("missing");
    let words = program(&[
        &li32(A0, DATA),
        &[li(A1, 0), li(A2, 0)],
        &sys(SYS_OPEN),
        &[li(T0, 100), mul(T0, T0, A3), addu(T0, T0, V0)],
        &exit_with(T0),
    ]);
    let out = run_in(&Guest::new(&words, 0, b"/nope\0"), Some(root.clone()));
    // a3 = 1, v0 = ENOENT
    assert_eq!(out.status, ExitStatus::Exited(102));
    fs::remove_dir_all(root).unwrap();
}

#[test]
fn dev_null_swallows_writes() {
    let words = program(&[
        &li32(A0, DATA),
        &[li(A1, 1), li(A2, 0)],
        &sys(SYS_OPEN),
        &[mov(A0, V0)],
        &li32(A1, DATA),
        &[li(A2, 5)],
        &sys(SYS_WRITE),
        &exit_with(V0),
    ]);
    let out = run(&Guest::new(&words, 0, b"/dev/null\0"));
    assert_eq!(out.status, ExitStatus::Exited(5));
    assert!(out.stdout.is_empty());
}

#[test]
fn execve_replaces_the_image() {
    let root = scratch_root("exec");
    let second = loader::ProgramImage::from_words(BASE, &program(&[&[li(A0, 42)], &sys(SYS_EXIT)]));
    fs::write(root.join("second"), loader::write_elf(&second)).unwrap();

    let first = program(&[
        &li32(A0, DATA),
        &[li(A1, 0), li(A2, 0), li(V0, 4011), SYSCALL, addiu(A0, V0, 100)],
        &sys(SYS_EXIT),
    ]);
    let out = run_in(&Guest::new(&first, 0, b"/second\0"), Some(root.clone()));
    assert_eq!(out.status, ExitStatus::Exited(42));

    // a missing program leaves the caller running with ENOENT
    let out = run_in(&Guest::new(&first, 0, b"/third\0"), Some(root.clone()));
    assert_eq!(out.status, ExitStatus::Exited(102));
    fs::remove_dir_all(root).unwrap();
}
