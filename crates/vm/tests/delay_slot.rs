mod test_syscall_handler;

use test_syscall_handler::{exit_tail, machine, run, TestSyscallHandler, BASE};
use vm::asm::*;
use vm::registers::Register::*;
use vm::{Instrumentation, Trap};

fn with_exit(body: &[u32]) -> Vec<u32> {
    let mut words = body.to_vec();
    words.extend_from_slice(&exit_tail());
    words
}

#[test]
fn taken_branch_still_runs_delay_slot() {
    let words = with_exit(&[
        li(T0, 1),
        beq(Zero, Zero, 2),
        addiu(T0, T0, 10),  // delay slot
        addiu(T0, T0, 100), // skipped
        mov(A0, T0),
    ]);
    assert_eq!(run(&words).0, Trap::Exit(11));
}

#[test]
fn untaken_branch_falls_through() {
    let words = with_exit(&[
        li(T0, 1),
        bne(Zero, Zero, 2),
        addiu(T0, T0, 10),
        addiu(T0, T0, 100),
        mov(A0, T0),
    ]);
    assert_eq!(run(&words).0, Trap::Exit(111));
}

#[test]
fn backward_loop_counts() {
    let words = with_exit(&[
        li(T0, 0),
        li(T1, 5),
        addiu(T0, T0, 1),
        bne(T0, T1, -2),
        NOP,
        mov(A0, T0),
    ]);
    assert_eq!(run(&words).0, Trap::Exit(5));
}

#[test]
fn jal_links_past_the_delay_slot() {
    let words = [jal(BASE + 16), li(A0, 7), NOP, NOP, li(V0, 4001), SYSCALL];
    let (trap, cpu, ..) = run(&words);
    assert_eq!(trap, Trap::Exit(7));
    assert_eq!(cpu.reg(Ra), BASE + 8);
}

#[test]
fn jalr_call_and_return() {
    let [h, l] = li32(T9, BASE + 24);
    let words = [
        h,
        l,
        jalr(Ra, T9),
        NOP,
        li(V0, 4001),
        SYSCALL,
        // function
        li(A0, 9),
        jr(Ra),
        NOP,
    ];
    let (trap, cpu, ..) = run(&words);
    assert_eq!(trap, Trap::Exit(9));
    assert_eq!(cpu.reg(Ra), BASE + 16);
}

#[test]
fn branch_and_link_always_links() {
    let words = with_exit(&[li(T0, 1), bltzal(T0, 5), NOP, li(A0, 0)]);
    let (trap, cpu, ..) = run(&words);
    assert_eq!(trap, Trap::Exit(0));
    assert_eq!(cpu.reg(Ra), BASE + 12);
}

#[test]
fn instrumented_loop_matches_fast_loop() {
    let words = with_exit(&[
        li(T0, 0),
        li(T1, 5),
        li(S0, 3),
        addiu(T0, T0, 1),
        mult(T0, S0),
        mflo(S1),
        bne(T0, T1, -4),
        addu(S2, S2, S1),
        mov(A0, S2),
    ]);
    let (fast_trap, fast, fast_mem, _) = run(&words);

    let (mut cpu, mut memory) = machine(&words);
    let mut kernel = TestSyscallHandler::default();
    let opts = Instrumentation { disasm: true, regprint: true, funlog: true, interactive: false };
    let trap = cpu.run_instrumented(&mut memory, &mut kernel, &opts);

    assert_eq!(trap, fast_trap);
    assert_eq!(trap, Trap::Exit(45));
    assert_eq!(cpu.regs, fast.regs);
    assert_eq!((cpu.hi, cpu.lo, cpu.pc), (fast.hi, fast.lo, fast.pc));
    assert_eq!(memory.load_words(BASE, words.len()), fast_mem.load_words(BASE, words.len()));
}
