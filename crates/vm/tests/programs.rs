mod test_syscall_handler;

use once_cell::sync::Lazy;
use test_syscall_handler::{run, BASE, DATA};
use vm::asm::*;
use vm::registers::Register::*;
use vm::Trap;

#[derive(Debug)]
pub struct TestCase<'a> {
    pub name: &'a str,
    pub words: Vec<u32>,
    pub expected_exit: u8,
    pub expected_output: &'a [u8],
}

fn exit_with(reg: vm::registers::Register) -> [u32; 3] {
    [mov(A0, reg), li(V0, 4001), SYSCALL]
}

pub static TEST_CASES: Lazy<Vec<TestCase<'static>>> = Lazy::new(|| {
    let [dh, dl] = li32(A1, DATA);
    vec![
        TestCase {
            name: "recursive factorial",
            words: vec![
                li(A0, 5),
                jal(BASE + 24),
                NOP,
                mov(A0, V0),
                li(V0, 4001),
                SYSCALL,
                // fact
                addiu(Sp, Sp, -8),
                sw(Ra, 4, Sp),
                sw(A0, 0, Sp),
                li(V0, 1),
                blez(A0, 6),
                NOP,
                addiu(A0, A0, -1),
                jal(BASE + 24),
                NOP,
                lw(A0, 0, Sp),
                mul(V0, V0, A0),
                lw(Ra, 4, Sp),
                jr(Ra),
                addiu(Sp, Sp, 8),
            ],
            expected_exit: 120,
            expected_output: b"",
        },
        TestCase {
            name: "sum one to ten",
            words: [
                &[li(T0, 0), li(T1, 10), addu(T0, T0, T1), addiu(T1, T1, -1), bgtz(T1, -3), NOP][..],
                &exit_with(T0),
            ]
            .concat(),
            expected_exit: 55,
            expected_output: b"",
        },
        TestCase {
            name: "byte copy loop then write",
            words: [
                &[
                    dh,
                    dl,
                    lui(T0, 0x6f6b), // "ok"
                    ori(T0, T0, 0x0a00),
                    sw(T0, 0, A1),
                    li(T1, 0),
                    li(T2, 3),
                    // copy DATA[i] to DATA+16+i
                    addu(T3, A1, T1),
                    lbu(T4, 0, T3),
                    sb(T4, 16, T3),
                    addiu(T1, T1, 1),
                    bne(T1, T2, -5),
                    NOP,
                    addiu(A1, A1, 16),
                    li(A0, 1),
                    li(A2, 3),
                    li(V0, 4004),
                    SYSCALL,
                ][..],
                &exit_with(A3),
            ]
            .concat(),
            expected_exit: 0,
            expected_output: b"ok\n",
        },
    ]
});

#[test]
fn run_programs() {
    for case in TEST_CASES.iter() {
        let (trap, _, _, kernel) = run(&case.words);
        assert_eq!(trap, Trap::Exit(case.expected_exit), "{}", case.name);
        assert_eq!(kernel.output, case.expected_output, "{}", case.name);
    }
}
