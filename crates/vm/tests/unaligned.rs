mod test_syscall_handler;

use test_syscall_handler::{exit_tail, run, DATA};
use vm::asm::*;
use vm::registers::Register::*;
use vm::Trap;

fn with_exit(body: &[u32]) -> Vec<u32> {
    let mut words = body.to_vec();
    words.push(li(A0, 0));
    words.extend_from_slice(&exit_tail());
    words
}

#[test]
fn store_and_load_word_at_every_alignment() {
    for misalign in 0..4u32 {
        let addr = DATA + 8 + misalign;
        let [ah, al] = li32(A1, addr);
        let [vh, vl] = li32(T0, 0xdead_beef);
        let words = with_exit(&[
            ah,
            al,
            vh,
            vl,
            swl(T0, 0, A1),
            swr(T0, 3, A1),
            lwl(S0, 0, A1),
            lwr(S0, 3, A1),
        ]);
        let (trap, cpu, mem, _) = run(&words);
        assert_eq!(trap, Trap::Exit(0));
        assert_eq!(cpu.reg(S0), 0xdead_beef, "misalign {misalign}");
        assert_eq!(mem.load_bytes(addr, 4).unwrap(), [0xde, 0xad, 0xbe, 0xef]);
        // neighbours untouched
        if misalign > 0 {
            assert_eq!(mem.load_byte(addr - 1).unwrap(), 0);
        }
        assert_eq!(mem.load_byte(addr + 4).unwrap(), 0);
    }
}

#[test]
fn partial_loads_merge_with_register() {
    let [ah, al] = li32(A1, DATA);
    let [wh, wl] = li32(T0, 0x1122_3344);
    let [xh, xl] = li32(T1, 0x5566_7788);
    let [kh, kl] = li32(S0, 0xaaaa_aaaa);
    let words = with_exit(&[
        ah,
        al,
        wh,
        wl,
        xh,
        xl,
        sw(T0, 0, A1),
        sw(T1, 4, A1),
        kh,
        kl,
        mov(S1, S0),
        lwl(S0, 1, A1),
        lwr(S1, 1, A1),
    ]);
    let (_, cpu, ..) = run(&words);
    assert_eq!(cpu.reg(S0), 0x2233_44aa);
    assert_eq!(cpu.reg(S1), 0xaaaa_1122);
}

#[test]
fn partial_stores_touch_only_their_bytes() {
    let [ah, al] = li32(A1, DATA);
    let [vh, vl] = li32(T0, 0x1122_3344);
    let [fh, fl] = li32(T1, 0xffff_ffff);
    let words = with_exit(&[
        ah,
        al,
        vh,
        vl,
        fh,
        fl,
        sw(T1, 0, A1),
        sw(T1, 4, A1),
        swl(T0, 2, A1),
        swr(T0, 5, A1),
    ]);
    let (_, _, mem, _) = run(&words);
    assert_eq!(mem.load_word(DATA).unwrap(), 0xffff_1122);
    assert_eq!(mem.load_word(DATA + 4).unwrap(), 0x3344_ffff);
}
