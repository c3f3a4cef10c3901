//! Instruction encoders, so tests can write guest programs without a
//! cross toolchain.
//!
//! Branch offsets are in instructions relative to the delay slot, exactly
//! as the hardware encodes them.

use crate::isa::*;
use crate::registers::Register;

fn r_type(rs: Register, rt: Register, rd: Register, sa: u32, funct: u32) -> u32 {
    ((rs as u32) << 21) | ((rt as u32) << 16) | ((rd as u32) << 11) | ((sa & 31) << 6) | funct
}

fn i_type(op: u32, rs: Register, rt: Register, imm: i32) -> u32 {
    (op << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | (imm as u32 & 0xffff)
}

fn regimm(rs: Register, rt: usize, offset: i32) -> u32 {
    (0x01 << 26) | ((rs as u32) << 21) | ((rt as u32) << 16) | (offset as u32 & 0xffff)
}

fn cop1(rs: usize, rt: u32, fs: u32, fd: u32, funct: u32) -> u32 {
    (0x11 << 26) | ((rs as u32) << 21) | ((rt & 31) << 16) | ((fs & 31) << 11) | ((fd & 31) << 6) | funct
}

use Register::Zero;

pub const NOP: u32 = 0;
pub const SYSCALL: u32 = FN_SYSCALL;

pub fn sll(rd: Register, rt: Register, sa: u32) -> u32 { r_type(Zero, rt, rd, sa, FN_SLL) }
pub fn srl(rd: Register, rt: Register, sa: u32) -> u32 { r_type(Zero, rt, rd, sa, FN_SRL) }
pub fn sra(rd: Register, rt: Register, sa: u32) -> u32 { r_type(Zero, rt, rd, sa, FN_SRA) }
pub fn sllv(rd: Register, rt: Register, rs: Register) -> u32 { r_type(rs, rt, rd, 0, FN_SLLV) }
pub fn jr(rs: Register) -> u32 { r_type(rs, Zero, Zero, 0, FN_JR) }
pub fn jalr(rd: Register, rs: Register) -> u32 { r_type(rs, Zero, rd, 0, FN_JALR) }
pub fn movz(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_MOVZ) }
pub fn movn(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_MOVN) }
pub fn brk(code: u32) -> u32 { ((code & 0xf_ffff) << 6) | FN_BREAK }
pub fn teq(rs: Register, rt: Register, code: u32) -> u32 { r_type(rs, rt, Zero, 0, FN_TEQ) | ((code & 0x3ff) << 6) }
pub fn tne(rs: Register, rt: Register, code: u32) -> u32 { r_type(rs, rt, Zero, 0, FN_TNE) | ((code & 0x3ff) << 6) }
pub fn mfhi(rd: Register) -> u32 { r_type(Zero, Zero, rd, 0, FN_MFHI) }
pub fn mflo(rd: Register) -> u32 { r_type(Zero, Zero, rd, 0, FN_MFLO) }
pub fn mthi(rs: Register) -> u32 { r_type(rs, Zero, Zero, 0, FN_MTHI) }
pub fn mtlo(rs: Register) -> u32 { r_type(rs, Zero, Zero, 0, FN_MTLO) }
pub fn mult(rs: Register, rt: Register) -> u32 { r_type(rs, rt, Zero, 0, FN_MULT) }
pub fn multu(rs: Register, rt: Register) -> u32 { r_type(rs, rt, Zero, 0, FN_MULTU) }
pub fn div(rs: Register, rt: Register) -> u32 { r_type(rs, rt, Zero, 0, FN_DIV) }
pub fn divu(rs: Register, rt: Register) -> u32 { r_type(rs, rt, Zero, 0, FN_DIVU) }
pub fn mul(rd: Register, rs: Register, rt: Register) -> u32 {
    (0x1c << 26) | r_type(rs, rt, rd, 0, FN2_MUL)
}
pub fn add(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_ADD) }
pub fn addu(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_ADDU) }
pub fn sub(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_SUB) }
pub fn subu(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_SUBU) }
pub fn and(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_AND) }
pub fn or(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_OR) }
pub fn xor(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_XOR) }
pub fn nor(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_NOR) }
pub fn slt(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_SLT) }
pub fn sltu(rd: Register, rs: Register, rt: Register) -> u32 { r_type(rs, rt, rd, 0, FN_SLTU) }
/// `move rd, rs`
pub fn mov(rd: Register, rs: Register) -> u32 { addu(rd, rs, Zero) }

pub fn bltz(rs: Register, offset: i32) -> u32 { regimm(rs, RT_BLTZ, offset) }
pub fn bgez(rs: Register, offset: i32) -> u32 { regimm(rs, RT_BGEZ, offset) }
pub fn bltzal(rs: Register, offset: i32) -> u32 { regimm(rs, RT_BLTZAL, offset) }
pub fn bgezal(rs: Register, offset: i32) -> u32 { regimm(rs, RT_BGEZAL, offset) }
/// Jump to an absolute address in the current 256 MiB region.
pub fn j(addr: u32) -> u32 { (0x02 << 26) | ((addr >> 2) & 0x03ff_ffff) }
pub fn jal(addr: u32) -> u32 { (0x03 << 26) | ((addr >> 2) & 0x03ff_ffff) }
pub fn beq(rs: Register, rt: Register, offset: i32) -> u32 { i_type(0x04, rs, rt, offset) }
pub fn bne(rs: Register, rt: Register, offset: i32) -> u32 { i_type(0x05, rs, rt, offset) }
pub fn blez(rs: Register, offset: i32) -> u32 { i_type(0x06, rs, Zero, offset) }
pub fn bgtz(rs: Register, offset: i32) -> u32 { i_type(0x07, rs, Zero, offset) }
/// Unconditional pc-relative branch.
pub fn b(offset: i32) -> u32 { beq(Zero, Zero, offset) }

pub fn addi(rt: Register, rs: Register, imm: i32) -> u32 { i_type(0x08, rs, rt, imm) }
pub fn addiu(rt: Register, rs: Register, imm: i32) -> u32 { i_type(0x09, rs, rt, imm) }
pub fn slti(rt: Register, rs: Register, imm: i32) -> u32 { i_type(0x0a, rs, rt, imm) }
pub fn sltiu(rt: Register, rs: Register, imm: i32) -> u32 { i_type(0x0b, rs, rt, imm) }
pub fn andi(rt: Register, rs: Register, imm: u32) -> u32 { i_type(0x0c, rs, rt, imm as i32) }
pub fn ori(rt: Register, rs: Register, imm: u32) -> u32 { i_type(0x0d, rs, rt, imm as i32) }
pub fn xori(rt: Register, rs: Register, imm: u32) -> u32 { i_type(0x0e, rs, rt, imm as i32) }
pub fn lui(rt: Register, imm: u32) -> u32 { i_type(0x0f, Zero, rt, imm as i32) }
/// `li` for a 16-bit signed value.
pub fn li(rt: Register, imm: i32) -> u32 { addiu(rt, Zero, imm) }
/// Two-word load of any 32-bit constant.
pub fn li32(rt: Register, value: u32) -> [u32; 2] {
    [lui(rt, value >> 16), ori(rt, rt, value & 0xffff)]
}

pub fn lb(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x20, base, rt, offset) }
pub fn lh(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x21, base, rt, offset) }
pub fn lwl(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x22, base, rt, offset) }
pub fn lw(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x23, base, rt, offset) }
pub fn lbu(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x24, base, rt, offset) }
pub fn lhu(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x25, base, rt, offset) }
pub fn lwr(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x26, base, rt, offset) }
pub fn sb(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x28, base, rt, offset) }
pub fn sh(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x29, base, rt, offset) }
pub fn swl(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x2a, base, rt, offset) }
pub fn sw(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x2b, base, rt, offset) }
pub fn swr(rt: Register, offset: i32, base: Register) -> u32 { i_type(0x2e, base, rt, offset) }

pub fn lwc1(ft: u32, offset: i32, base: Register) -> u32 {
    (0x31 << 26) | ((base as u32) << 21) | ((ft & 31) << 16) | (offset as u32 & 0xffff)
}
pub fn swc1(ft: u32, offset: i32, base: Register) -> u32 {
    (0x39 << 26) | ((base as u32) << 21) | ((ft & 31) << 16) | (offset as u32 & 0xffff)
}
pub fn mfc1(rt: Register, fs: u32) -> u32 { cop1(RS_MF, rt as u32, fs, 0, 0) }
pub fn mtc1(rt: Register, fs: u32) -> u32 { cop1(RS_MT, rt as u32, fs, 0, 0) }
pub fn cfc1(rt: Register, fs: u32) -> u32 { cop1(RS_CF, rt as u32, fs, 0, 0) }
pub fn ctc1(rt: Register, fs: u32) -> u32 { cop1(RS_CT, rt as u32, fs, 0, 0) }
pub fn bc1t(offset: i32) -> u32 { cop1(RS_BC, 1, 0, 0, 0) | (offset as u32 & 0xffff) }
pub fn bc1f(offset: i32) -> u32 { cop1(RS_BC, 0, 0, 0, 0) | (offset as u32 & 0xffff) }

/// Double-precision forms; `fd, fs, ft` as in the assembler syntax.
pub fn add_d(fd: u32, fs: u32, ft: u32) -> u32 { cop1(RS_FMT_DOUBLE, ft, fs, fd, CFN_ADD) }
pub fn sub_d(fd: u32, fs: u32, ft: u32) -> u32 { cop1(RS_FMT_DOUBLE, ft, fs, fd, CFN_SUB) }
pub fn mul_d(fd: u32, fs: u32, ft: u32) -> u32 { cop1(RS_FMT_DOUBLE, ft, fs, fd, CFN_MUL) }
pub fn div_d(fd: u32, fs: u32, ft: u32) -> u32 { cop1(RS_FMT_DOUBLE, ft, fs, fd, CFN_DIV) }
pub fn mov_d(fd: u32, fs: u32) -> u32 { cop1(RS_FMT_DOUBLE, 0, fs, fd, CFN_MOV) }
pub fn c_lt_d(fs: u32, ft: u32) -> u32 { cop1(RS_FMT_DOUBLE, ft, fs, 0, CFN_C_LT) }
pub fn c_eq_d(fs: u32, ft: u32) -> u32 { cop1(RS_FMT_DOUBLE, ft, fs, 0, CFN_C_EQ) }
pub fn cvt_d_w(fd: u32, fs: u32) -> u32 { cop1(RS_FMT_WORD, 0, fs, fd, CFN_CVT_D) }
pub fn cvt_w_d(fd: u32, fs: u32) -> u32 { cop1(RS_FMT_DOUBLE, 0, fs, fd, CFN_CVT_W) }
pub fn add_s(fd: u32, fs: u32, ft: u32) -> u32 { cop1(RS_FMT_SINGLE, ft, fs, fd, CFN_ADD) }

/// Big-endian image of a word list, ready to copy into guest memory.
pub fn to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}
