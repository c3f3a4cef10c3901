//! Field layout and opcode tables of the MIPS32 integer and FPU encodings.
//!
//! Every instruction is one big-endian word:
//! ```text
//! 31:26 op  25:21 rs  20:16 rt  15:11 rd  10:6 sa  5:0 fn
//! ```
//! I-type forms replace rd/sa/fn with a 16-bit immediate, J-type forms
//! replace everything below op with a 26-bit word index.

#[inline]
pub const fn op(word: u32) -> u32 {
    word >> 26
}

#[inline]
pub const fn rs(word: u32) -> usize {
    ((word >> 21) & 0x1f) as usize
}

#[inline]
pub const fn rt(word: u32) -> usize {
    ((word >> 16) & 0x1f) as usize
}

#[inline]
pub const fn rd(word: u32) -> usize {
    ((word >> 11) & 0x1f) as usize
}

#[inline]
pub const fn sa(word: u32) -> u32 {
    (word >> 6) & 0x1f
}

#[inline]
pub const fn funct(word: u32) -> u32 {
    word & 0x3f
}

/// Sign-extended 16-bit immediate.
#[inline]
pub const fn simm(word: u32) -> i32 {
    word as u16 as i16 as i32
}

/// Zero-extended 16-bit immediate.
#[inline]
pub const fn uimm(word: u32) -> u32 {
    word & 0xffff
}

/// Primary opcode, bits 31:26.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    /// Register-register forms, dispatched on the function field.
    Special,
    /// Zero-compare branches, dispatched on the rt field.
    RegImm,
    J,
    Jal,
    Beq,
    Bne,
    Blez,
    Bgtz,
    Addi,
    Addiu,
    Slti,
    Sltiu,
    Andi,
    Ori,
    Xori,
    Lui,
    /// Floating-point coprocessor, dispatched on the rs (format) field.
    Cop1,
    /// MIPS32 additions such as the three-operand MUL.
    Special2,
    Lb,
    Lh,
    Lwl,
    Lw,
    Lbu,
    Lhu,
    Lwr,
    Sb,
    Sh,
    Swl,
    Sw,
    Swr,
    Lwc1,
    Swc1,
}

impl Opcode {
    pub fn from_u32(value: u32) -> Option<Self> {
        use Opcode::*;
        Some(match value {
            0x00 => Special,
            0x01 => RegImm,
            0x02 => J,
            0x03 => Jal,
            0x04 => Beq,
            0x05 => Bne,
            0x06 => Blez,
            0x07 => Bgtz,
            0x08 => Addi,
            0x09 => Addiu,
            0x0a => Slti,
            0x0b => Sltiu,
            0x0c => Andi,
            0x0d => Ori,
            0x0e => Xori,
            0x0f => Lui,
            0x11 => Cop1,
            0x1c => Special2,
            0x20 => Lb,
            0x21 => Lh,
            0x22 => Lwl,
            0x23 => Lw,
            0x24 => Lbu,
            0x25 => Lhu,
            0x26 => Lwr,
            0x28 => Sb,
            0x29 => Sh,
            0x2a => Swl,
            0x2b => Sw,
            0x2e => Swr,
            0x31 => Lwc1,
            0x39 => Swc1,
            _ => return None,
        })
    }
}

// SPECIAL function field
pub const FN_SLL: u32 = 0x00;
pub const FN_SRL: u32 = 0x02;
pub const FN_SRA: u32 = 0x03;
pub const FN_SLLV: u32 = 0x04;
pub const FN_SRLV: u32 = 0x06;
pub const FN_SRAV: u32 = 0x07;
pub const FN_JR: u32 = 0x08;
pub const FN_JALR: u32 = 0x09;
pub const FN_MOVZ: u32 = 0x0a;
pub const FN_MOVN: u32 = 0x0b;
pub const FN_SYSCALL: u32 = 0x0c;
pub const FN_BREAK: u32 = 0x0d;
pub const FN_SYNC: u32 = 0x0f;
pub const FN_MFHI: u32 = 0x10;
pub const FN_MTHI: u32 = 0x11;
pub const FN_MFLO: u32 = 0x12;
pub const FN_MTLO: u32 = 0x13;
pub const FN_MULT: u32 = 0x18;
pub const FN_MULTU: u32 = 0x19;
pub const FN_DIV: u32 = 0x1a;
pub const FN_DIVU: u32 = 0x1b;
pub const FN_ADD: u32 = 0x20;
pub const FN_ADDU: u32 = 0x21;
pub const FN_SUB: u32 = 0x22;
pub const FN_SUBU: u32 = 0x23;
pub const FN_AND: u32 = 0x24;
pub const FN_OR: u32 = 0x25;
pub const FN_XOR: u32 = 0x26;
pub const FN_NOR: u32 = 0x27;
pub const FN_SLT: u32 = 0x2a;
pub const FN_SLTU: u32 = 0x2b;
pub const FN_TEQ: u32 = 0x34;
pub const FN_TNE: u32 = 0x36;

// SPECIAL2 function field
pub const FN2_MUL: u32 = 0x02;

// REGIMM rt field
pub const RT_BLTZ: usize = 0x00;
pub const RT_BGEZ: usize = 0x01;
pub const RT_BLTZAL: usize = 0x10;
pub const RT_BGEZAL: usize = 0x11;

// COP1 rs field
pub const RS_MF: usize = 0x00;
pub const RS_CF: usize = 0x02;
pub const RS_MT: usize = 0x04;
pub const RS_CT: usize = 0x06;
pub const RS_BC: usize = 0x08;
pub const RS_FMT_SINGLE: usize = 0x10;
pub const RS_FMT_DOUBLE: usize = 0x11;
pub const RS_FMT_WORD: usize = 0x14;

// COP1 function field
pub const CFN_ADD: u32 = 0x00;
pub const CFN_SUB: u32 = 0x01;
pub const CFN_MUL: u32 = 0x02;
pub const CFN_DIV: u32 = 0x03;
pub const CFN_ABS: u32 = 0x05;
pub const CFN_MOV: u32 = 0x06;
pub const CFN_NEG: u32 = 0x07;
/// Function codes at or above this are conversions and compares.
pub const CFN_CVT: u32 = 0x20;
pub const CFN_CVT_S: u32 = 0x20;
pub const CFN_CVT_D: u32 = 0x21;
pub const CFN_CVT_W: u32 = 0x24;
pub const CFN_C_EQ: u32 = 0x32;
pub const CFN_C_ULT: u32 = 0x35;
pub const CFN_C_LT: u32 = 0x3c;
pub const CFN_C_LE: u32 = 0x3e;

/// FPU control register that holds the rounding mode; the only one
/// implemented.
pub const FCSR: usize = 31;
