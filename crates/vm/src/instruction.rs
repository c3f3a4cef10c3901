use std::fmt;

use crate::registers::reg_name;

/// Operand width of a coprocessor instruction, taken from its rs field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fmt {
    Single,
    Double,
    Word,
}

impl Fmt {
    fn suffix(self) -> &'static str {
        match self {
            Fmt::Single => "s",
            Fmt::Double => "d",
            Fmt::Word => "w",
        }
    }
}

/// Floating-point operation selected by the function field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpOp {
    Add,
    Sub,
    Mul,
    Div,
    Abs,
    Mov,
    Neg,
    CvtS,
    CvtD,
    CvtW,
    /// Compare equal.
    CEq,
    /// Compare unordered or less than.
    CUlt,
    CLt,
    CLe,
}

impl FpOp {
    /// Arithmetic ops produce a value in the operand format; the rest
    /// convert or set the condition flag.
    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            FpOp::Add | FpOp::Sub | FpOp::Mul | FpOp::Div | FpOp::Abs | FpOp::Mov | FpOp::Neg
        )
    }

    fn mnemonic(self) -> &'static str {
        match self {
            FpOp::Add => "add",
            FpOp::Sub => "sub",
            FpOp::Mul => "mul",
            FpOp::Div => "div",
            FpOp::Abs => "abs",
            FpOp::Mov => "mov",
            FpOp::Neg => "neg",
            FpOp::CvtS => "cvt.s",
            FpOp::CvtD => "cvt.d",
            FpOp::CvtW => "cvt.w",
            FpOp::CEq => "c.eq",
            FpOp::CUlt => "c.ult",
            FpOp::CLt => "c.lt",
            FpOp::CLe => "c.le",
        }
    }
}

/// A decoded MIPS32 instruction.
///
/// Register fields are indices into the integer file unless named `f*`,
/// which index the coprocessor file. Branch offsets are the raw signed
/// immediates in words; jump targets are the raw 26-bit word index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    // --- shifts ---
    Sll { rd: usize, rt: usize, sa: u32 },
    Srl { rd: usize, rt: usize, sa: u32 },
    Sra { rd: usize, rt: usize, sa: u32 },
    Sllv { rd: usize, rt: usize, rs: usize },
    Srlv { rd: usize, rt: usize, rs: usize },
    Srav { rd: usize, rt: usize, rs: usize },

    // --- register jumps ---
    /// Jump to rs after the delay slot.
    Jr { rs: usize },
    /// Jump to rs after the delay slot, linking the return address in rd.
    Jalr { rd: usize, rs: usize },

    // --- conditional moves ---
    Movz { rd: usize, rs: usize, rt: usize },
    Movn { rd: usize, rs: usize, rt: usize },

    // --- traps ---
    Syscall,
    Break { code: u32 },
    Sync,
    /// Conditional traps; gcc emits `teq divisor, zero, 7` after a divide.
    Teq { rs: usize, rt: usize, code: u32 },
    Tne { rs: usize, rt: usize, code: u32 },

    // --- hi/lo ---
    Mfhi { rd: usize },
    Mthi { rs: usize },
    Mflo { rd: usize },
    Mtlo { rs: usize },
    Mult { rs: usize, rt: usize },
    Multu { rs: usize, rt: usize },
    Div { rs: usize, rt: usize },
    Divu { rs: usize, rt: usize },
    /// Three-operand multiply keeping the low word; hi/lo are left alone.
    Mul { rd: usize, rs: usize, rt: usize },

    // --- register ALU ---
    /// Add, trapping on signed overflow.
    Add { rd: usize, rs: usize, rt: usize },
    Addu { rd: usize, rs: usize, rt: usize },
    /// Subtract, trapping on signed overflow.
    Sub { rd: usize, rs: usize, rt: usize },
    Subu { rd: usize, rs: usize, rt: usize },
    And { rd: usize, rs: usize, rt: usize },
    Or { rd: usize, rs: usize, rt: usize },
    Xor { rd: usize, rs: usize, rt: usize },
    Nor { rd: usize, rs: usize, rt: usize },
    Slt { rd: usize, rs: usize, rt: usize },
    Sltu { rd: usize, rs: usize, rt: usize },

    // --- branches and jumps ---
    Bltz { rs: usize, offset: i32 },
    Bgez { rs: usize, offset: i32 },
    /// Branch if negative; ra is linked whether or not it is taken.
    Bltzal { rs: usize, offset: i32 },
    Bgezal { rs: usize, offset: i32 },
    J { target: u32 },
    Jal { target: u32 },
    Beq { rs: usize, rt: usize, offset: i32 },
    Bne { rs: usize, rt: usize, offset: i32 },
    Blez { rs: usize, offset: i32 },
    Bgtz { rs: usize, offset: i32 },

    // --- immediate ALU ---
    Addi { rt: usize, rs: usize, imm: i32 },
    Addiu { rt: usize, rs: usize, imm: i32 },
    Slti { rt: usize, rs: usize, imm: i32 },
    Sltiu { rt: usize, rs: usize, imm: i32 },
    Andi { rt: usize, rs: usize, imm: u32 },
    Ori { rt: usize, rs: usize, imm: u32 },
    Xori { rt: usize, rs: usize, imm: u32 },
    Lui { rt: usize, imm: u32 },

    // --- loads and stores ---
    Lb { rt: usize, base: usize, offset: i32 },
    Lh { rt: usize, base: usize, offset: i32 },
    /// Load word left: merge the high-order bytes of an unaligned word.
    Lwl { rt: usize, base: usize, offset: i32 },
    Lw { rt: usize, base: usize, offset: i32 },
    Lbu { rt: usize, base: usize, offset: i32 },
    Lhu { rt: usize, base: usize, offset: i32 },
    /// Load word right: merge the low-order bytes of an unaligned word.
    Lwr { rt: usize, base: usize, offset: i32 },
    Sb { rt: usize, base: usize, offset: i32 },
    Sh { rt: usize, base: usize, offset: i32 },
    Swl { rt: usize, base: usize, offset: i32 },
    Sw { rt: usize, base: usize, offset: i32 },
    Swr { rt: usize, base: usize, offset: i32 },
    Lwc1 { ft: usize, base: usize, offset: i32 },
    Swc1 { ft: usize, base: usize, offset: i32 },

    // --- coprocessor 1 ---
    Mfc1 { rt: usize, fs: usize },
    Mtc1 { rt: usize, fs: usize },
    Cfc1 { rt: usize, fs: usize },
    Ctc1 { rt: usize, fs: usize },
    /// Branch when the condition flag equals `on_true`.
    Bc1 { on_true: bool, offset: i32 },
    Fpu { fmt: Fmt, op: FpOp, fd: usize, fs: usize, ft: usize },
}

impl Instruction {
    /// True for every form whose successor sits in a delay slot.
    pub fn is_branch(&self) -> bool {
        use Instruction::*;
        matches!(
            self,
            Jr { .. }
                | Jalr { .. }
                | Bltz { .. }
                | Bgez { .. }
                | Bltzal { .. }
                | Bgezal { .. }
                | J { .. }
                | Jal { .. }
                | Beq { .. }
                | Bne { .. }
                | Blez { .. }
                | Bgtz { .. }
                | Bc1 { .. }
        )
    }

    /// Absolute destination of a pc-relative branch or region jump placed
    /// at `pc`.
    pub fn branch_target(&self, pc: u32) -> Option<u32> {
        use Instruction::*;
        let slot = pc.wrapping_add(4);
        match *self {
            Bltz { offset, .. }
            | Bgez { offset, .. }
            | Bltzal { offset, .. }
            | Bgezal { offset, .. }
            | Beq { offset, .. }
            | Bne { offset, .. }
            | Blez { offset, .. }
            | Bgtz { offset, .. }
            | Bc1 { offset, .. } => Some(slot.wrapping_add((offset << 2) as u32)),
            J { target } | Jal { target } => Some((slot & 0xf000_0000) | (target << 2)),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;
        let r = reg_name;
        match *self {
            Sll { rd: 0, rt: 0, sa: 0 } => write!(f, "nop"),
            Sll { rd, rt, sa } => write!(f, "sll    {}, {}, {}", r(rd), r(rt), sa),
            Srl { rd, rt, sa } => write!(f, "srl    {}, {}, {}", r(rd), r(rt), sa),
            Sra { rd, rt, sa } => write!(f, "sra    {}, {}, {}", r(rd), r(rt), sa),
            Sllv { rd, rt, rs } => write!(f, "sllv   {}, {}, {}", r(rd), r(rt), r(rs)),
            Srlv { rd, rt, rs } => write!(f, "srlv   {}, {}, {}", r(rd), r(rt), r(rs)),
            Srav { rd, rt, rs } => write!(f, "srav   {}, {}, {}", r(rd), r(rt), r(rs)),
            Jr { rs } => write!(f, "jr     {}", r(rs)),
            Jalr { rd, rs } => write!(f, "jalr   {}, {}", r(rd), r(rs)),
            Movz { rd, rs, rt } => write!(f, "movz   {}, {}, {}", r(rd), r(rs), r(rt)),
            Movn { rd, rs, rt } => write!(f, "movn   {}, {}, {}", r(rd), r(rs), r(rt)),
            Syscall => write!(f, "syscall"),
            Break { code } => write!(f, "break  {}", code),
            Sync => write!(f, "sync"),
            Teq { rs, rt, code } => write!(f, "teq    {}, {}, {}", r(rs), r(rt), code),
            Tne { rs, rt, code } => write!(f, "tne    {}, {}, {}", r(rs), r(rt), code),
            Mfhi { rd } => write!(f, "mfhi   {}", r(rd)),
            Mthi { rs } => write!(f, "mthi   {}", r(rs)),
            Mflo { rd } => write!(f, "mflo   {}", r(rd)),
            Mtlo { rs } => write!(f, "mtlo   {}", r(rs)),
            Mult { rs, rt } => write!(f, "mult   {}, {}", r(rs), r(rt)),
            Multu { rs, rt } => write!(f, "multu  {}, {}", r(rs), r(rt)),
            Div { rs, rt } => write!(f, "div    {}, {}", r(rs), r(rt)),
            Divu { rs, rt } => write!(f, "divu   {}, {}", r(rs), r(rt)),
            Mul { rd, rs, rt } => write!(f, "mul    {}, {}, {}", r(rd), r(rs), r(rt)),
            Add { rd, rs, rt } => write!(f, "add    {}, {}, {}", r(rd), r(rs), r(rt)),
            Addu { rd, rs, rt: 0 } => write!(f, "move   {}, {}", r(rd), r(rs)),
            Addu { rd, rs, rt } => write!(f, "addu   {}, {}, {}", r(rd), r(rs), r(rt)),
            Sub { rd, rs, rt } => write!(f, "sub    {}, {}, {}", r(rd), r(rs), r(rt)),
            Subu { rd, rs, rt } => write!(f, "subu   {}, {}, {}", r(rd), r(rs), r(rt)),
            And { rd, rs, rt } => write!(f, "and    {}, {}, {}", r(rd), r(rs), r(rt)),
            Or { rd, rs, rt } => write!(f, "or     {}, {}, {}", r(rd), r(rs), r(rt)),
            Xor { rd, rs, rt } => write!(f, "xor    {}, {}, {}", r(rd), r(rs), r(rt)),
            Nor { rd, rs, rt } => write!(f, "nor    {}, {}, {}", r(rd), r(rs), r(rt)),
            Slt { rd, rs, rt } => write!(f, "slt    {}, {}, {}", r(rd), r(rs), r(rt)),
            Sltu { rd, rs, rt } => write!(f, "sltu   {}, {}, {}", r(rd), r(rs), r(rt)),
            Bltz { rs, offset } => write!(f, "bltz   {}, {}", r(rs), offset),
            Bgez { rs, offset } => write!(f, "bgez   {}, {}", r(rs), offset),
            Bltzal { rs, offset } => write!(f, "bltzal {}, {}", r(rs), offset),
            Bgezal { rs, offset } => write!(f, "bgezal {}, {}", r(rs), offset),
            J { target } => write!(f, "j      0x{:07x}", target << 2),
            Jal { target } => write!(f, "jal    0x{:07x}", target << 2),
            Beq { rs: 0, rt: 0, offset } => write!(f, "b      {}", offset),
            Beq { rs, rt, offset } => write!(f, "beq    {}, {}, {}", r(rs), r(rt), offset),
            Bne { rs, rt, offset } => write!(f, "bne    {}, {}, {}", r(rs), r(rt), offset),
            Blez { rs, offset } => write!(f, "blez   {}, {}", r(rs), offset),
            Bgtz { rs, offset } => write!(f, "bgtz   {}, {}", r(rs), offset),
            Addi { rt, rs, imm } => write!(f, "addi   {}, {}, {}", r(rt), r(rs), imm),
            Addiu { rt, rs: 0, imm } => write!(f, "li     {}, {}", r(rt), imm),
            Addiu { rt, rs, imm } => write!(f, "addiu  {}, {}, {}", r(rt), r(rs), imm),
            Slti { rt, rs, imm } => write!(f, "slti   {}, {}, {}", r(rt), r(rs), imm),
            Sltiu { rt, rs, imm } => write!(f, "sltiu  {}, {}, {}", r(rt), r(rs), imm),
            Andi { rt, rs, imm } => write!(f, "andi   {}, {}, 0x{:x}", r(rt), r(rs), imm),
            Ori { rt, rs, imm } => write!(f, "ori    {}, {}, 0x{:x}", r(rt), r(rs), imm),
            Xori { rt, rs, imm } => write!(f, "xori   {}, {}, 0x{:x}", r(rt), r(rs), imm),
            Lui { rt, imm } => write!(f, "lui    {}, 0x{:x}", r(rt), imm),
            Lb { rt, base, offset } => write!(f, "lb     {}, {}({})", r(rt), offset, r(base)),
            Lh { rt, base, offset } => write!(f, "lh     {}, {}({})", r(rt), offset, r(base)),
            Lwl { rt, base, offset } => write!(f, "lwl    {}, {}({})", r(rt), offset, r(base)),
            Lw { rt, base, offset } => write!(f, "lw     {}, {}({})", r(rt), offset, r(base)),
            Lbu { rt, base, offset } => write!(f, "lbu    {}, {}({})", r(rt), offset, r(base)),
            Lhu { rt, base, offset } => write!(f, "lhu    {}, {}({})", r(rt), offset, r(base)),
            Lwr { rt, base, offset } => write!(f, "lwr    {}, {}({})", r(rt), offset, r(base)),
            Sb { rt, base, offset } => write!(f, "sb     {}, {}({})", r(rt), offset, r(base)),
            Sh { rt, base, offset } => write!(f, "sh     {}, {}({})", r(rt), offset, r(base)),
            Swl { rt, base, offset } => write!(f, "swl    {}, {}({})", r(rt), offset, r(base)),
            Sw { rt, base, offset } => write!(f, "sw     {}, {}({})", r(rt), offset, r(base)),
            Swr { rt, base, offset } => write!(f, "swr    {}, {}({})", r(rt), offset, r(base)),
            Lwc1 { ft, base, offset } => write!(f, "lwc1   $f{}, {}({})", ft, offset, r(base)),
            Swc1 { ft, base, offset } => write!(f, "swc1   $f{}, {}({})", ft, offset, r(base)),
            Mfc1 { rt, fs } => write!(f, "mfc1   {}, $f{}", r(rt), fs),
            Mtc1 { rt, fs } => write!(f, "mtc1   {}, $f{}", r(rt), fs),
            Cfc1 { rt, fs } => write!(f, "cfc1   {}, ${}", r(rt), fs),
            Ctc1 { rt, fs } => write!(f, "ctc1   {}, ${}", r(rt), fs),
            Bc1 { on_true, offset } => {
                write!(f, "bc1{}   {}", if on_true { 't' } else { 'f' }, offset)
            }
            Fpu { fmt, op, fd, fs, ft } => {
                let name = format!("{}.{}", op.mnemonic(), fmt.suffix());
                match op {
                    FpOp::CEq | FpOp::CUlt | FpOp::CLt | FpOp::CLe => {
                        write!(f, "{:<6} $f{}, $f{}", name, fs, ft)
                    }
                    FpOp::Abs | FpOp::Mov | FpOp::Neg | FpOp::CvtS | FpOp::CvtD | FpOp::CvtW => {
                        write!(f, "{:<6} $f{}, $f{}", name, fd, fs)
                    }
                    _ => write!(f, "{:<6} $f{}, $f{}, $f{}", name, fd, fs, ft),
                }
            }
        }
    }
}
