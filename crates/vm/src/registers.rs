/// General-purpose registers under the o32 calling convention.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Register {
    Zero = 0, // hardwired zero
    At = 1,   // assembler temporary
    V0 = 2,   // return value / syscall number
    V1 = 3,   // second return value

    A0 = 4, // argument 0
    A1 = 5, // argument 1
    A2 = 6, // argument 2
    A3 = 7, // argument 3 / syscall error flag

    T0 = 8,
    T1 = 9,
    T2 = 10,
    T3 = 11,
    T4 = 12,
    T5 = 13,
    T6 = 14,
    T7 = 15,

    S0 = 16,
    S1 = 17,
    S2 = 18,
    S3 = 19,
    S4 = 20,
    S5 = 21,
    S6 = 22,
    S7 = 23,

    T8 = 24,
    T9 = 25, // holds the callee address in PIC calls
    K0 = 26, // reserved for the kernel
    K1 = 27,

    Gp = 28, // global pointer
    Sp = 29, // stack pointer
    Fp = 30, // frame pointer
    Ra = 31, // return address
}

impl Register {
    #[inline]
    pub const fn idx(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        REG_NAMES[self as usize]
    }
}

pub const REG_NAMES: [&str; 32] = [
    "zero", "at", "v0", "v1", "a0", "a1", "a2", "a3", "t0", "t1", "t2", "t3", "t4", "t5", "t6",
    "t7", "s0", "s1", "s2", "s3", "s4", "s5", "s6", "s7", "t8", "t9", "k0", "k1", "gp", "sp",
    "fp", "ra",
];

/// Name of a register index for disassembly.
pub fn reg_name(index: usize) -> &'static str {
    REG_NAMES.get(index).copied().unwrap_or("?")
}
