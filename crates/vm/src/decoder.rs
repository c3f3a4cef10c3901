use crate::instruction::{Fmt, FpOp, Instruction};
use crate::isa::*;

/// Decodes one MIPS32 instruction word.
///
/// The primary opcode picks the form. SPECIAL and SPECIAL2 dispatch again
/// on the function field, REGIMM on rt and COP1 on rs. Every field is
/// extracted up front; each arm keeps only the ones its form uses.
///
/// RETURNS: `None` for encodings this engine does not implement. The
/// executor turns that into an invalid-instruction fault.
pub fn decode(word: u32) -> Option<Instruction> {
    let opcode = Opcode::from_u32(op(word))?;
    let (rs, rt, rd) = (rs(word), rt(word), rd(word));

    Some(match opcode {
        Opcode::Special => return decode_special(word),
        Opcode::RegImm => {
            let offset = simm(word);
            match rt {
                RT_BLTZ => Instruction::Bltz { rs, offset },
                RT_BGEZ => Instruction::Bgez { rs, offset },
                RT_BLTZAL => Instruction::Bltzal { rs, offset },
                RT_BGEZAL => Instruction::Bgezal { rs, offset },
                _ => return None,
            }
        }
        Opcode::J => Instruction::J { target: word & 0x03ff_ffff },
        Opcode::Jal => Instruction::Jal { target: word & 0x03ff_ffff },
        Opcode::Beq => Instruction::Beq { rs, rt, offset: simm(word) },
        Opcode::Bne => Instruction::Bne { rs, rt, offset: simm(word) },
        Opcode::Blez => Instruction::Blez { rs, offset: simm(word) },
        Opcode::Bgtz => Instruction::Bgtz { rs, offset: simm(word) },
        Opcode::Addi => Instruction::Addi { rt, rs, imm: simm(word) },
        Opcode::Addiu => Instruction::Addiu { rt, rs, imm: simm(word) },
        Opcode::Slti => Instruction::Slti { rt, rs, imm: simm(word) },
        Opcode::Sltiu => Instruction::Sltiu { rt, rs, imm: simm(word) },
        Opcode::Andi => Instruction::Andi { rt, rs, imm: uimm(word) },
        Opcode::Ori => Instruction::Ori { rt, rs, imm: uimm(word) },
        Opcode::Xori => Instruction::Xori { rt, rs, imm: uimm(word) },
        Opcode::Lui => Instruction::Lui { rt, imm: uimm(word) },
        Opcode::Cop1 => return decode_cop1(word),
        Opcode::Special2 => match funct(word) {
            FN2_MUL => Instruction::Mul { rd, rs, rt },
            _ => return None,
        },
        Opcode::Lb => Instruction::Lb { rt, base: rs, offset: simm(word) },
        Opcode::Lh => Instruction::Lh { rt, base: rs, offset: simm(word) },
        Opcode::Lwl => Instruction::Lwl { rt, base: rs, offset: simm(word) },
        Opcode::Lw => Instruction::Lw { rt, base: rs, offset: simm(word) },
        Opcode::Lbu => Instruction::Lbu { rt, base: rs, offset: simm(word) },
        Opcode::Lhu => Instruction::Lhu { rt, base: rs, offset: simm(word) },
        Opcode::Lwr => Instruction::Lwr { rt, base: rs, offset: simm(word) },
        Opcode::Sb => Instruction::Sb { rt, base: rs, offset: simm(word) },
        Opcode::Sh => Instruction::Sh { rt, base: rs, offset: simm(word) },
        Opcode::Swl => Instruction::Swl { rt, base: rs, offset: simm(word) },
        Opcode::Sw => Instruction::Sw { rt, base: rs, offset: simm(word) },
        Opcode::Swr => Instruction::Swr { rt, base: rs, offset: simm(word) },
        Opcode::Lwc1 => Instruction::Lwc1 { ft: rt, base: rs, offset: simm(word) },
        Opcode::Swc1 => Instruction::Swc1 { ft: rt, base: rs, offset: simm(word) },
    })
}

fn decode_special(word: u32) -> Option<Instruction> {
    let (rs, rt, rd, sa) = (rs(word), rt(word), rd(word), sa(word));
    Some(match funct(word) {
        FN_SLL => Instruction::Sll { rd, rt, sa },
        FN_SRL => Instruction::Srl { rd, rt, sa },
        FN_SRA => Instruction::Sra { rd, rt, sa },
        FN_SLLV => Instruction::Sllv { rd, rt, rs },
        FN_SRLV => Instruction::Srlv { rd, rt, rs },
        FN_SRAV => Instruction::Srav { rd, rt, rs },
        FN_JR => Instruction::Jr { rs },
        FN_JALR => Instruction::Jalr { rd, rs },
        FN_MOVZ => Instruction::Movz { rd, rs, rt },
        FN_MOVN => Instruction::Movn { rd, rs, rt },
        FN_SYSCALL => Instruction::Syscall,
        FN_BREAK => Instruction::Break { code: (word >> 6) & 0xf_ffff },
        FN_SYNC => Instruction::Sync,
        FN_MFHI => Instruction::Mfhi { rd },
        FN_MTHI => Instruction::Mthi { rs },
        FN_MFLO => Instruction::Mflo { rd },
        FN_MTLO => Instruction::Mtlo { rs },
        FN_MULT => Instruction::Mult { rs, rt },
        FN_MULTU => Instruction::Multu { rs, rt },
        FN_DIV => Instruction::Div { rs, rt },
        FN_DIVU => Instruction::Divu { rs, rt },
        FN_ADD => Instruction::Add { rd, rs, rt },
        FN_ADDU => Instruction::Addu { rd, rs, rt },
        FN_SUB => Instruction::Sub { rd, rs, rt },
        FN_SUBU => Instruction::Subu { rd, rs, rt },
        FN_AND => Instruction::And { rd, rs, rt },
        FN_OR => Instruction::Or { rd, rs, rt },
        FN_XOR => Instruction::Xor { rd, rs, rt },
        FN_NOR => Instruction::Nor { rd, rs, rt },
        FN_SLT => Instruction::Slt { rd, rs, rt },
        FN_SLTU => Instruction::Sltu { rd, rs, rt },
        FN_TEQ => Instruction::Teq { rs, rt, code: (word >> 6) & 0x3ff },
        FN_TNE => Instruction::Tne { rs, rt, code: (word >> 6) & 0x3ff },
        _ => return None,
    })
}

/// COP1 field names: rs=fmt, rt=ft, rd=fs, sa=fd.
fn decode_cop1(word: u32) -> Option<Instruction> {
    let (rt, fs, fd) = (rt(word), rd(word), sa(word) as usize);
    let fmt = match rs(word) {
        RS_MF => return Some(Instruction::Mfc1 { rt, fs }),
        RS_MT => return Some(Instruction::Mtc1 { rt, fs }),
        RS_CF => return Some(Instruction::Cfc1 { rt, fs }),
        RS_CT => return Some(Instruction::Ctc1 { rt, fs }),
        RS_BC => {
            return Some(Instruction::Bc1 {
                on_true: word & 0x1_0000 != 0,
                offset: simm(word),
            })
        }
        RS_FMT_SINGLE => Fmt::Single,
        RS_FMT_DOUBLE => Fmt::Double,
        RS_FMT_WORD => Fmt::Word,
        _ => return None,
    };
    let op = match funct(word) {
        CFN_ADD => FpOp::Add,
        CFN_SUB => FpOp::Sub,
        CFN_MUL => FpOp::Mul,
        CFN_DIV => FpOp::Div,
        CFN_ABS => FpOp::Abs,
        CFN_MOV => FpOp::Mov,
        CFN_NEG => FpOp::Neg,
        CFN_CVT_S => FpOp::CvtS,
        CFN_CVT_D => FpOp::CvtD,
        CFN_CVT_W => FpOp::CvtW,
        CFN_C_EQ => FpOp::CEq,
        CFN_C_ULT => FpOp::CUlt,
        CFN_C_LT => FpOp::CLt,
        CFN_C_LE => FpOp::CLe,
        _ => return None,
    };
    Some(Instruction::Fpu { fmt, op, fd, fs, ft: rt })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_common_forms() {
        // addiu sp, sp, -32
        assert_eq!(
            decode(0x27bd_ffe0),
            Some(Instruction::Addiu { rt: 29, rs: 29, imm: -32 })
        );
        // sw ra, 28(sp)
        assert_eq!(
            decode(0xafbf_001c),
            Some(Instruction::Sw { rt: 31, base: 29, offset: 28 })
        );
        // jr ra
        assert_eq!(decode(0x03e0_0008), Some(Instruction::Jr { rs: 31 }));
        assert_eq!(decode(0x0000_000c), Some(Instruction::Syscall));
        assert_eq!(decode(0), Some(Instruction::Sll { rd: 0, rt: 0, sa: 0 }));
    }

    #[test]
    fn decodes_coprocessor_forms() {
        // add.d $f0, $f2, $f4
        assert_eq!(
            decode(0x4624_1000),
            Some(Instruction::Fpu { fmt: Fmt::Double, op: FpOp::Add, fd: 0, fs: 2, ft: 4 })
        );
        // bc1t +3
        assert_eq!(decode(0x4501_0003), Some(Instruction::Bc1 { on_true: true, offset: 3 }));
        // cfc1 t0, $31
        assert_eq!(decode(0x4448_f800), Some(Instruction::Cfc1 { rt: 8, fs: 31 }));
    }

    #[test]
    fn decodes_divide_guard() {
        // teq a1, zero, 7
        let guard = decode(0x00a0_01f4).unwrap();
        assert_eq!(guard, Instruction::Teq { rs: 5, rt: 0, code: 7 });
        assert_eq!(guard.to_string(), "teq    a1, zero, 7");
        assert_eq!(decode(0x0085_0036), Some(Instruction::Tne { rs: 4, rt: 5, code: 0 }));
    }

    #[test]
    fn rejects_unknown_encodings() {
        assert_eq!(decode(0xfc00_0000), None);
        assert_eq!(decode(0x0000_0001), None);
        assert_eq!(decode(0x0412_0000), None);
    }

    #[test]
    fn disassembles() {
        assert_eq!(decode(0x27bd_ffe0).unwrap().to_string(), "addiu  sp, sp, -32");
        assert_eq!(decode(0).unwrap().to_string(), "nop");
        assert_eq!(decode(0x2402_0fa1).unwrap().to_string(), "li     v0, 4001");
    }
}
