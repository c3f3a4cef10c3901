use super::{Instruction, Step, CPU};
use crate::memory::{AddressSpace, MemoryError};
use crate::registers::Register;
use crate::trap::{Fault, Trap};

impl CPU {
    /// Executes a decoded instruction.
    ///
    /// By the time this runs, `pc` already points at the delay slot and
    /// `nextpc` at the word after it. Branches and jumps therefore only
    /// rewrite `nextpc`: the delay slot executes next whatever the branch
    /// decided, and the target follows it.
    ///
    /// RETURNS: `Step::Syscall` when the instruction traps to the kernel,
    /// `Step::Continue` otherwise; faults come back as `Trap::Fault`.
    pub fn execute(&mut self, instr: Instruction, memory: &mut AddressSpace) -> Result<Step, Trap> {
        let pc = self.current;
        let mem_fault = move |source: MemoryError| Fault::Memory { pc, source };
        let r = self.regs;

        match instr {
            // --- shifts ---
            Instruction::Sll { rd, rt, sa } => self.regs[rd] = r[rt] << sa,
            Instruction::Srl { rd, rt, sa } => self.regs[rd] = r[rt] >> sa,
            Instruction::Sra { rd, rt, sa } => self.regs[rd] = ((r[rt] as i32) >> sa) as u32,
            Instruction::Sllv { rd, rt, rs } => self.regs[rd] = r[rt] << (r[rs] & 31),
            Instruction::Srlv { rd, rt, rs } => self.regs[rd] = r[rt] >> (r[rs] & 31),
            Instruction::Srav { rd, rt, rs } => {
                self.regs[rd] = ((r[rt] as i32) >> (r[rs] & 31)) as u32
            }

            // --- register jumps ---
            Instruction::Jr { rs } => self.nextpc = r[rs],
            Instruction::Jalr { rd, rs } => {
                self.regs[rd] = self.nextpc;
                self.nextpc = r[rs];
            }

            Instruction::Movz { rd, rs, rt } => {
                if r[rt] == 0 {
                    self.regs[rd] = r[rs];
                }
            }
            Instruction::Movn { rd, rs, rt } => {
                if r[rt] != 0 {
                    self.regs[rd] = r[rs];
                }
            }

            Instruction::Syscall => return Ok(Step::Syscall),
            Instruction::Break { code } => return Err(Fault::Break { pc, code }.into()),
            Instruction::Sync => {}
            Instruction::Teq { rs, rt, code } => {
                if r[rs] == r[rt] {
                    return Err(Fault::ConditionalTrap { pc, code }.into());
                }
            }
            Instruction::Tne { rs, rt, code } => {
                if r[rs] != r[rt] {
                    return Err(Fault::ConditionalTrap { pc, code }.into());
                }
            }

            // --- hi/lo ---
            Instruction::Mfhi { rd } => self.regs[rd] = self.hi,
            Instruction::Mthi { rs } => self.hi = r[rs],
            Instruction::Mflo { rd } => self.regs[rd] = self.lo,
            Instruction::Mtlo { rs } => self.lo = r[rs],
            Instruction::Mult { rs, rt } => {
                let res = (r[rs] as i32 as i64) * (r[rt] as i32 as i64);
                self.hi = (res >> 32) as u32;
                self.lo = res as u32;
            }
            Instruction::Multu { rs, rt } => {
                let res = (r[rs] as u64) * (r[rt] as u64);
                self.hi = (res >> 32) as u32;
                self.lo = res as u32;
            }
            // A zero divisor leaves hi/lo as they were; the ISA leaves the
            // result unpredictable.
            Instruction::Div { rs, rt } => {
                let (a, b) = (r[rs] as i32, r[rt] as i32);
                if b != 0 {
                    self.lo = a.wrapping_div(b) as u32;
                    self.hi = a.wrapping_rem(b) as u32;
                }
            }
            Instruction::Divu { rs, rt } => {
                let (a, b) = (r[rs], r[rt]);
                if b != 0 {
                    self.lo = a / b;
                    self.hi = a % b;
                }
            }
            Instruction::Mul { rd, rs, rt } => {
                self.regs[rd] = (r[rs] as i32).wrapping_mul(r[rt] as i32) as u32
            }

            // --- register ALU ---
            Instruction::Add { rd, rs, rt } => {
                let sum = (r[rs] as i32)
                    .checked_add(r[rt] as i32)
                    .ok_or(Fault::Overflow { pc })?;
                self.regs[rd] = sum as u32;
            }
            Instruction::Addu { rd, rs, rt } => self.regs[rd] = r[rs].wrapping_add(r[rt]),
            Instruction::Sub { rd, rs, rt } => {
                let diff = (r[rs] as i32)
                    .checked_sub(r[rt] as i32)
                    .ok_or(Fault::Overflow { pc })?;
                self.regs[rd] = diff as u32;
            }
            Instruction::Subu { rd, rs, rt } => self.regs[rd] = r[rs].wrapping_sub(r[rt]),
            Instruction::And { rd, rs, rt } => self.regs[rd] = r[rs] & r[rt],
            Instruction::Or { rd, rs, rt } => self.regs[rd] = r[rs] | r[rt],
            Instruction::Xor { rd, rs, rt } => self.regs[rd] = r[rs] ^ r[rt],
            Instruction::Nor { rd, rs, rt } => self.regs[rd] = !(r[rs] | r[rt]),
            Instruction::Slt { rd, rs, rt } => {
                self.regs[rd] = ((r[rs] as i32) < (r[rt] as i32)) as u32
            }
            Instruction::Sltu { rd, rs, rt } => self.regs[rd] = (r[rs] < r[rt]) as u32,

            // --- branches ---
            Instruction::Bltz { rs, offset } => {
                if (r[rs] as i32) < 0 {
                    self.branch(offset);
                }
            }
            Instruction::Bgez { rs, offset } => {
                if (r[rs] as i32) >= 0 {
                    self.branch(offset);
                }
            }
            // the link happens whether or not the branch is taken
            Instruction::Bltzal { rs, offset } => {
                self.regs[Register::Ra.idx()] = self.nextpc;
                if (r[rs] as i32) < 0 {
                    self.branch(offset);
                }
            }
            Instruction::Bgezal { rs, offset } => {
                self.regs[Register::Ra.idx()] = self.nextpc;
                if (r[rs] as i32) >= 0 {
                    self.branch(offset);
                }
            }
            Instruction::J { target } => self.jump(target),
            Instruction::Jal { target } => {
                self.regs[Register::Ra.idx()] = self.nextpc;
                self.jump(target);
            }
            Instruction::Beq { rs, rt, offset } => {
                if r[rs] == r[rt] {
                    self.branch(offset);
                }
            }
            Instruction::Bne { rs, rt, offset } => {
                if r[rs] != r[rt] {
                    self.branch(offset);
                }
            }
            Instruction::Blez { rs, offset } => {
                if (r[rs] as i32) <= 0 {
                    self.branch(offset);
                }
            }
            Instruction::Bgtz { rs, offset } => {
                if (r[rs] as i32) > 0 {
                    self.branch(offset);
                }
            }

            // --- immediate ALU ---
            Instruction::Addi { rt, rs, imm } => {
                let sum = (r[rs] as i32).checked_add(imm).ok_or(Fault::Overflow { pc })?;
                self.regs[rt] = sum as u32;
            }
            Instruction::Addiu { rt, rs, imm } => self.regs[rt] = r[rs].wrapping_add(imm as u32),
            Instruction::Slti { rt, rs, imm } => self.regs[rt] = ((r[rs] as i32) < imm) as u32,
            Instruction::Sltiu { rt, rs, imm } => self.regs[rt] = (r[rs] < imm as u32) as u32,
            Instruction::Andi { rt, rs, imm } => self.regs[rt] = r[rs] & imm,
            Instruction::Ori { rt, rs, imm } => self.regs[rt] = r[rs] | imm,
            Instruction::Xori { rt, rs, imm } => self.regs[rt] = r[rs] ^ imm,
            Instruction::Lui { rt, imm } => self.regs[rt] = imm << 16,

            // --- loads ---
            Instruction::Lb { rt, base, offset } => {
                let v = memory.load_byte(ea(r[base], offset)).map_err(mem_fault)?;
                self.regs[rt] = v as i8 as i32 as u32;
            }
            Instruction::Lbu { rt, base, offset } => {
                self.regs[rt] = memory.load_byte(ea(r[base], offset)).map_err(mem_fault)? as u32;
            }
            Instruction::Lh { rt, base, offset } => {
                let v = memory.load_half(ea(r[base], offset)).map_err(mem_fault)?;
                self.regs[rt] = v as i16 as i32 as u32;
            }
            Instruction::Lhu { rt, base, offset } => {
                self.regs[rt] = memory.load_half(ea(r[base], offset)).map_err(mem_fault)? as u32;
            }
            Instruction::Lw { rt, base, offset } => {
                self.regs[rt] = memory.load_word(ea(r[base], offset)).map_err(mem_fault)?;
            }
            // Shifts are done in 64 bits so that a shift by 32 yields zero.
            Instruction::Lwl { rt, base, offset } => {
                let a = ea(r[base], offset);
                let word = memory.load_word(a & !3).map_err(mem_fault)? as u64;
                let s = (a & 3) * 8;
                let keep = r[rt] as u64 & (0xffff_ffffu64 >> (32 - s));
                self.regs[rt] = ((word << s) | keep) as u32;
            }
            Instruction::Lwr { rt, base, offset } => {
                let a = ea(r[base], offset);
                let word = memory.load_word(a & !3).map_err(mem_fault)? as u64;
                let s = ((a & 3) + 1) * 8;
                let keep = r[rt] as u64 & (0xffff_ffffu64 << s);
                self.regs[rt] = ((word >> (32 - s)) | keep) as u32;
            }
            Instruction::Lwc1 { ft, base, offset } => {
                let v = memory.load_word(ea(r[base], offset)).map_err(mem_fault)?;
                self.fpu.set_word(ft, v);
            }

            // --- stores ---
            Instruction::Sb { rt, base, offset } => {
                memory.store_byte(ea(r[base], offset), r[rt] as u8).map_err(mem_fault)?
            }
            Instruction::Sh { rt, base, offset } => {
                memory.store_half(ea(r[base], offset), r[rt] as u16).map_err(mem_fault)?
            }
            Instruction::Sw { rt, base, offset } => {
                memory.store_word(ea(r[base], offset), r[rt]).map_err(mem_fault)?
            }
            Instruction::Swl { rt, base, offset } => {
                let a = ea(r[base], offset);
                let old = memory.load_word(a & !3).map_err(mem_fault)? as u64;
                let s = (a & 3) * 8;
                let value = ((r[rt] as u64) >> s) | (old & (0xffff_ffffu64 << (32 - s)));
                memory.store_word(a & !3, value as u32).map_err(mem_fault)?;
            }
            Instruction::Swr { rt, base, offset } => {
                let a = ea(r[base], offset);
                let old = memory.load_word(a & !3).map_err(mem_fault)? as u64;
                let s = ((a & 3) + 1) * 8;
                let value = ((r[rt] as u64) << (32 - s)) | (old & (0xffff_ffffu64 >> s));
                memory.store_word(a & !3, value as u32).map_err(mem_fault)?;
            }
            Instruction::Swc1 { ft, base, offset } => {
                memory
                    .store_word(ea(r[base], offset), self.fpu.word(ft))
                    .map_err(mem_fault)?
            }

            // --- coprocessor 1 ---
            Instruction::Mfc1 { rt, fs } => self.regs[rt] = self.fpu.word(fs),
            Instruction::Mtc1 { rt, fs } => self.fpu.set_word(fs, r[rt]),
            Instruction::Cfc1 { rt, fs } => {
                if fs != crate::isa::FCSR {
                    return Err(Fault::ControlRegister(fs).into());
                }
                self.regs[rt] = self.fpu.fcsr();
            }
            Instruction::Ctc1 { rt, fs } => {
                if fs != crate::isa::FCSR {
                    return Err(Fault::ControlRegister(fs).into());
                }
                self.fpu.set_fcsr(r[rt])?;
            }
            Instruction::Bc1 { on_true, offset } => {
                if on_true == self.fpu.fccr {
                    self.branch(offset);
                }
            }
            Instruction::Fpu { fmt, op, fd, fs, ft } => self.fpu.execute(fmt, op, fd, fs, ft),
        }
        Ok(Step::Continue)
    }

    /// PC-relative branch. `pc` is the delay slot at this point.
    #[inline]
    fn branch(&mut self, offset: i32) {
        self.nextpc = self.pc.wrapping_add((offset << 2) as u32);
    }

    /// Jump within the current 256 MiB region.
    #[inline]
    fn jump(&mut self, target: u32) {
        self.nextpc = (self.pc & 0xf000_0000) | (target << 2);
    }
}

/// Effective address: base register plus signed offset.
#[inline]
fn ea(base: u32, offset: i32) -> u32 {
    base.wrapping_add(offset as u32)
}
