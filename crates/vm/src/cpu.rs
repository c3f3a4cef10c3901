use std::io::{self, BufRead};

use log::warn;

use crate::coproc::Coprocessor;
use crate::decoder::decode;
use crate::diag;
use crate::funlog::FunctionLog;
use crate::instruction::Instruction;
use crate::memory::AddressSpace;
use crate::registers::Register;
use crate::symbols::SymbolTable;
use crate::sys_call::SyscallHandler;
use crate::trap::{Fault, Trap};

/// Outcome of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// SYSCALL executed; the kernel must run before the next instruction.
    Syscall,
}

/// Diagnostic options for [`CPU::run_instrumented`].
#[derive(Debug, Clone, Default)]
pub struct Instrumentation {
    /// Print every instruction before it executes.
    pub disasm: bool,
    /// Print the register file with each disassembled instruction.
    pub regprint: bool,
    /// Print each call with its arguments and each return with its value.
    pub funlog: bool,
    /// Wait for Enter whenever something is printed.
    pub interactive: bool,
}

/// The MIPS integer unit together with its floating-point coprocessor.
///
/// EDUCATIONAL PURPOSE: MIPS exposes its pipeline through the branch delay
/// slot. The instruction after a branch is already fetched when the branch
/// resolves, so it always executes. We model this with two program
/// counters:
/// - `pc`: the instruction about to execute
/// - `nextpc`: the one after it
///
/// Every cycle fetches at `pc`, then moves `pc` to `nextpc` and bumps
/// `nextpc` by 4 *before* executing. A branch only rewrites `nextpc`, so
/// the delay slot (now at `pc`) still runs first.
///
/// REGISTER CONVENTIONS (o32): `zero` is hardwired to 0 and writing it is a
/// fault here; `v0` carries syscall numbers and results; `a0`-`a3` carry
/// arguments; `sp` is r29 and `ra` is r31.
#[derive(Debug, Clone, Default)]
pub struct CPU {
    pub regs: [u32; 32],
    pub hi: u32,
    pub lo: u32,
    pub pc: u32,
    pub nextpc: u32,
    pub fpu: Coprocessor,
    pub funlog: FunctionLog,

    /// Address of the instruction being executed, for fault reports.
    pub current: u32,
}

impl CPU {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh register state for a new image: everything zero except the
    /// program counters and stack pointer.
    pub fn reset(&mut self, entry: u32, sp: u32) {
        self.regs = [0; 32];
        self.hi = 0;
        self.lo = 0;
        self.fpu = Coprocessor::new();
        self.funlog.clear();
        self.pc = entry;
        self.nextpc = entry.wrapping_add(4);
        self.current = entry;
        self.regs[Register::Sp.idx()] = sp;
    }

    #[inline]
    pub fn reg(&self, r: Register) -> u32 {
        self.regs[r.idx()]
    }

    #[inline]
    pub fn set_reg(&mut self, r: Register, value: u32) {
        self.regs[r.idx()] = value;
    }

    /// Fetch, advance and execute one instruction.
    pub fn step(&mut self, memory: &mut AddressSpace) -> Result<Step, Trap> {
        let pc = self.pc;
        let word = memory
            .load_word(pc)
            .map_err(|source| Fault::Memory { pc, source })?;
        self.current = pc;
        self.pc = self.nextpc;
        self.nextpc = self.nextpc.wrapping_add(4);

        // nop is by far the most common word (delay slots)
        if word == 0 {
            return Ok(Step::Continue);
        }
        let instr = decode(word).ok_or(Fault::InvalidInstruction { pc, word })?;
        let step = self.execute(instr, memory)?;
        if self.regs[0] != 0 {
            return Err(Fault::ZeroRegister { pc }.into());
        }
        Ok(step)
    }

    fn syscall(
        &mut self,
        memory: &mut AddressSpace,
        handler: &mut dyn SyscallHandler,
    ) -> Result<(), Trap> {
        handler.handle_syscall(self, memory)?;
        handler.after_syscall(self, memory)
    }

    /// Run until the process ends, as fast as possible.
    pub fn run(&mut self, memory: &mut AddressSpace, handler: &mut dyn SyscallHandler) -> Trap {
        loop {
            let outcome = match self.step(memory) {
                Ok(Step::Continue) => continue,
                Ok(Step::Syscall) => self.syscall(memory, handler),
                Err(trap) => Err(trap),
            };
            if let Err(trap) = outcome {
                return trap;
            }
        }
    }

    /// Run until the process ends, with disassembly, call tracking and
    /// breakpoints. Register and memory effects match [`CPU::run`] exactly.
    pub fn run_instrumented(
        &mut self,
        memory: &mut AddressSpace,
        handler: &mut dyn SyscallHandler,
        opts: &Instrumentation,
    ) -> Trap {
        let none = SymbolTable::new();
        let mut hit = false;
        let mut call = false;
        let mut ret = false;

        loop {
            if opts.disasm || hit {
                let symbols = handler.symbols().unwrap_or(&none);
                if opts.regprint {
                    eprintln!("{}", diag::register_line(self, symbols));
                }
                eprintln!("{}", diag::disasm_at(memory, self.pc, symbols));
                if opts.interactive {
                    pause();
                }
            }

            let fetched = memory.load_word(self.pc).ok().and_then(decode);
            let outcome = match self.step(memory) {
                Ok(Step::Continue) => Ok(()),
                Ok(Step::Syscall) => self.syscall(memory, handler),
                Err(trap) => Err(trap),
            };
            if let Err(trap) = outcome {
                return trap;
            }

            // calls and returns take effect after the delay slot
            let symbols = handler.symbols().unwrap_or(&none);
            let sp = self.reg(Register::Sp);
            hit = false;
            if call {
                hit = self.funlog.call(self.pc, sp);
                if opts.funlog {
                    eprintln!(
                        "{}  ({:x},{:x},{:x},{:x})",
                        self.funlog.backtrace(symbols),
                        self.regs[4],
                        self.regs[5],
                        self.regs[6],
                        self.regs[7]
                    );
                }
                call = false;
            } else if ret {
                if opts.funlog {
                    let v0 = self.reg(Register::V0);
                    eprintln!("# {} returns {:x} ({})", self.funlog.top(symbols), v0, v0 as i32);
                }
                hit = self.funlog.ret(sp);
                ret = false;
            }
            if hit {
                warn!("breakpoint at {}", symbols.describe(self.pc));
            }

            match fetched {
                Some(Instruction::Jal { .. }) | Some(Instruction::Jalr { .. }) => call = true,
                Some(Instruction::Jr { rs: 31 }) => ret = true,
                _ => {}
            }
        }
    }
}

fn pause() {
    let mut line = String::new();
    let _ = io::stdin().lock().read_line(&mut line);
}
