//! Crash and trace output: register dumps, disassembly, backtraces.

use std::fmt::Write;

use crate::cpu::CPU;
use crate::decoder::decode;
use crate::memory::AddressSpace;
use crate::registers::{Register, REG_NAMES};
use crate::symbols::SymbolTable;

/// Prologue words are searched this far into a function.
const PROLOGUE_WORDS: u32 = 8;
/// Stop walking after this many frames.
const MAX_FRAMES: usize = 64;

/// Full register file, one register per line.
pub fn dump_registers(cpu: &CPU) -> String {
    let mut out = String::from("--- Register Dump ---\n");
    for (i, name) in REG_NAMES.iter().enumerate() {
        let val = cpu.regs[i];
        let _ = writeln!(out, "r{:02} ({:<4}) = 0x{:08x} ({})", i, name, val, val as i32);
    }
    let _ = writeln!(out, "hi        = 0x{:08x}", cpu.hi);
    let _ = writeln!(out, "lo        = 0x{:08x}", cpu.lo);
    let _ = writeln!(out, "pc        = 0x{:08x}", cpu.pc);
    let _ = writeln!(out, "nextpc    = 0x{:08x}", cpu.nextpc);
    let _ = writeln!(out, "fcsr      = 0x{:08x} fccr={}", cpu.fpu.fcsr(), cpu.fpu.fccr);
    out.push_str("---------------------");
    out
}

/// Compact one-line form with only the non-zero registers.
pub fn register_line(cpu: &CPU, symbols: &SymbolTable) -> String {
    let mut out = format!("REGS: pc={}", symbols.describe(cpu.pc));
    for (i, name) in REG_NAMES.iter().enumerate() {
        let val = cpu.regs[i];
        if val != 0 {
            let _ = write!(out, " {}={:x}", name, val);
        }
    }
    out
}

/// Disassembly of the word at `pc`, with branch targets resolved.
pub fn disasm_at(memory: &AddressSpace, pc: u32, symbols: &SymbolTable) -> String {
    let word = match memory.load_word(pc) {
        Ok(word) => word,
        Err(_) => return format!("disasm: pc not bound: {:x}", pc),
    };
    let mut out = format!("{:<28} {:08x}: {:08x}  ", symbols.describe(pc), pc, word);
    match decode(word) {
        Some(instr) => {
            let _ = write!(out, "{}", instr);
            if let Some(target) = instr.branch_target(pc) {
                let _ = write!(out, "  -> {}", symbols.describe(target));
            }
        }
        None => out.push_str("<invalid>"),
    }
    out
}

/// Hex and ASCII view of `len` bytes at `addr`. Unmapped lines are marked.
pub fn dump_memory(memory: &AddressSpace, addr: u32, len: u32) -> String {
    let mut out = String::new();
    let start = addr & !15;
    let end = addr.saturating_add(len);
    let mut line_addr = start;
    while line_addr < end {
        match memory.load_bytes(line_addr, 16) {
            Ok(line) => {
                let hex = hex::encode(&line);
                let spaced: Vec<&str> = (0..hex.len()).step_by(2).map(|i| &hex[i..i + 2]).collect();
                let ascii: String = line
                    .iter()
                    .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                    .collect();
                let _ = writeln!(out, "{:08x}  {:<47}  |{}|", line_addr, spaced.join(" "), ascii);
            }
            Err(_) => {
                let _ = writeln!(out, "{:08x}  <unmapped>", line_addr);
            }
        }
        line_addr = match line_addr.checked_add(16) {
            Some(next) => next,
            None => break,
        };
    }
    out
}

/// Offset of the `sw ra, N(sp)` slot in a function prologue.
pub fn find_ra_slot(memory: &AddressSpace, func: u32) -> Option<u32> {
    prologue_imm(memory, func, 0xafbf_0000)
        .filter(|&imm| imm > 0)
        .map(|imm| imm as u32)
}

/// Frame size from the `addiu sp, sp, -N` prologue word.
pub fn find_frame_size(memory: &AddressSpace, func: u32) -> Option<u32> {
    prologue_imm(memory, func, 0x27bd_0000)
        .map(|imm| -imm)
        .filter(|&size| size > 0)
        .map(|size| size as u32)
}

fn prologue_imm(memory: &AddressSpace, func: u32, pattern: u32) -> Option<i32> {
    (0..PROLOGUE_WORDS)
        .filter_map(|n| memory.load_word(func.wrapping_add(n * 4)).ok())
        .find(|word| word & 0xffff_0000 == pattern)
        .map(|word| word as u16 as i16 as i32)
}

/// Best-effort walk of the guest stack by prologue inspection, outermost
/// frame first. Notes on how the walk went are appended in brackets.
pub fn stack_backtrace(cpu: &CPU, memory: &AddressSpace, symbols: &SymbolTable) -> String {
    let pc = cpu.current;
    let ra = cpu.reg(Register::Ra);
    let mut sp = cpu.reg(Register::Sp);
    let mut frames = vec![symbols.describe(pc)];
    let mut notes = String::new();

    let mut addr = if !memory.bound(pc) {
        notes.push_str(" [crash after jump to null]");
        ra
    } else {
        let func = symbols.function_start(pc).unwrap_or(pc);
        let next = match find_ra_slot(memory, func) {
            Some(off) => {
                let saved = memory.load_word(sp.wrapping_add(off)).unwrap_or(0);
                let when = if saved == ra { "before" } else { "after" };
                let _ = write!(notes, " [non leaf function {} branch]", when);
                saved
            }
            None => {
                notes.push_str(" [leaf function]");
                ra
            }
        };
        if let Some(size) = find_frame_size(memory, func) {
            sp = sp.wrapping_add(size);
        }
        next
    };

    while memory.bound(addr) && frames.len() < MAX_FRAMES {
        frames.push(symbols.describe(addr));
        let name = symbols.function_name(addr);
        let Some(func) = symbols.function_start(addr) else {
            let _ = write!(notes, " [could not get address of function {}]", name);
            break;
        };
        let Some(size) = find_frame_size(memory, func) else {
            let _ = write!(notes, " [could not get frame size of {}]", name);
            break;
        };
        let Some(off) = find_ra_slot(memory, func) else {
            let _ = write!(notes, " [could not get return slot of {}]", name);
            break;
        };
        addr = memory.load_word(sp.wrapping_add(off)).unwrap_or(0);
        sp = sp.wrapping_add(size);
    }

    frames.reverse();
    frames.join(" ") + &notes
}

/// Everything printed when a process crashes.
pub fn crash_report(cpu: &CPU, memory: &AddressSpace, symbols: &SymbolTable) -> String {
    let sp = cpu.reg(Register::Sp);
    let mut out = dump_registers(cpu);
    let _ = write!(
        out,
        "\nlast instruction: {}\ncall log: {}\nbacktrace: {}\nstack:\n{}",
        disasm_at(memory, cpu.current, symbols),
        cpu.funlog.backtrace(symbols),
        stack_backtrace(cpu, memory, symbols),
        dump_memory(memory, sp, 64)
    );
    out
}
