// Initial image layout
// --------------------
// Everything is placed by walking down from STACK_TOP:
//
//   STACK_TOP
//   [ stack pages: STACK_TOP - stack_size .. STACK_TOP ]
//     signal trampoline (4 words)
//     argv strings, NUL terminated, back to back
//     envp strings, NUL terminated, back to back
//     argc | argv[0..n] | NULL | envp[0..m] | NULL   <- sp
//
// Each string block starts at (sp - len) & !3 and leaves sp at
// (block - 8) & !7. Segments are mapped at their own addresses and the
// break starts at the highest segment end.

use loader::ProgramImage;
use log::debug;
use vm::memory::STACK_TOP;
use vm::{AddressSpace, CPU};

use crate::error::KernelError;
use crate::signal::TRAMPOLINE;

/// Copy `bytes` below `sp`. Returns the block address and the new sp.
fn push_block(memory: &mut AddressSpace, sp: u32, bytes: &[u8]) -> Result<(u32, u32), KernelError> {
    let block = sp.wrapping_sub(bytes.len() as u32) & !3;
    memory.store_bytes(block, bytes)?;
    Ok((block, block.wrapping_sub(8) & !7))
}

/// Push NUL-terminated copies of `strings`; returns their addresses.
fn push_strings(
    memory: &mut AddressSpace,
    sp: u32,
    strings: &[String],
) -> Result<(Vec<u32>, u32), KernelError> {
    let mut bytes = Vec::new();
    let mut offsets = Vec::with_capacity(strings.len());
    for s in strings {
        offsets.push(bytes.len() as u32);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
    }
    let (block, sp) = push_block(memory, sp, &bytes)?;
    Ok((offsets.into_iter().map(|off| block + off).collect(), sp))
}

/// Replace everything in `memory` and `cpu` with a fresh image.
///
/// Returns the address of the signal trampoline.
pub fn load_image(
    cpu: &mut CPU,
    memory: &mut AddressSpace,
    image: &ProgramImage,
    argv: &[String],
    envp: &[String],
    stack_size: u32,
) -> Result<u32, KernelError> {
    memory.clear();
    memory.alloc(STACK_TOP - stack_size, stack_size)?;

    for segment in &image.segments {
        let len = segment.memsz.max(segment.data.len() as u32);
        memory.alloc(segment.vaddr, len)?;
        memory.store_bytes(segment.vaddr, &segment.data)?;
        let bss = len as usize - segment.data.len();
        if bss > 0 {
            memory.store_bytes(segment.vaddr + segment.data.len() as u32, &vec![0; bss])?;
        }
        debug!(
            "segment 0x{:08x}..0x{:08x} ({} file bytes)",
            segment.vaddr,
            segment.vaddr + len,
            segment.data.len()
        );
    }
    memory.init_brk(image.break_address());

    let words: Vec<u8> = TRAMPOLINE.iter().flat_map(|w| w.to_be_bytes()).collect();
    let (trampoline, sp) = push_block(memory, STACK_TOP, &words)?;
    let (args, sp) = push_strings(memory, sp, argv)?;
    let (envs, sp) = push_strings(memory, sp, envp)?;

    let sp = sp.wrapping_sub(4 * args.len() as u32 + 4 * envs.len() as u32 + 8) & !7;
    let mut table = Vec::with_capacity(args.len() + envs.len() + 3);
    table.push(args.len() as u32);
    table.extend(&args);
    table.push(0);
    table.extend(&envs);
    table.push(0);
    memory.store_words(sp, &table)?;

    cpu.reset(image.entry, sp);
    debug!(
        "loaded {} args, {} envs, sp=0x{:08x} pc=0x{:08x}",
        args.len(),
        envs.len(),
        sp,
        image.entry
    );
    Ok(trampoline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loader::Segment;
    use vm::registers::Register;
    use vm::PageAllocator;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn stack_holds_argc_argv_envp() {
        let mut memory = AddressSpace::new(PageAllocator::new());
        let mut cpu = CPU::new();
        let image = ProgramImage::from_words(0x40_0000, &[0, 0]);
        let argv = strings(&["/bin/prog", "one"]);
        let envp = strings(&["HOME=/", "bp=main"]);

        let trampoline = load_image(&mut cpu, &mut memory, &image, &argv, &envp, 0x4_0000).unwrap();
        assert_eq!(memory.load_words(trampoline, 4).unwrap(), TRAMPOLINE.to_vec());
        assert_eq!(cpu.pc, 0x40_0000);
        assert_eq!(cpu.nextpc, 0x40_0004);

        let sp = cpu.reg(Register::Sp);
        assert_eq!(sp % 8, 0);
        assert_eq!(memory.load_word(sp).unwrap(), 2);
        let arg0 = memory.load_word(sp + 4).unwrap();
        assert_eq!(memory.load_string(arg0).unwrap(), "/bin/prog");
        let arg1 = memory.load_word(sp + 8).unwrap();
        assert_eq!(memory.load_string(arg1).unwrap(), "one");
        assert_eq!(memory.load_word(sp + 12).unwrap(), 0);
        assert_eq!(memory.load_string_array(sp + 16).unwrap(), envp);
    }

    #[test]
    fn bss_is_zero_filled_and_break_follows_segments() {
        let mut memory = AddressSpace::new(PageAllocator::new());
        let mut cpu = CPU::new();
        let image = ProgramImage {
            entry: 0x40_0000,
            segments: vec![Segment::with_bss(0x41_0000, vec![0xff; 8], 0x18)],
            ..ProgramImage::default()
        };

        load_image(&mut cpu, &mut memory, &image, &[], &[], 0x1_0000).unwrap();
        assert_eq!(memory.load_word(0x41_0004).unwrap(), 0xffff_ffff);
        assert_eq!(memory.load_bytes(0x41_0008, 0x18).unwrap(), vec![0; 0x18]);
        assert_eq!(memory.brk(), 0x41_0020);
        assert!(!memory.bound(STACK_TOP - 0x1_0000 - 4));
    }
}
