//! Minimal kernel for engine tests: exit and write, everything else fails
//! with ENOSYS.
#![allow(dead_code)]

use vm::asm::to_bytes;
use vm::memory::{DEFAULT_STACK_SIZE, PAGE_SIZE, STACK_TOP};
use vm::registers::Register;
use vm::{AddressSpace, PageAllocator, SyscallHandler, Trap, CPU};

pub const BASE: u32 = 0x0040_0000;
pub const DATA: u32 = 0x0041_0000;

const SYS_EXIT: u32 = 4001;
const SYS_WRITE: u32 = 4004;
const ENOSYS: u32 = 89;

#[derive(Debug, Default)]
pub struct TestSyscallHandler {
    pub calls: Vec<u32>,
    pub output: Vec<u8>,
}

impl SyscallHandler for TestSyscallHandler {
    fn handle_syscall(&mut self, cpu: &mut CPU, memory: &mut AddressSpace) -> Result<(), Trap> {
        let nr = cpu.reg(Register::V0);
        self.calls.push(nr);
        match nr {
            SYS_EXIT => Err(Trap::Exit(cpu.reg(Register::A0) as u8)),
            SYS_WRITE => {
                let len = cpu.reg(Register::A2);
                let bytes = memory
                    .load_bytes(cpu.reg(Register::A1), len as usize)
                    .expect("write buffer mapped");
                self.output.extend_from_slice(&bytes);
                cpu.set_reg(Register::V0, len);
                cpu.set_reg(Register::A3, 0);
                Ok(())
            }
            _ => {
                cpu.set_reg(Register::V0, ENOSYS);
                cpu.set_reg(Register::A3, 1);
                Ok(())
            }
        }
    }
}

/// Program at BASE, a zeroed data page at DATA and a stack below STACK_TOP.
pub fn machine(words: &[u32]) -> (CPU, AddressSpace) {
    let mut memory = AddressSpace::new(PageAllocator::new());
    memory.alloc(BASE, PAGE_SIZE).unwrap();
    memory.alloc(DATA, PAGE_SIZE).unwrap();
    memory
        .alloc(STACK_TOP - DEFAULT_STACK_SIZE, DEFAULT_STACK_SIZE)
        .unwrap();
    memory.store_bytes(BASE, &to_bytes(words)).unwrap();

    let mut cpu = CPU::new();
    cpu.reset(BASE, STACK_TOP - 64);
    (cpu, memory)
}

/// Run to completion with the fast loop.
pub fn run(words: &[u32]) -> (Trap, CPU, AddressSpace, TestSyscallHandler) {
    let (mut cpu, mut memory) = machine(words);
    let mut kernel = TestSyscallHandler::default();
    let trap = cpu.run(&mut memory, &mut kernel);
    (trap, cpu, memory, kernel)
}

/// `exit(a0)` tail.
pub fn exit_tail() -> [u32; 2] {
    [vm::asm::li(Register::V0, 4001), vm::asm::SYSCALL]
}
