use crate::cpu::CPU;
use crate::memory::AddressSpace;
use crate::symbols::SymbolTable;
use crate::trap::Trap;

/// Kernel side of the syscall trap.
///
/// The engine calls `handle_syscall` when it executes SYSCALL and then
/// `after_syscall`, so pending work such as signal delivery is checked at
/// one flat point in the run loop after every call. Either may end the
/// process by returning a trap.
pub trait SyscallHandler {
    fn handle_syscall(&mut self, cpu: &mut CPU, memory: &mut AddressSpace) -> Result<(), Trap>;

    fn after_syscall(&mut self, _cpu: &mut CPU, _memory: &mut AddressSpace) -> Result<(), Trap> {
        Ok(())
    }

    /// Symbols of the image currently loaded, for instrumented output.
    /// Asked again after every syscall since exec may swap the image.
    fn symbols(&self) -> Option<&SymbolTable> {
        None
    }
}
