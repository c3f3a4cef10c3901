use log::info;
use types::{Errno, SigSet, Signal};
use vm::{AddressSpace, Trap, CPU};

use super::structs::{StructReader, StructWriter};
use super::{efault, Reply, SysResult};
use crate::signal::{restore_frame, SigAction};
use crate::task::Task;

fn signal_arg(sig: u32) -> Result<Signal, Errno> {
    Signal::from_number(sig).ok_or(Errno::EINVAL)
}

impl Task {
    /// Old-style signal(): install a handler with an empty mask and return
    /// the previous one.
    pub(super) fn sys_signal(&mut self, sig: u32, handler: u32) -> SysResult {
        let sig = signal_arg(sig)?;
        let action = SigAction::from_guest(sig, handler, 0, 0);
        let old = self.signals.lock().set_action(sig, action)?;
        Ok(Reply::Value(old.handler_word()))
    }

    pub(super) fn sys_sigaction(&mut self, memory: &mut AddressSpace, sig: u32, act: u32, oldact: u32) -> SysResult {
        let sig = signal_arg(sig)?;
        let constants = self.registry().constants();

        let new = if act != 0 {
            let r = StructReader::load(constants, "sigaction", memory, act)?;
            Some(SigAction::from_guest(
                sig,
                r.get("sa_handler") as u32,
                r.get("sa_mask") as u32,
                r.get("sa_flags") as u32,
            ))
        } else {
            None
        };

        let old = {
            let mut state = self.signals.lock();
            match new {
                Some(action) => state.set_action(sig, action)?,
                None => state.action(sig),
            }
        };
        if let Some(action) = new {
            info!("pid {}: sigaction {} -> 0x{:x}", self.pid(), sig, action.handler_word());
        }

        if oldact != 0 {
            let mut w = StructWriter::new(constants, "sigaction")?;
            w.set("sa_handler", old.handler_word() as u64)
                .set("sa_mask", old.mask.bits() as u64)
                .set("sa_flags", old.flags as u64);
            w.store(memory, oldact)?;
        }
        Ok(Reply::Value(0))
    }

    pub(super) fn sys_sigprocmask(&mut self, memory: &mut AddressSpace, how: u32, set: u32, oldset: u32) -> SysResult {
        let old = if set != 0 {
            let bits = memory.load_word(set).map_err(efault)?;
            self.signals.lock().change_mask(how, SigSet::from_bits(bits))?
        } else {
            self.signals.lock().mask()
        };
        if oldset != 0 {
            memory.store_word(oldset, old.bits()).map_err(efault)?;
        }
        Ok(Reply::Value(0))
    }

    /// Unwind the frame a handler was entered with. A frame that does not
    /// balance ends the process.
    pub(super) fn sys_sigreturn(&mut self, cpu: &mut CPU, memory: &mut AddressSpace) -> Result<SysResult, Trap> {
        let mask = restore_frame(cpu, memory)?;
        self.signals.lock().set_mask(mask);
        Ok(Ok(Reply::Unchanged))
    }
}
