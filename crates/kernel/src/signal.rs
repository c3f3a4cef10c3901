//! Per-process signal state and the handler frame.
//!
//! Raising a signal only queues it. The owning process looks at its queue
//! after every syscall (and when a blocking wait wakes), so delivery never
//! splits an instruction.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info};
use types::{DefaultAction, Errno, SigSet, Signal};
use vm::registers::Register;
use vm::{AddressSpace, CPU, FPU_FRAME_WORDS};

use crate::error::KernelError;
use crate::wake::{Wake, POLL_INTERVAL};

pub const SIG_DFL: u32 = 0;
pub const SIG_IGN: u32 = 1;

pub const SIG_BLOCK: u32 = 1;
pub const SIG_UNBLOCK: u32 = 2;
pub const SIG_SETMASK: u32 = 3;

/// Words of the integer frame: r0..r31, hi, lo, pc, nextpc, mask, pad.
pub const INT_FRAME_WORDS: usize = 38;

/// `li v0, 4119; nop; syscall; nop`: returns from a handler into sigreturn.
pub const TRAMPOLINE: [u32; 4] = [0x2402_1017, 0, 0x0000_000c, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Ignore,
    Handler(u32),
}

/// Disposition of one signal with the mask and flags it was installed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigAction {
    pub disposition: Disposition,
    pub mask: SigSet,
    pub flags: u32,
}

impl SigAction {
    /// The default action. Stop-class defaults block everything but
    /// CONT while stopped; CONT itself carries a full mask.
    pub fn default_for(sig: Signal) -> Self {
        let mask = match sig.default_action() {
            DefaultAction::Stop => SigSet::full().without(Signal::SIGCONT),
            DefaultAction::Continue => SigSet::full(),
            _ => SigSet::empty(),
        };
        Self {
            disposition: Disposition::Default,
            mask,
            flags: 0,
        }
    }

    /// Build from the guest's `sa_handler`/`sa_mask`/`sa_flags` words.
    pub fn from_guest(sig: Signal, handler: u32, mask: u32, flags: u32) -> Self {
        let disposition = match handler {
            SIG_DFL => return Self { flags, ..Self::default_for(sig) },
            SIG_IGN => Disposition::Ignore,
            addr => Disposition::Handler(addr),
        };
        Self {
            disposition,
            mask: SigSet::from_bits(mask),
            flags,
        }
    }

    /// The `sa_handler` word the guest sees.
    pub fn handler_word(&self) -> u32 {
        match self.disposition {
            Disposition::Default => SIG_DFL,
            Disposition::Ignore => SIG_IGN,
            Disposition::Handler(addr) => addr,
        }
    }

    fn ignores(&self, sig: Signal) -> bool {
        match self.disposition {
            Disposition::Ignore => true,
            Disposition::Default => sig.default_action() == DefaultAction::Ignore,
            Disposition::Handler(_) => false,
        }
    }

    fn stops(&self, sig: Signal) -> bool {
        self.disposition == Disposition::Default && sig.default_action() == DefaultAction::Stop
    }
}

/// Dispositions, pending queue and block mask of one process.
#[derive(Debug, Clone)]
pub struct SignalState {
    actions: [SigAction; Signal::MAX as usize],
    pending: VecDeque<Signal>,
    mask: SigSet,
    stopped: bool,
}

impl Default for SignalState {
    fn default() -> Self {
        let mut actions = [SigAction::default_for(Signal::SIGHUP); Signal::MAX as usize];
        for sig in Signal::all() {
            actions[Self::slot(sig)] = SigAction::default_for(sig);
        }
        Self {
            actions,
            pending: VecDeque::new(),
            mask: SigSet::empty(),
            stopped: false,
        }
    }
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(sig: Signal) -> usize {
        sig.number() as usize - 1
    }

    pub fn action(&self, sig: Signal) -> SigAction {
        self.actions[Self::slot(sig)]
    }

    /// Install a new action and return the old one. KILL and STOP keep
    /// their defaults.
    pub fn set_action(&mut self, sig: Signal, action: SigAction) -> Result<SigAction, Errno> {
        if sig.is_unblockable() {
            return Err(Errno::EINVAL);
        }
        let old = std::mem::replace(&mut self.actions[Self::slot(sig)], action);
        if action.ignores(sig) {
            self.pending.retain(|&p| p != sig);
        }
        Ok(old)
    }

    pub fn mask(&self) -> SigSet {
        self.mask
    }

    pub fn set_mask(&mut self, mask: SigSet) -> SigSet {
        std::mem::replace(&mut self.mask, SigSet::from_bits(mask.bits()))
    }

    /// sigprocmask: apply `set` according to `how`, returning the old mask.
    pub fn change_mask(&mut self, how: u32, set: SigSet) -> Result<SigSet, Errno> {
        let mask = match how {
            SIG_BLOCK => self.mask.block(set),
            SIG_UNBLOCK => self.mask.unblock(set),
            SIG_SETMASK => set,
            _ => return Err(Errno::EINVAL),
        };
        Ok(self.set_mask(mask))
    }

    pub fn is_blocked(&self, sig: Signal) -> bool {
        !sig.is_unblockable() && self.mask.contains(sig)
    }

    pub fn is_pending(&self, sig: Signal) -> bool {
        self.pending.contains(&sig)
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Queue `sig` unless it is ignored or already pending. True when the
    /// signal is deliverable now, i.e. not blocked.
    pub fn raise(&mut self, sig: Signal) -> bool {
        let wakes_stopped = self.stopped && sig == Signal::SIGCONT;
        if self.action(sig).ignores(sig) && !sig.is_unblockable() && !wakes_stopped {
            return false;
        }
        if !self.pending.contains(&sig) {
            self.pending.push_back(sig);
        }
        !self.is_blocked(sig)
    }

    pub fn has_deliverable(&self) -> bool {
        self.pending.iter().any(|&sig| !self.is_blocked(sig))
    }

    /// Dequeue the oldest signal the mask lets through.
    pub fn take_deliverable(&mut self) -> Option<(Signal, SigAction)> {
        let pos = self.pending.iter().position(|&sig| !self.is_blocked(sig))?;
        let sig = self.pending.remove(pos)?;
        Some((sig, self.action(sig)))
    }

    fn take(&mut self, sig: Signal) -> bool {
        let before = self.pending.len();
        self.pending.retain(|&p| p != sig);
        self.pending.len() != before
    }

    /// State for a forked child: same actions and mask, nothing pending.
    pub fn fork(&self) -> Self {
        Self {
            actions: self.actions,
            pending: VecDeque::new(),
            mask: self.mask,
            stopped: false,
        }
    }

    /// Handlers point into the old image, so exec resets them to default.
    /// Ignored signals stay ignored.
    pub fn exec(&mut self) {
        for sig in Signal::all() {
            if let Disposition::Handler(_) = self.action(sig).disposition {
                self.actions[Self::slot(sig)] = SigAction::default_for(sig);
            }
        }
    }
}

/// Signal state of one process plus its wake channel, reachable from any
/// thread that raises signals at it.
#[derive(Debug, Default)]
pub struct Signals {
    state: Mutex<SignalState>,
    wake: Wake,
}

impl Signals {
    pub fn new(state: SignalState) -> Self {
        Self {
            state: Mutex::new(state),
            wake: Wake::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SignalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn wake(&self) -> &Wake {
        &self.wake
    }

    /// Queue `sig`. A deliverable signal from another process wakes the
    /// target out of whatever wait it is in; one raised by the process on
    /// itself is picked up at its post-syscall check.
    pub fn raise(&self, sig: Signal, from_self: bool) -> bool {
        let deliverable = self.lock().raise(sig);
        if deliverable && !from_self {
            self.wake.notify();
        }
        deliverable
    }

    /// A blocking call should give up with EINTR.
    pub fn interrupted(&self) -> bool {
        self.lock().has_deliverable()
    }

    /// Sleep for one poll interval or until woken. EINTR when a signal is
    /// waiting to be delivered.
    pub fn pause(&self) -> Result<(), Errno> {
        if self.interrupted() {
            return Err(Errno::EINTR);
        }
        self.wake.wait_timeout(POLL_INTERVAL);
        if self.interrupted() {
            return Err(Errno::EINTR);
        }
        Ok(())
    }

    /// Stay stopped until CONT arrives. Returns the signal that ended the
    /// process instead, if KILL came first.
    ///
    /// The stop mask replaces the current one for the duration. Further
    /// stop-class signals are dropped while stopped.
    pub fn stop_wait(&self, sig: Signal, stop_mask: SigSet) -> Result<(), Signal> {
        let saved = {
            let mut state = self.lock();
            state.stopped = true;
            state.set_mask(stop_mask)
        };
        info!("stopped by {}", sig);

        loop {
            {
                let mut state = self.lock();
                let actions = state.actions;
                state
                    .pending
                    .retain(|&p| !actions[SignalState::slot(p)].stops(p));
                if state.take(Signal::SIGKILL) {
                    state.stopped = false;
                    state.set_mask(saved);
                    return Err(Signal::SIGKILL);
                }
                if state.is_pending(Signal::SIGCONT) {
                    // a caught CONT stays queued for its handler
                    if state.action(Signal::SIGCONT).disposition == Disposition::Default {
                        state.take(Signal::SIGCONT);
                    }
                    state.stopped = false;
                    state.set_mask(saved);
                    debug!("continued");
                    return Ok(());
                }
            }
            self.wake.wait_timeout(POLL_INTERVAL);
        }
    }
}

/// Push the signal frame and enter `handler`.
///
/// The integer frame sits just below the current sp and the fp frame below
/// that; the handler's sp leaves 8 bytes under the fp frame. `saved_mask`
/// is the mask to reinstate on return.
pub fn invoke_handler(
    cpu: &mut CPU,
    memory: &mut AddressSpace,
    sig: Signal,
    handler: u32,
    saved_mask: SigSet,
    trampoline: u32,
) -> Result<(), KernelError> {
    let sp = cpu.reg(Register::Sp);
    if sp & 7 != 0 {
        return Err(KernelError::MisalignedFrame(sp));
    }

    let mut frame = [0u32; INT_FRAME_WORDS];
    frame[..32].copy_from_slice(&cpu.regs);
    frame[32] = cpu.hi;
    frame[33] = cpu.lo;
    frame[34] = cpu.pc;
    frame[35] = cpu.nextpc;
    frame[36] = saved_mask.bits();

    let int_base = sp.wrapping_sub(INT_FRAME_WORDS as u32 * 4);
    let fp_base = int_base.wrapping_sub(FPU_FRAME_WORDS as u32 * 4);
    memory.store_words(int_base, &frame)?;
    memory.store_words(fp_base, &cpu.fpu.save_frame())?;

    cpu.regs = [0; 32];
    cpu.hi = 0;
    cpu.lo = 0;
    cpu.pc = handler;
    cpu.nextpc = handler.wrapping_add(4);
    cpu.set_reg(Register::A0, sig.number());
    cpu.set_reg(Register::T9, handler);
    cpu.set_reg(Register::Sp, fp_base - 8);
    cpu.set_reg(Register::Ra, trampoline);
    Ok(())
}

/// Pop the frame pushed by [`invoke_handler`] and return the saved mask.
pub fn restore_frame(cpu: &mut CPU, memory: &mut AddressSpace) -> Result<SigSet, KernelError> {
    let fp_base = cpu.reg(Register::Sp).wrapping_add(8);
    let int_base = fp_base.wrapping_add(FPU_FRAME_WORDS as u32 * 4);
    let fp = memory.load_words(fp_base, FPU_FRAME_WORDS)?;
    let frame = memory.load_words(int_base, INT_FRAME_WORDS)?;

    let expected = int_base.wrapping_add(INT_FRAME_WORDS as u32 * 4);
    let found = frame[Register::Sp.idx()];
    if found != expected {
        return Err(KernelError::UnbalancedRestore { expected, found });
    }

    cpu.fpu.restore_frame(&fp)?;
    cpu.regs.copy_from_slice(&frame[..32]);
    cpu.hi = frame[32];
    cpu.lo = frame[33];
    cpu.pc = frame[34];
    cpu.nextpc = frame[35];
    Ok(SigSet::from_bits(frame[36]))
}
