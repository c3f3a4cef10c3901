//! Signal numbers and block masks for the MIPS Linux ABI.
//!
//! Only the first 31 signals exist here; real-time signals are not emulated.
//! Mask bit `n - 1` stands for signal `n`.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use std::fmt;

/// Reaction taken when no handler is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Terminate,
    Ignore,
    Abort,
    Stop,
    Continue,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u32)]
pub enum Signal {
    /// Hangup detected on controlling terminal
    SIGHUP = 1,
    /// Interrupt from keyboard
    SIGINT = 2,
    /// Quit from keyboard
    SIGQUIT = 3,
    /// Illegal instruction
    SIGILL = 4,
    /// Trace/breakpoint trap
    SIGTRAP = 5,
    /// Abort signal
    SIGABRT = 6,
    SIGEMT = 7,
    /// Floating-point exception
    SIGFPE = 8,
    /// Kill signal (cannot be caught or blocked)
    SIGKILL = 9,
    /// Bus error
    SIGBUS = 10,
    /// Segmentation fault
    SIGSEGV = 11,
    /// Bad system call
    SIGSYS = 12,
    /// Broken pipe
    SIGPIPE = 13,
    SIGALRM = 14,
    SIGTERM = 15,
    SIGUSR1 = 16,
    SIGUSR2 = 17,
    /// Child stopped or terminated
    SIGCHLD = 18,
    SIGPWR = 19,
    SIGWINCH = 20,
    SIGURG = 21,
    SIGIO = 22,
    /// Stop process (cannot be caught or blocked)
    SIGSTOP = 23,
    SIGTSTP = 24,
    /// Continue if stopped
    SIGCONT = 25,
    SIGTTIN = 26,
    SIGTTOU = 27,
    SIGVTALRM = 28,
    SIGPROF = 29,
    SIGXCPU = 30,
    SIGXFSZ = 31,
}

impl Signal {
    pub const MAX: u32 = 31;

    pub fn from_number(num: u32) -> Option<Self> {
        Signal::try_from(num).ok()
    }

    pub fn number(self) -> u32 {
        self.into()
    }

    /// Mask bit for this signal.
    pub fn bit(self) -> u32 {
        1 << (self.number() - 1)
    }

    /// Kill and stop can never be blocked, caught or ignored.
    pub fn is_unblockable(self) -> bool {
        matches!(self, Signal::SIGKILL | Signal::SIGSTOP)
    }

    pub fn default_action(self) -> DefaultAction {
        use Signal::*;
        match self {
            SIGHUP | SIGINT | SIGEMT | SIGKILL | SIGPIPE | SIGALRM | SIGTERM | SIGUSR1
            | SIGUSR2 | SIGVTALRM | SIGPROF => DefaultAction::Terminate,
            SIGQUIT | SIGILL | SIGTRAP | SIGABRT | SIGFPE | SIGBUS | SIGSEGV | SIGSYS
            | SIGXCPU | SIGXFSZ => DefaultAction::Abort,
            SIGCHLD | SIGPWR | SIGWINCH | SIGURG | SIGIO => DefaultAction::Ignore,
            SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU => DefaultAction::Stop,
            SIGCONT => DefaultAction::Continue,
        }
    }

    /// Every signal in numeric order.
    pub fn all() -> impl Iterator<Item = Signal> {
        (1..=Self::MAX).filter_map(Signal::from_number)
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Block mask over signals 1..=31.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SigSet(u32);

impl SigSet {
    const UNBLOCKABLE: u32 = (1 << (Signal::SIGKILL as u32 - 1)) | (1 << (Signal::SIGSTOP as u32 - 1));

    pub const fn empty() -> Self {
        SigSet(0)
    }

    /// Build a stored mask; kill and stop bits are always dropped.
    pub const fn from_bits(bits: u32) -> Self {
        SigSet(bits & !Self::UNBLOCKABLE)
    }

    /// Every blockable signal.
    pub const fn full() -> Self {
        Self::from_bits(u32::MAX)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, sig: Signal) -> bool {
        self.0 & sig.bit() != 0
    }

    pub fn block(self, other: SigSet) -> Self {
        Self::from_bits(self.0 | other.0)
    }

    pub fn unblock(self, other: SigSet) -> Self {
        Self::from_bits(self.0 & !other.0)
    }

    pub fn with(self, sig: Signal) -> Self {
        Self::from_bits(self.0 | sig.bit())
    }

    pub fn without(self, sig: Signal) -> Self {
        SigSet(self.0 & !sig.bit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_and_stop_never_stored_in_mask() {
        let mask = SigSet::from_bits(u32::MAX);
        assert!(!mask.contains(Signal::SIGKILL));
        assert!(!mask.contains(Signal::SIGSTOP));
        assert!(mask.contains(Signal::SIGUSR1));
        assert!(!SigSet::empty().with(Signal::SIGKILL).contains(Signal::SIGKILL));
    }

    #[test]
    fn mips_numbering() {
        assert_eq!(Signal::SIGUSR1.number(), 16);
        assert_eq!(Signal::SIGCHLD.bit(), 1 << 17);
        assert_eq!(Signal::from_number(0), None);
        assert_eq!(Signal::from_number(32), None);
        assert_eq!(Signal::all().count(), 31);
    }

    #[test]
    fn default_actions() {
        assert_eq!(Signal::SIGCHLD.default_action(), DefaultAction::Ignore);
        assert_eq!(Signal::SIGTSTP.default_action(), DefaultAction::Stop);
        assert_eq!(Signal::SIGSEGV.default_action(), DefaultAction::Abort);
        assert_eq!(Signal::SIGCONT.default_action(), DefaultAction::Continue);
    }
}
