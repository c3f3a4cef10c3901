//! Process ids, parentage, exit statuses and signal routing.
//!
//! One `Registry` is shared by every process thread of a program run.
//! All bookkeeping goes through its table lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use log::debug;
use types::{ConstantTable, Errno, Signal};
use vm::PageAllocator;

use crate::config::Config;
use crate::process::ExitStatus;
use crate::signal::{SignalState, Signals};

pub type Pid = u32;

/// Lifecycle notifications for presentation layers.
pub trait RegistryListener: Send + Sync {
    fn started(&self, _pid: Pid, _name: &str) {}
    fn renamed(&self, _pid: Pid, _name: &str) {}
    fn exited(&self, _pid: Pid, _status: ExitStatus) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    /// Started by the host; the host reaps it.
    Host,
    Process(Pid),
    /// Parent exited first; nobody reaps it.
    Orphan,
}

#[derive(Debug)]
struct Entry {
    parent: Parent,
    pgid: Pid,
    sid: Pid,
    name: String,
    signals: Arc<Signals>,
    status: Option<ExitStatus>,
}

#[derive(Debug)]
struct Table {
    next_pid: Pid,
    procs: BTreeMap<Pid, Entry>,
}

pub struct Registry {
    config: Config,
    constants: ConstantTable,
    allocator: PageAllocator,
    table: Mutex<Table>,
    exited: Condvar,
    listeners: Mutex<Vec<Arc<dyn RegistryListener>>>,
}

impl Registry {
    pub fn new(config: Config) -> Arc<Self> {
        Self::with_constants(config, ConstantTable::builtin())
    }

    pub fn with_constants(config: Config, constants: ConstantTable) -> Arc<Self> {
        Arc::new(Self {
            config,
            constants,
            allocator: PageAllocator::new(),
            table: Mutex::new(Table {
                next_pid: 1,
                procs: BTreeMap::new(),
            }),
            exited: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    /// Frame pool shared by every address space of this run.
    pub fn allocator(&self) -> &PageAllocator {
        &self.allocator
    }

    pub fn add_listener(&self, listener: Arc<dyn RegistryListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify<F: Fn(&dyn RegistryListener)>(&self, f: F) {
        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            f(listener.as_ref());
        }
    }

    /// Allocate a pid. A child joins its parent's group and session; a
    /// host-started process leads its own.
    pub fn register(&self, parent: Option<Pid>, name: &str, signals: SignalState) -> (Pid, Arc<Signals>) {
        let signals = Arc::new(Signals::new(signals));
        let pid = {
            let mut table = self.lock();
            let pid = table.next_pid;
            table.next_pid += 1;
            let (parent, pgid, sid) = match parent.and_then(|p| table.procs.get(&p).map(|e| (p, e))) {
                Some((ppid, entry)) => (Parent::Process(ppid), entry.pgid, entry.sid),
                None => (Parent::Host, pid, pid),
            };
            table.procs.insert(
                pid,
                Entry {
                    parent,
                    pgid,
                    sid,
                    name: name.to_string(),
                    signals: Arc::clone(&signals),
                    status: None,
                },
            );
            pid
        };
        debug!("pid {} started: {}", pid, name);
        self.notify(|l| l.started(pid, name));
        (pid, signals)
    }

    pub fn rename(&self, pid: Pid, name: &str) {
        if let Some(entry) = self.lock().procs.get_mut(&pid) {
            entry.name = name.to_string();
        }
        self.notify(|l| l.renamed(pid, name));
    }

    pub fn name(&self, pid: Pid) -> Option<String> {
        self.lock().procs.get(&pid).map(|e| e.name.clone())
    }

    /// Record an exit. The entry stays as a zombie until its parent (or
    /// the host) collects it; orphans are dropped at once.
    pub fn exit(&self, pid: Pid, status: ExitStatus) {
        let parent_signals = {
            let mut table = self.lock();
            let parent = match table.procs.get_mut(&pid) {
                Some(entry) => {
                    entry.status = Some(status);
                    entry.parent
                }
                None => return,
            };

            // children of the exiting process lose their parent
            let children: Vec<Pid> = table
                .procs
                .iter()
                .filter(|(_, e)| e.parent == Parent::Process(pid))
                .map(|(&child, _)| child)
                .collect();
            for child in children {
                let zombie = table.procs.get(&child).is_some_and(|e| e.status.is_some());
                if zombie {
                    table.procs.remove(&child);
                } else if let Some(entry) = table.procs.get_mut(&child) {
                    entry.parent = Parent::Orphan;
                }
            }

            match parent {
                Parent::Process(ppid) => table.procs.get(&ppid).map(|e| Arc::clone(&e.signals)),
                Parent::Host => None,
                Parent::Orphan => {
                    table.procs.remove(&pid);
                    None
                }
            }
        };

        if let Some(signals) = parent_signals {
            signals.raise(Signal::SIGCHLD, false);
            signals.wake().notify();
        }
        self.exited.notify_all();
        self.notify(|l| l.exited(pid, status));
    }

    pub fn signals(&self, pid: Pid) -> Option<Arc<Signals>> {
        self.lock().procs.get(&pid).map(|e| Arc::clone(&e.signals))
    }

    /// Route kill(2). `sig == 0` only checks that a target exists.
    pub fn kill(&self, sender: Pid, pid: i32, sig: u32) -> Result<(), Errno> {
        let sig = match sig {
            0 => None,
            n => Some(Signal::from_number(n).ok_or(Errno::EINVAL)?),
        };

        let targets: Vec<(Pid, Arc<Signals>)> = {
            let table = self.lock();
            let sender_pgid = table.procs.get(&sender).map(|e| e.pgid);
            table
                .procs
                .iter()
                .filter(|(&p, e)| match pid {
                    p_ if p_ > 0 => p == p_ as Pid,
                    0 => Some(e.pgid) == sender_pgid,
                    -1 => p != sender,
                    group => e.pgid == group.unsigned_abs(),
                })
                .filter(|(_, e)| e.status.is_none())
                .map(|(&p, e)| (p, Arc::clone(&e.signals)))
                .collect()
        };
        if targets.is_empty() {
            return Err(Errno::ESRCH);
        }

        if let Some(sig) = sig {
            for (target, signals) in targets {
                let deliverable = signals.raise(sig, target == sender);
                debug!("pid {} -> pid {}: {} (deliverable={})", sender, target, sig, deliverable);
            }
        }
        Ok(())
    }

    /// Collect an exited child. `pid` follows waitpid: a positive pid, -1
    /// for any child, 0 for the caller's group, below -1 for group `-pid`.
    ///
    /// Blocks on the caller's wake channel unless `nohang`. A deliverable
    /// signal ends the wait with EINTR, but only after one more scan: the
    /// SIGCHLD of the child being waited for must not hide its status.
    pub fn wait_child(
        &self,
        parent: Pid,
        pid: i32,
        nohang: bool,
        signals: &Signals,
    ) -> Result<Option<(Pid, ExitStatus)>, Errno> {
        let mut interrupted = None;
        loop {
            {
                let mut table = self.lock();
                let own_pgid = table.procs.get(&parent).map(|e| e.pgid);
                let mut any = false;
                let mut found = None;
                for (&child, entry) in &table.procs {
                    if entry.parent != Parent::Process(parent) {
                        continue;
                    }
                    let matches = match pid {
                        -1 => true,
                        0 => Some(entry.pgid) == own_pgid,
                        p if p > 0 => child == p as Pid,
                        group => entry.pgid == group.unsigned_abs(),
                    };
                    if !matches {
                        continue;
                    }
                    any = true;
                    if let Some(status) = entry.status {
                        found = Some((child, status));
                        break;
                    }
                }
                if let Some((child, status)) = found {
                    table.procs.remove(&child);
                    return Ok(Some((child, status)));
                }
                if !any {
                    return Err(Errno::ECHILD);
                }
            }
            if nohang {
                return Ok(None);
            }
            if let Some(errno) = interrupted {
                return Err(errno);
            }
            if let Err(errno) = signals.pause() {
                interrupted = Some(errno);
            }
        }
    }

    /// Block the host until `pid` exits and reap it. None for an unknown
    /// pid.
    pub fn wait_for(&self, pid: Pid) -> Option<ExitStatus> {
        let mut table = self.lock();
        loop {
            match table.procs.get(&pid) {
                None => return None,
                Some(Entry { status: Some(status), .. }) => {
                    let status = *status;
                    table.procs.remove(&pid);
                    return Some(status);
                }
                Some(_) => {}
            }
            table = self.exited.wait(table).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Processes that have not exited yet.
    pub fn running(&self) -> usize {
        self.lock().procs.values().filter(|e| e.status.is_none()).count()
    }

    pub fn getppid(&self, pid: Pid) -> Pid {
        match self.lock().procs.get(&pid).map(|e| e.parent) {
            Some(Parent::Process(ppid)) => ppid,
            Some(Parent::Orphan) => 1,
            _ => 0,
        }
    }

    pub fn getpgid(&self, pid: Pid) -> Result<Pid, Errno> {
        self.lock().procs.get(&pid).map(|e| e.pgid).ok_or(Errno::ESRCH)
    }

    pub fn getsid(&self, pid: Pid) -> Result<Pid, Errno> {
        self.lock().procs.get(&pid).map(|e| e.sid).ok_or(Errno::ESRCH)
    }

    /// setpgid(pid, pgid) from `caller`; zeros mean the caller and the
    /// target's own pid.
    pub fn setpgid(&self, caller: Pid, pid: Pid, pgid: Pid) -> Result<(), Errno> {
        let target = if pid == 0 { caller } else { pid };
        let pgid = if pgid == 0 { target } else { pgid };
        let mut table = self.lock();
        let entry = table.procs.get_mut(&target).ok_or(Errno::ESRCH)?;
        if target != caller && entry.parent != Parent::Process(caller) {
            return Err(Errno::ESRCH);
        }
        if entry.sid == target {
            return Err(Errno::EPERM);
        }
        entry.pgid = pgid;
        Ok(())
    }

    /// Make `pid` the leader of a new session and group.
    pub fn setsid(&self, pid: Pid) -> Result<Pid, Errno> {
        let mut table = self.lock();
        if table.procs.values().any(|e| e.pgid == pid && e.status.is_none()) {
            let leads_own = table.procs.get(&pid).is_some_and(|e| e.pgid == pid);
            if leads_own {
                return Err(Errno::EPERM);
            }
        }
        let entry = table.procs.get_mut(&pid).ok_or(Errno::ESRCH)?;
        entry.pgid = pid;
        entry.sid = pid;
        Ok(pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::SigAction;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn registry() -> Arc<Registry> {
        Registry::new(Config::default())
    }

    #[test]
    fn pids_are_sequential_and_children_share_group() {
        let reg = registry();
        let (p1, _) = reg.register(None, "init", SignalState::new());
        let (p2, _) = reg.register(Some(p1), "child", SignalState::new());
        assert_eq!((p1, p2), (1, 2));
        assert_eq!(reg.getppid(p2), p1);
        assert_eq!(reg.getpgid(p2), Ok(p1));
        assert_eq!(reg.getsid(p2), Ok(p1));
        assert_eq!(reg.getppid(p1), 0);
    }

    #[test]
    fn kill_routes_to_target_and_checks_existence() {
        let reg = registry();
        let (p1, s1) = reg.register(None, "a", SignalState::new());
        let (p2, s2) = reg.register(Some(p1), "b", SignalState::new());

        reg.kill(p1, p2 as i32, Signal::SIGUSR1.number()).unwrap();
        assert!(s2.lock().is_pending(Signal::SIGUSR1));
        assert!(!s1.lock().is_pending(Signal::SIGUSR1));
        assert!(s2.wake().wait_timeout(std::time::Duration::from_millis(1)));

        assert_eq!(reg.kill(p1, 99, 0), Err(Errno::ESRCH));
        assert_eq!(reg.kill(p1, p2 as i32, 0), Ok(()));
        assert_eq!(reg.kill(p1, p2 as i32, 64), Err(Errno::EINVAL));

        // -1 hits everybody but the sender
        reg.kill(p2, -1, Signal::SIGUSR2.number()).unwrap();
        assert!(s1.lock().is_pending(Signal::SIGUSR2));
        assert!(!s2.lock().is_pending(Signal::SIGUSR2));

        // group 0 means the sender's group, which includes itself
        reg.kill(p1, 0, Signal::SIGTERM.number()).unwrap();
        assert!(s1.lock().is_pending(Signal::SIGTERM));
        assert!(s2.lock().is_pending(Signal::SIGTERM));
    }

    #[test]
    fn wait_child_collects_zombies() {
        let reg = registry();
        let (parent, signals) = reg.register(None, "p", SignalState::new());
        assert_eq!(reg.wait_child(parent, -1, true, &signals), Err(Errno::ECHILD));

        let (child, _) = reg.register(Some(parent), "c", SignalState::new());
        assert_eq!(reg.wait_child(parent, -1, true, &signals), Ok(None));
        reg.exit(child, ExitStatus::Exited(7));
        assert_eq!(
            reg.wait_child(parent, child as i32, false, &signals),
            Ok(Some((child, ExitStatus::Exited(7))))
        );
        assert_eq!(reg.wait_child(parent, -1, true, &signals), Err(Errno::ECHILD));
    }

    #[test]
    fn blocked_wait_wakes_on_child_exit() {
        let reg = registry();
        let (parent, signals) = reg.register(None, "p", SignalState::new());
        let (child, _) = reg.register(Some(parent), "c", SignalState::new());

        let other = Arc::clone(&reg);
        let t = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(30));
            other.exit(child, ExitStatus::Exited(3));
        });
        // SIGCHLD is ignored by default, so the wait is not interrupted
        let got = reg.wait_child(parent, -1, false, &signals).unwrap();
        assert_eq!(got, Some((child, ExitStatus::Exited(3))));
        t.join().unwrap();
    }

    fn catching_sigchld() -> SignalState {
        let mut state = SignalState::new();
        let action = SigAction::from_guest(Signal::SIGCHLD, 0x40_0000, 0, 0);
        state.set_action(Signal::SIGCHLD, action).unwrap();
        state
    }

    #[test]
    fn caught_sigchld_does_not_hide_the_exit() {
        let reg = registry();
        let (parent, signals) = reg.register(None, "sh", catching_sigchld());
        let (child, _) = reg.register(Some(parent), "c", SignalState::new());

        let other = Arc::clone(&reg);
        let t = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(30));
            other.exit(child, ExitStatus::Exited(7));
        });
        let got = reg.wait_child(parent, child as i32, false, &signals);
        assert_eq!(got, Ok(Some((child, ExitStatus::Exited(7)))));
        // the handler still runs afterwards
        assert!(signals.lock().is_pending(Signal::SIGCHLD));
        t.join().unwrap();
    }

    #[test]
    fn unrelated_signal_interrupts_wait() {
        let reg = registry();
        let (parent, signals) = reg.register(None, "sh", catching_sigchld());
        let (_child, _) = reg.register(Some(parent), "c", SignalState::new());
        signals.raise(Signal::SIGCHLD, false);
        assert_eq!(reg.wait_child(parent, -1, false, &signals), Err(Errno::EINTR));
    }

    #[test]
    fn host_waits_for_first_process() {
        let reg = registry();
        let (pid, _) = reg.register(None, "main", SignalState::new());
        let other = Arc::clone(&reg);
        let t = thread::spawn(move || other.exit(pid, ExitStatus::Crashed));
        assert_eq!(reg.wait_for(pid), Some(ExitStatus::Crashed));
        assert_eq!(reg.wait_for(pid), None);
        t.join().unwrap();
    }

    #[test]
    fn orphans_are_not_kept() {
        let reg = registry();
        let (parent, _) = reg.register(None, "p", SignalState::new());
        let (child, _) = reg.register(Some(parent), "c", SignalState::new());
        reg.exit(parent, ExitStatus::Exited(0));
        assert_eq!(reg.getppid(child), 1);
        reg.exit(child, ExitStatus::Exited(0));
        assert_eq!(reg.running(), 0);
        assert!(reg.signals(child).is_none());
    }

    #[test]
    fn listeners_hear_lifecycle() {
        #[derive(Default)]
        struct Counter(AtomicUsize);
        impl RegistryListener for Counter {
            fn started(&self, _pid: Pid, _name: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
            fn renamed(&self, _pid: Pid, _name: &str) {
                self.0.fetch_add(10, Ordering::SeqCst);
            }
            fn exited(&self, _pid: Pid, _status: ExitStatus) {
                self.0.fetch_add(100, Ordering::SeqCst);
            }
        }

        let reg = registry();
        let counter = Arc::new(Counter::default());
        reg.add_listener(counter.clone());
        let (pid, _) = reg.register(None, "sh", SignalState::new());
        reg.rename(pid, "ls");
        assert_eq!(reg.name(pid).as_deref(), Some("ls"));
        reg.exit(pid, ExitStatus::Exited(0));
        assert_eq!(counter.0.load(Ordering::SeqCst), 111);
    }

    #[test]
    fn sessions_and_groups() {
        let reg = registry();
        let (p1, _) = reg.register(None, "a", SignalState::new());
        let (p2, _) = reg.register(Some(p1), "b", SignalState::new());
        assert_eq!(reg.setsid(p1), Err(Errno::EPERM));
        assert_eq!(reg.setsid(p2), Ok(p2));
        assert_eq!(reg.getsid(p2), Ok(p2));
        assert_eq!(reg.setpgid(p1, p2, 0), Err(Errno::EPERM));
    }
}
