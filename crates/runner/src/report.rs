use kernel::{ExitStatus, Pid, RegistryListener};
use log::debug;

/// Process lifecycle events, at debug level.
pub struct LogListener;

impl RegistryListener for LogListener {
    fn started(&self, pid: Pid, name: &str) {
        debug!("started pid {} ({})", pid, name);
    }

    fn renamed(&self, pid: Pid, name: &str) {
        debug!("pid {} is now {}", pid, name);
    }

    fn exited(&self, pid: Pid, status: ExitStatus) {
        debug!("pid {} {}", pid, status);
    }
}
