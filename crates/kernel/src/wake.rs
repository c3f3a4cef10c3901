use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Poll interval for every interruptible wait.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Wake-up channel of one process.
///
/// Other threads notify it when they queue a signal the process can take
/// or when one of its children exits. The process only ever waits on it
/// at its own blocking points, never mid-instruction.
#[derive(Debug, Default)]
pub struct Wake {
    notified: Mutex<bool>,
    cond: Condvar,
}

impl Wake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        *self.notified.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.cond.notify_all();
    }

    /// Block until notified or `timeout` passes. Consumes the notification
    /// and reports whether there was one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = self
            .cond
            .wait_timeout_while(guard, timeout, |notified| !*notified)
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn notification_is_consumed_once() {
        let wake = Wake::new();
        wake.notify();
        assert!(wake.wait_timeout(Duration::from_millis(1)));
        assert!(!wake.wait_timeout(Duration::from_millis(1)));
    }

    #[test]
    fn wakes_across_threads() {
        let wake = Arc::new(Wake::new());
        let other = Arc::clone(&wake);
        let t = thread::spawn(move || other.wait_timeout(Duration::from_secs(5)));
        thread::sleep(Duration::from_millis(20));
        wake.notify();
        assert!(t.join().unwrap());
    }
}
