use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use types::Errno;
use vm::AddressSpace;

use super::structs::{StructReader, StructWriter};
use super::{efault, Reply, SysResult};
use crate::task::Task;
use crate::wake::POLL_INTERVAL;

fn since_epoch() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

impl Task {
    pub(super) fn sys_time(&mut self, memory: &mut AddressSpace, t: u32) -> SysResult {
        let secs = since_epoch().as_secs() as u32;
        if t != 0 {
            memory.store_word(t, secs).map_err(efault)?;
        }
        Ok(Reply::Value(secs))
    }

    pub(super) fn sys_gettimeofday(&mut self, memory: &mut AddressSpace, tv: u32) -> SysResult {
        if tv != 0 {
            let now = since_epoch();
            let mut w = StructWriter::new(self.registry().constants(), "timeval")?;
            w.set("tv_sec", now.as_secs())
                .set("tv_usec", now.subsec_micros() as u64);
            w.store(memory, tv)?;
        }
        Ok(Reply::Value(0))
    }

    /// Sleep on the wake channel so that a signal cuts it short.
    pub(super) fn sys_nanosleep(&mut self, memory: &mut AddressSpace, req: u32, rem: u32) -> SysResult {
        let constants = self.registry().constants();
        let r = StructReader::load(constants, "timespec", memory, req)?;
        let (sec, nsec) = (r.get("tv_sec"), r.get("tv_nsec"));
        if sec as i32 as i64 <= -1 || nsec >= 1_000_000_000 {
            return Err(Errno::EINVAL);
        }
        let deadline = Instant::now() + Duration::new(sec, nsec as u32);

        loop {
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Ok(Reply::Value(0));
            }
            if self.signals.interrupted() {
                if rem != 0 {
                    let mut w = StructWriter::new(constants, "timespec")?;
                    w.set("tv_sec", left.as_secs())
                        .set("tv_nsec", left.subsec_nanos() as u64);
                    w.store(memory, rem)?;
                }
                return Err(Errno::EINTR);
            }
            self.signals.wake().wait_timeout(left.min(POLL_INTERVAL));
        }
    }

    pub(super) fn sys_uname(&mut self, memory: &mut AddressSpace, buf: u32) -> SysResult {
        let version = concat!("mipsrun ", env!("CARGO_PKG_VERSION"));
        let mut w = StructWriter::new(self.registry().constants(), "utsname")?;
        w.set_str("sysname", "Linux")
            .set_str("nodename", "mips")
            .set_str("release", "2.6.18")
            .set_str("version", version)
            .set_str("machine", "MIPS R2000");
        w.store(memory, buf)?;
        Ok(Reply::Value(0))
    }
}
