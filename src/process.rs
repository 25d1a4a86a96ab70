use parking_lot::Mutex;
use std::io;
use std::process::{Child, ExitStatus};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const REAP_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct ProcessSlot {
    child: Child,
    cancelled: bool,
    exit: Option<ExitStatus>,
}

impl ProcessSlot {
    fn kill(&mut self) {
        if self.exit.is_some() {
            return;
        }
        // An already-exited child reports InvalidInput; reaping below settles it.
        if let Err(e) = self.child.kill() {
            if e.kind() != io::ErrorKind::InvalidInput {
                warn!(pid = self.child.id(), "failed to kill imaging tool: {}", e);
            }
        }
    }

    fn try_reap(&mut self) -> io::Result<Option<ExitStatus>> {
        if let Some(status) = self.exit {
            return Ok(Some(status));
        }
        let status = self.child.try_wait()?;
        self.exit = status;
        Ok(status)
    }
}

impl Drop for ProcessSlot {
    fn drop(&mut self) {
        if self.exit.is_none() {
            self.kill();
            match self.child.wait() {
                Ok(status) => debug!(pid = self.child.id(), %status, "reaped imaging tool"),
                Err(e) => warn!(pid = self.child.id(), "failed to reap imaging tool: {}", e),
            }
        }
    }
}

/// Shared owner of the imaging tool process.
///
/// Clones refer to the same child. When the last clone goes away an unreaped
/// child is killed and waited for, so no run can leak its process.
#[derive(Clone)]
pub struct ProcessHandle {
    slot: Arc<Mutex<ProcessSlot>>,
    pid: u32,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            slot: Arc::new(Mutex::new(ProcessSlot {
                child,
                cancelled: false,
                exit: None,
            })),
            pid,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Kills the child. A blocked read on its stdout then sees end-of-stream.
    ///
    /// A child that has already exited is reaped instead and the run is not
    /// marked as cancelled.
    pub fn cancel(&self) {
        let mut slot = self.slot.lock();
        if let Ok(Some(_)) = slot.try_reap() {
            return;
        }
        slot.cancelled = true;
        slot.kill();
    }

    pub fn is_cancelled(&self) -> bool {
        self.slot.lock().cancelled
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.slot.lock().exit
    }

    /// Kills immediately and reaps
    pub fn kill(&self) -> io::Result<ExitStatus> {
        self.slot.lock().kill();
        self.wait()
    }

    /// Lets the child exit on its own for up to `grace`, then kills it
    pub fn terminate(&self, grace: Duration) -> io::Result<ExitStatus> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.slot.lock().try_reap()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                debug!(pid = self.pid, "grace period elapsed, killing imaging tool");
                return self.kill();
            }
            thread::sleep(REAP_POLL_INTERVAL);
        }
    }

    /// Waits for the child to exit without holding the lock, so `cancel` stays responsive
    pub fn wait(&self) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = self.slot.lock().try_reap()? {
                return Ok(status);
            }
            thread::sleep(REAP_POLL_INTERVAL);
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use std::process::Command;

    fn spawn(script: &str) -> ProcessHandle {
        ProcessHandle::new(Command::new("/bin/sh").arg("-c").arg(script).spawn().unwrap())
    }

    #[test]
    fn test_cancel_after_exit_is_not_a_cancellation() {
        let process = spawn("exit 0");
        let deadline = Instant::now() + Duration::from_secs(10);
        // Let the child exit without reaping it, as the worker's poll would.
        while Instant::now() < deadline {
            thread::sleep(REAP_POLL_INTERVAL);
            if std::fs::read_to_string(format!("/proc/{}/stat", process.pid()))
                .map(|stat| stat.contains(") Z "))
                .unwrap_or(true)
            {
                break;
            }
        }

        process.cancel();

        assert!(!process.is_cancelled());
        assert!(process.wait().unwrap().success());
    }

    #[test]
    fn test_cancel_kills_running_child() {
        let process = spawn("exec sleep 30");
        process.cancel();

        assert!(process.is_cancelled());
        assert!(!process.wait().unwrap().success());
    }
}
