//! Shutdown signaling for the capture loop.
//!
//! SIGINT flips a shared flag and writes an eventfd that the capture loop
//! polls alongside the capture descriptor, so a sleeping loop wakes within
//! one scheduling quantum. The flag swap makes repeated signals no-ops.

use std::io;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Wakeable descriptor the capture loop polls alongside the pcap fd.
struct EventFd {
    fd: RawFd,
}

impl EventFd {
    fn new() -> io::Result<EventFd> {
        let fd = unsafe { libc::eventfd(0, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(EventFd { fd })
    }

    fn raise(&self) -> io::Result<()> {
        let value: u64 = 1;
        let rc = unsafe {
            libc::write(
                self.fd,
                &value as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

impl Drop for EventFd {
    fn drop(&mut self) {
        unsafe { libc::close(self.fd) };
    }
}

/// Shared stop switch for a capture session.
///
/// Cloneable so the signal handler, the capture loop, and the orchestrator
/// can all hold it; the underlying flag and wake descriptor are shared.
#[derive(Clone)]
pub struct StopHandle {
    stopped: Arc<AtomicBool>,
    wake: Arc<EventFd>,
}

impl StopHandle {
    pub fn new() -> io::Result<StopHandle> {
        Ok(StopHandle {
            stopped: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(EventFd::new()?),
        })
    }

    /// Request shutdown. Only the first call has any effect.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutdown requested");
        if let Err(e) = self.wake.raise() {
            tracing::error!("failed to wake capture loop: {e}");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Descriptor that becomes readable once shutdown is requested.
    pub fn wake_fd(&self) -> RawFd {
        self.wake.fd
    }
}

/// Route SIGINT to `handle`. Installed only for the capture subcommand.
pub fn install(handle: StopHandle) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || handle.stop())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_is_idempotent() {
        let handle = StopHandle::new().unwrap();
        assert!(!handle.is_stopped());
        handle.stop();
        assert!(handle.is_stopped());
        // A second stop must not error or reset anything; the eventfd has
        // already been raised and is not written again.
        handle.stop();
        assert!(handle.is_stopped());
    }

    #[test]
    fn wake_fd_becomes_readable_on_stop() {
        let handle = StopHandle::new().unwrap();
        let mut fds = [libc::pollfd {
            fd: handle.wake_fd(),
            events: libc::POLLIN,
            revents: 0,
        }];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, 0) };
        assert_eq!(rc, 0, "not readable before stop");

        handle.stop();
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), 1, 1000) };
        assert_eq!(rc, 1, "readable after stop");
    }
}
