//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT set static atomic flags that the main loop reads
//! between frames. Handlers must be async-signal-safe, so they touch only
//! atomics. Delivery of either signal also interrupts the executive's
//! `pause()` park, so the loop observes the flag promptly even while idle.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::{debug, info};

static SHUTDOWN_FLAG: AtomicBool = AtomicBool::new(false);
static SIGNAL_COUNT: AtomicU32 = AtomicU32::new(0);

extern "C" fn shutdown_handler(_: libc::c_int) {
    SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
    SIGNAL_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Handle for checking shutdown requests.
#[derive(Debug, Clone, Copy)]
pub struct SignalHandler;

impl SignalHandler {
    /// Register shutdown signal handlers for SIGTERM and SIGINT.
    ///
    /// # Errors
    ///
    /// Returns an error if a handler cannot be installed.
    pub fn new() -> std::io::Result<Self> {
        #[cfg(unix)]
        {
            // SAFETY: the handler only stores to static atomics, which is
            // async-signal-safe.
            let previous = unsafe {
                let term = libc::signal(libc::SIGTERM, shutdown_handler as libc::sighandler_t);
                let int = libc::signal(libc::SIGINT, shutdown_handler as libc::sighandler_t);
                (term, int)
            };
            if previous.0 == libc::SIG_ERR || previous.1 == libc::SIG_ERR {
                return Err(std::io::Error::last_os_error());
            }
            debug!("shutdown signal handlers registered");
        }

        Ok(Self)
    }

    /// Check if shutdown has been requested.
    #[inline]
    #[must_use]
    pub fn shutdown_requested(&self) -> bool {
        SHUTDOWN_FLAG.load(Ordering::Relaxed)
    }

    /// Manually request shutdown (any thread).
    pub fn request_shutdown(&self) {
        info!("manual shutdown requested");
        SHUTDOWN_FLAG.store(true, Ordering::Relaxed);
    }

    /// Total number of shutdown signals received.
    #[must_use]
    pub fn signal_count(&self) -> u32 {
        SIGNAL_COUNT.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_shutdown_request() {
        let handler = SignalHandler::new().unwrap();

        handler.request_shutdown();
        assert!(handler.shutdown_requested());
        // No actual signal was delivered.
        assert_eq!(handler.signal_count(), 0);
    }
}
