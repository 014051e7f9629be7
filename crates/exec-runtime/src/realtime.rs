//! Real-time environment setup for the executive loop thread.
//!
//! Provides platform-specific initialization for deterministic execution:
//! memory locking (mlockall) to prevent page faults in the loop, and
//! real-time scheduling (SCHED_FIFO/SCHED_RR) so timer notifications are
//! serviced ahead of system housekeeping.

#![allow(unused_imports)] // Platform-specific code may not use all imports

use exec_common::config::{RealtimeConfig, SchedPolicy};
use exec_common::error::{ExecError, ExecResult};
use tracing::{debug, info, warn};

/// Result of real-time initialization.
#[derive(Debug, Clone)]
pub struct RealtimeStatus {
    /// Whether memory was locked successfully.
    pub memory_locked: bool,
    /// Applied scheduler policy.
    pub policy: Option<SchedPolicy>,
    /// Applied scheduler priority.
    pub priority: Option<u8>,
}

/// Initialize the real-time environment based on configuration.
///
/// Missing privileges (EPERM) degrade to warnings rather than failures:
/// the executive still runs, with best-effort timing.
///
/// # Errors
///
/// Returns an error only for unexpected OS failures while applying an
/// enabled feature.
pub fn init_realtime(config: &RealtimeConfig) -> ExecResult<RealtimeStatus> {
    if !config.enabled {
        info!("real-time scheduling disabled in configuration");
        return Ok(RealtimeStatus {
            memory_locked: false,
            policy: None,
            priority: None,
        });
    }

    info!("initializing real-time environment");

    let memory_locked = if config.lock_memory {
        lock_memory()?
    } else {
        false
    };

    let (policy, priority) = set_scheduler(config.policy, config.priority)?;

    let status = RealtimeStatus {
        memory_locked,
        policy,
        priority,
    };
    info!(?status, "real-time initialization complete");
    Ok(status)
}

/// Lock all current and future memory pages.
#[cfg(target_os = "linux")]
fn lock_memory() -> ExecResult<bool> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    debug!("locking memory pages with mlockall");

    match mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE) {
        Ok(()) => {
            info!("memory locked");
            Ok(true)
        }
        Err(e) => {
            // EPERM is common when running without CAP_IPC_LOCK
            if e == nix::errno::Errno::EPERM {
                warn!(
                    "mlockall failed with EPERM - running without CAP_IPC_LOCK. \
                     Page faults may occur during frame service."
                );
                Ok(false)
            } else {
                Err(ExecError::Config(format!("mlockall failed: {e}")))
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn lock_memory() -> ExecResult<bool> {
    warn!("mlockall not available on this platform");
    Ok(false)
}

/// Set real-time scheduler policy and priority for the loop thread.
#[cfg(target_os = "linux")]
fn set_scheduler(policy: SchedPolicy, priority: u8) -> ExecResult<(Option<SchedPolicy>, Option<u8>)> {
    let linux_policy = match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
        SchedPolicy::Other => {
            debug!("using SCHED_OTHER (non-RT) scheduling");
            return Ok((Some(SchedPolicy::Other), None));
        }
    };

    // Clamp priority to valid range (1-99 for RT policies)
    let clamped_priority = priority.clamp(1, 99);
    if clamped_priority != priority {
        warn!(
            original = priority,
            clamped = clamped_priority,
            "scheduler priority clamped to valid range"
        );
    }

    let param = libc::sched_param {
        sched_priority: i32::from(clamped_priority),
    };

    // SAFETY: sched_setscheduler is safe when called with valid parameters
    let result = unsafe { libc::sched_setscheduler(0, linux_policy, &param) };

    if result == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            warn!(
                "sched_setscheduler failed with EPERM - running without RT privileges. \
                 Consider granting CAP_SYS_NICE or running as root."
            );
            return Ok((None, None));
        }
        return Err(ExecError::Config(format!("sched_setscheduler failed: {err}")));
    }

    info!(?policy, priority = clamped_priority, "real-time scheduler configured");
    Ok((Some(policy), Some(clamped_priority)))
}

#[cfg(not(target_os = "linux"))]
fn set_scheduler(policy: SchedPolicy, priority: u8) -> ExecResult<(Option<SchedPolicy>, Option<u8>)> {
    warn!(?policy, priority, "real-time scheduling not available on this platform");
    Ok((None, None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_rt() {
        let config = RealtimeConfig {
            enabled: false,
            ..Default::default()
        };

        let status = init_realtime(&config).unwrap();
        assert!(!status.memory_locked);
        assert!(status.policy.is_none());
        assert!(status.priority.is_none());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_sched_other_is_a_no_op() {
        let (policy, priority) = set_scheduler(SchedPolicy::Other, 50).unwrap();
        assert_eq!(policy, Some(SchedPolicy::Other));
        assert!(priority.is_none());
    }
}
