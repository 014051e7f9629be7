//! Timer sources: the asynchronous notification path that feeds the tick
//! counter, and the blocking park the executive loop idles in.
//!
//! [`PosixIntervalTimer`] is the production source on Linux: a POSIX
//! per-process timer on `CLOCK_MONOTONIC` delivering `SIGALRM`, whose
//! handler does exactly one atomic increment. [`ThreadIntervalTimer`] is a
//! portable fallback backed by a worker thread, used on other platforms
//! and by tests that drive a live loop.

use crate::tick::TickCounter;
use exec_common::error::{ExecError, ExecResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A source of serviced ticks for the executive loop.
///
/// This is the seam between the loop and the timer facility: the loop only
/// ever consumes the counter and parks, it never talks to the OS timer
/// directly.
pub trait TickSource {
    /// The shared counter the notification path increments.
    fn ticks(&self) -> &TickCounter;

    /// Block the loop context until the next notification may have been
    /// delivered. Spurious returns are fine; the caller re-polls the
    /// counter on every wake.
    fn park(&self);
}

#[cfg(target_os = "linux")]
mod posix {
    use super::{AtomicBool, Duration, ExecError, ExecResult, Ordering, TickCounter, TickSource};
    use nix::sys::signal::{self, SaFlags, SigAction, SigEvent, SigHandler, SigSet, SigevNotify, Signal};
    use nix::sys::time::TimeSpec;
    use nix::sys::timer::{Expiration, Timer, TimerSetTimeFlags};
    use nix::time::ClockId;
    use tracing::info;

    /// Signal handlers cannot close over state, so the counter fed by the
    /// SIGALRM handler is process-static. It is reached exclusively through
    /// [`TickSource::ticks`]; the single-arm guard below keeps it owned by
    /// at most one timer at a time.
    static TICKS: TickCounter = TickCounter::new();
    static ARMED: AtomicBool = AtomicBool::new(false);

    extern "C" fn catch_tick(_signal: libc::c_int) {
        // Notification context: one atomic increment and nothing else.
        // No blocking, no allocation, no I/O, no dispatch.
        TICKS.notify();
    }

    /// Self-rearming POSIX interval timer delivering SIGALRM.
    pub struct PosixIntervalTimer {
        /// Held to keep the timer armed; dropping deletes the OS timer.
        _timer: Timer,
        interval: Duration,
    }

    impl PosixIntervalTimer {
        /// Arm a repeating timer that fires every `interval`, starting one
        /// interval after this call returns.
        ///
        /// # Errors
        ///
        /// Returns `ExecError::Timer` for a zero interval, if another
        /// instance is already armed in this process, or if the OS rejects
        /// the timer (resource exhaustion, permission denial). Callers
        /// treat this as fatal; there is no degraded mode without a clock.
        pub fn arm(interval: Duration) -> ExecResult<Self> {
            if interval.is_zero() {
                return Err(ExecError::Timer("interval must be nonzero".into()));
            }
            if ARMED.swap(true, Ordering::SeqCst) {
                return Err(ExecError::Timer(
                    "an interval timer is already armed in this process".into(),
                ));
            }

            let armed = Self::arm_inner(interval);
            if armed.is_err() {
                ARMED.store(false, Ordering::SeqCst);
            }
            armed
        }

        fn arm_inner(interval: Duration) -> ExecResult<Self> {
            let action = SigAction::new(
                SigHandler::Handler(catch_tick),
                SaFlags::empty(),
                SigSet::empty(),
            );
            // SAFETY: the handler body is a single atomic increment, which
            // is async-signal-safe.
            unsafe { signal::sigaction(Signal::SIGALRM, &action) }
                .map_err(|e| ExecError::Timer(format!("sigaction failed: {e}")))?;

            let event = SigEvent::new(SigevNotify::SigevSignal {
                signal: Signal::SIGALRM,
                si_value: 0,
            });
            let mut timer = Timer::new(ClockId::CLOCK_MONOTONIC, event)
                .map_err(|e| ExecError::Timer(format!("timer_create failed: {e}")))?;
            timer
                .set(
                    Expiration::Interval(TimeSpec::from_duration(interval)),
                    TimerSetTimeFlags::empty(),
                )
                .map_err(|e| ExecError::Timer(format!("timer_settime failed: {e}")))?;

            info!(
                interval_us = interval.as_micros() as u64,
                "interval timer armed"
            );
            Ok(Self {
                _timer: timer,
                interval,
            })
        }

        /// The configured tick interval.
        #[must_use]
        pub fn interval(&self) -> Duration {
            self.interval
        }
    }

    impl TickSource for PosixIntervalTimer {
        fn ticks(&self) -> &TickCounter {
            &TICKS
        }

        fn park(&self) {
            // Idle wait until any signal handler runs. A tick landing
            // between the caller's empty poll and this pause() is serviced
            // one interval late at worst; the timer keeps firing.
            nix::unistd::pause();
        }
    }

    impl Drop for PosixIntervalTimer {
        fn drop(&mut self) {
            // The OS timer is deleted by the inner Timer's drop; release
            // the arm guard and discard any tick from the final expiry.
            ARMED.store(false, Ordering::SeqCst);
            let _ = TICKS.take();
        }
    }
}

#[cfg(target_os = "linux")]
pub use posix::PosixIntervalTimer;

/// Portable interval timer backed by a worker thread.
///
/// The worker sleeps for the interval, increments the shared counter, and
/// unparks the loop thread. Jitter is bounded by the platform sleep
/// granularity, so this source suits tests and non-Linux hosts rather
/// than tight production rates.
pub struct ThreadIntervalTimer {
    ticks: Arc<TickCounter>,
    stop: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
    interval: Duration,
}

impl ThreadIntervalTimer {
    /// Arm a repeating timer that fires every `interval`.
    ///
    /// Must be called from the thread that will run the executive loop:
    /// the worker wakes that thread's park.
    ///
    /// # Errors
    ///
    /// Returns `ExecError::Timer` for a zero interval or if the worker
    /// thread cannot be spawned.
    pub fn arm(interval: Duration) -> ExecResult<Self> {
        if interval.is_zero() {
            return Err(ExecError::Timer("interval must be nonzero".into()));
        }

        let ticks = Arc::new(TickCounter::new());
        let stop = Arc::new(AtomicBool::new(false));
        let target = std::thread::current();
        let worker_ticks = Arc::clone(&ticks);
        let worker_stop = Arc::clone(&stop);

        let worker = std::thread::Builder::new()
            .name("tick-timer".into())
            .spawn(move || {
                while !worker_stop.load(Ordering::Relaxed) {
                    std::thread::sleep(interval);
                    worker_ticks.notify();
                    target.unpark();
                }
            })
            .map_err(|e| ExecError::Timer(format!("failed to spawn timer thread: {e}")))?;

        debug!(
            interval_us = interval.as_micros() as u64,
            "thread interval timer armed"
        );
        Ok(Self {
            ticks,
            stop,
            worker: Some(worker),
            interval,
        })
    }

    /// The configured tick interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl TickSource for ThreadIntervalTimer {
    fn ticks(&self) -> &TickCounter {
        &self.ticks
    }

    fn park(&self) {
        std::thread::park();
    }
}

impl Drop for ThreadIntervalTimer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // The worker notices the flag after at most one sleep interval.
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_timer_rejects_zero_interval() {
        assert!(ThreadIntervalTimer::arm(Duration::ZERO).is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_posix_timer_rejects_zero_interval() {
        assert!(PosixIntervalTimer::arm(Duration::ZERO).is_err());
    }

    #[test]
    fn test_thread_timer_accrues_ticks() {
        let timer = ThreadIntervalTimer::arm(Duration::from_millis(1)).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        let observed = timer.ticks().take();

        // Sleep granularity varies; at least a handful of expirations must
        // have landed over 50 intervals.
        assert!(observed >= 5, "only {observed} ticks accrued");
    }

    #[test]
    fn test_thread_timer_park_wakes_on_tick() {
        let timer = ThreadIntervalTimer::arm(Duration::from_millis(5)).unwrap();

        // A park with no pending tick must be woken by the next expiry.
        while timer.ticks().take() == 0 {
            timer.park();
        }
    }
}
