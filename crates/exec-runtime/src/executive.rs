//! The cooperative executive loop.
//!
//! Two logical states during operation: **Idle** (no unserviced tick; the
//! loop context blocks in the tick source's park, yielding the processor)
//! and **Servicing** (a tick was observed; consume it, advance the frame
//! clock, dispatch the schedule, return to Idle). One poll call is one
//! turn of that state machine, so the caller can interleave its own
//! shutdown checks between turns.
//!
//! Overrun policy: if more than one tick accrued between polls, the
//! backlog is discarded and exactly one frame is advanced for that pass.
//! The dropped count is surfaced through [`FrameReport`] and the metrics;
//! it is an observable condition, never an error.

use crate::frame::{FrameAdvance, FrameClock};
use crate::gpio::{DigitalIo, PinMode};
use crate::schedule::Schedule;
use crate::timer::TickSource;
use exec_common::config::ExecutiveConfig;
use exec_common::error::{ExecError, ExecResult};
use exec_common::metrics::FrameMetrics;
use exec_common::state::{RuntimeState, StateMachine};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Result of one serviced frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Frame index this pass dispatched against.
    pub frame: u32,
    /// Whether this pass wrapped the frame clock.
    pub rollover: bool,
    /// Number of tasks fired in this frame.
    pub tasks_fired: u32,
    /// Ticks discarded as backlog for this pass (`observed - 1`).
    pub dropped_ticks: u32,
    /// Wall time spent dispatching this frame.
    pub service_time: Duration,
    /// Total frames serviced so far, including this one.
    pub frames_serviced: u64,
}

/// The executive: frame clock, schedule, lifecycle state, and metrics,
/// owned by the single loop context.
pub struct Executive {
    clock: FrameClock,
    schedule: Schedule,
    state: StateMachine,
    metrics: FrameMetrics,
    tick_interval: Duration,
    frames_serviced: u64,
    dropped_ticks: u64,
    rollovers: u64,
}

impl Executive {
    /// Create an executive from a validated configuration and a populated
    /// schedule. The schedule is frozen from here on.
    #[must_use]
    pub fn new(config: &ExecutiveConfig, schedule: Schedule) -> Self {
        let metrics = FrameMetrics::new(config.metrics.histogram_size, config.tick_interval);
        Self {
            clock: FrameClock::new(config.frames_per_rollover),
            schedule,
            state: StateMachine::new(),
            metrics,
            tick_interval: config.tick_interval,
            frames_serviced: 0,
            dropped_ticks: 0,
            rollovers: 0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.state.state()
    }

    /// Frame service metrics.
    #[must_use]
    pub fn metrics(&self) -> &FrameMetrics {
        &self.metrics
    }

    /// The registered schedule.
    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Current frame index.
    #[must_use]
    pub fn frame(&self) -> u32 {
        self.clock.frame()
    }

    /// Total frames serviced.
    #[must_use]
    pub fn frames_serviced(&self) -> u64 {
        self.frames_serviced
    }

    /// Total ticks discarded as overrun backlog.
    #[must_use]
    pub fn dropped_ticks(&self) -> u64 {
        self.dropped_ticks
    }

    /// Total rollover events.
    #[must_use]
    pub fn rollovers(&self) -> u64 {
        self.rollovers
    }

    /// Initialization phase: configure every pin in `pin_plan` through the
    /// capability. BOOT → INIT → ARMED.
    ///
    /// # Errors
    ///
    /// A pin configuration failure moves the executive to FAULT and is
    /// returned; the loop must not be entered without its pins.
    pub fn initialize(&mut self, io: &mut dyn DigitalIo, pin_plan: &[(u8, PinMode)]) -> ExecResult<()> {
        info!(
            tasks = self.schedule.len(),
            pins = pin_plan.len(),
            "initializing executive"
        );

        self.state.transition(RuntimeState::Init)?;

        for &(pin, mode) in pin_plan {
            if let Err(e) = io.configure_pin(pin, mode) {
                self.enter_fault(&format!("pin {pin} configuration failed: {e}"));
                return Err(e);
            }
            debug!(pin, ?mode, "pin configured");
        }

        self.state.transition(RuntimeState::Armed)?;
        info!("executive initialized, state: ARMED");
        Ok(())
    }

    /// Enter periodic operation. ARMED → RUN.
    ///
    /// # Errors
    ///
    /// Returns `ExecError::InvalidStateTransition` unless the executive
    /// has been initialized.
    pub fn start(&mut self) -> ExecResult<()> {
        if self.state.state() != RuntimeState::Armed {
            return Err(ExecError::InvalidStateTransition {
                from: self.state.state().to_string(),
                to: RuntimeState::Run.to_string(),
            });
        }

        info!(
            frames_per_rollover = self.clock.frames_per_rollover(),
            tick_interval_us = self.tick_interval.as_micros() as u64,
            "starting executive loop"
        );

        self.state.transition(RuntimeState::Run)?;
        Ok(())
    }

    /// One turn of the Idle/Servicing state machine.
    ///
    /// Consumes the tick counter. With no pending tick this parks in the
    /// source (Idle) and returns `None` on wake, so the caller can check
    /// its shutdown flag between turns. With a pending tick it services
    /// exactly one frame and returns the report.
    ///
    /// # Errors
    ///
    /// Returns `ExecError::Fault` when called outside the RUN state.
    pub fn poll<T: TickSource>(
        &mut self,
        source: &T,
        io: &mut dyn DigitalIo,
    ) -> ExecResult<Option<FrameReport>> {
        if self.state.state() != RuntimeState::Run {
            return Err(ExecError::Fault(format!(
                "cannot poll in state {}",
                self.state.state()
            )));
        }

        let observed = source.ticks().take();
        if observed == 0 {
            // Idle: yield the processor until the next notification.
            source.park();
            return Ok(None);
        }

        Ok(Some(self.service_frame(observed, io)))
    }

    /// The Servicing transition: advance the frame clock by exactly one,
    /// dispatch the schedule, account for the discarded backlog.
    ///
    /// `observed_ticks` is the value taken from the counter (≥ 1). Exposed
    /// so tests can step the executive deterministically; production
    /// callers go through [`Executive::poll`].
    pub fn service_frame(&mut self, observed_ticks: u32, io: &mut dyn DigitalIo) -> FrameReport {
        debug_assert!(observed_ticks >= 1);

        let start = Instant::now();
        let FrameAdvance { frame, rollover } = self.clock.advance();
        let tasks_fired = self.schedule.dispatch(frame, io);

        self.frames_serviced += 1;
        if rollover {
            self.rollovers += 1;
        }

        let dropped = observed_ticks.saturating_sub(1);
        if dropped > 0 {
            self.dropped_ticks += u64::from(dropped);
            warn!(
                frame,
                dropped,
                total_dropped = self.dropped_ticks,
                "tick backlog dropped"
            );
        }

        let service_time = start.elapsed();
        self.metrics.record(service_time, dropped);
        if service_time > self.tick_interval {
            warn!(
                frame,
                service_us = service_time.as_micros() as u64,
                interval_us = self.tick_interval.as_micros() as u64,
                "frame service exceeded the tick interval"
            );
        }

        trace!(frame, tasks_fired, "frame serviced");

        FrameReport {
            frame,
            rollover,
            tasks_fired,
            dropped_ticks: dropped,
            service_time,
            frames_serviced: self.frames_serviced,
        }
    }

    /// Leave periodic operation. RUN (or ARMED) → HALTED.
    ///
    /// # Errors
    ///
    /// Returns an error if the lifecycle transition is invalid.
    pub fn stop(&mut self) -> ExecResult<()> {
        info!(
            frames = self.frames_serviced,
            dropped = self.dropped_ticks,
            rollovers = self.rollovers,
            "stopping executive"
        );

        if matches!(self.state.state(), RuntimeState::Run | RuntimeState::Armed) {
            self.state.transition(RuntimeState::Halted)?;
        }

        Ok(())
    }

    /// Force the FAULT state with a reason.
    pub fn enter_fault(&mut self, reason: &str) {
        error!(reason, "entering FAULT state");
        self.state.enter_fault();
    }
}
