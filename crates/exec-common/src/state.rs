//! Lifecycle state machine for the executive.
//!
//! State transitions follow the two-phase startup the executive uses:
//! BOOT → INIT → ARMED → RUN → FAULT → HALTED
//!
//! Fault transitions are allowed from every pre-terminal state so that
//! startup failures (pin configuration, timer arming) land in FAULT.

use crate::error::{ExecError, ExecResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Runtime states for the executive lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeState {
    /// Initial power-on state.
    #[default]
    Boot,
    /// Configuration loading and pin setup.
    Init,
    /// Pins configured, schedule frozen; ready for the timer.
    Armed,
    /// Normal periodic operation.
    Run,
    /// Fault detected; the loop will not be entered (or re-entered).
    Fault,
    /// Clean shutdown; outputs set to safe values.
    Halted,
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boot => write!(f, "BOOT"),
            Self::Init => write!(f, "INIT"),
            Self::Armed => write!(f, "ARMED"),
            Self::Run => write!(f, "RUN"),
            Self::Fault => write!(f, "FAULT"),
            Self::Halted => write!(f, "HALTED"),
        }
    }
}

impl RuntimeState {
    /// Check if a transition to `target` is valid from the current state.
    #[must_use]
    pub fn can_transition_to(&self, target: RuntimeState) -> bool {
        use RuntimeState::{Armed, Boot, Fault, Halted, Init, Run};

        matches!(
            (self, target),
            // Normal forward progression
            (Boot, Init)
                | (Init, Armed)
                | (Armed, Run)
                // Fault transitions (allowed from any pre-terminal state)
                | (Boot, Fault)
                | (Init, Fault)
                | (Armed, Fault)
                | (Run, Fault)
                // Clean shutdown
                | (Run, Halted)
                | (Armed, Halted)
                | (Fault, Halted)
        )
    }

    /// Attempt to transition to `target`, returning error if invalid.
    pub fn transition_to(&mut self, target: RuntimeState) -> ExecResult<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(ExecError::InvalidStateTransition {
                from: self.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Returns true if the executive is in an operational state.
    #[must_use]
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Armed | Self::Run)
    }

    /// Returns true if the executive is in a fault or stopped state.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Fault | Self::Halted)
    }
}

/// State machine wrapper with transition history tracking.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: RuntimeState,
    previous: Option<RuntimeState>,
    transition_count: u64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine starting in BOOT.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RuntimeState::Boot,
            previous: None,
            transition_count: 0,
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> RuntimeState {
        self.current
    }

    /// Get the previous state (if any transition occurred).
    #[must_use]
    pub fn previous_state(&self) -> Option<RuntimeState> {
        self.previous
    }

    /// Get total number of transitions.
    #[must_use]
    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    /// Attempt a state transition.
    pub fn transition(&mut self, target: RuntimeState) -> ExecResult<()> {
        if self.current.can_transition_to(target) {
            self.previous = Some(self.current);
            self.current = target;
            self.transition_count += 1;
            Ok(())
        } else {
            Err(ExecError::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            })
        }
    }

    /// Force a transition to FAULT state (always succeeds from pre-terminal states).
    pub fn enter_fault(&mut self) {
        if self.current.can_transition_to(RuntimeState::Fault) {
            self.previous = Some(self.current);
            self.current = RuntimeState::Fault;
            self.transition_count += 1;
        }
    }
}
