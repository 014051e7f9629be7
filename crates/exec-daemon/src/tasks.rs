//! Builds the runtime schedule from the configured task list.
//!
//! Each configured action becomes a closure over its pin bindings, and the
//! pins it touches are collected into a pin plan the executive configures
//! during initialization. A pin claimed as both input and output is a
//! configuration error.

use exec_common::config::{ActionSpec, ExecutiveConfig, RateSpec, TaskConfig};
use exec_common::error::{ExecError, ExecResult};
use exec_runtime::gpio::{DigitalIo, PinMode};
use exec_runtime::schedule::{Rate, Schedule, Task, TaskAction};
use tracing::debug;

/// A populated schedule plus the pin modes it requires.
pub struct SchedulePlan {
    /// Tasks in dispatch order.
    pub schedule: Schedule,
    /// Every pin the tasks touch, with its direction.
    pub pins: Vec<(u8, PinMode)>,
}

/// Build the schedule and pin plan from configuration.
///
/// # Errors
///
/// Returns `ExecError::Config` if two tasks bind the same pin with
/// conflicting directions.
pub fn build_schedule(config: &ExecutiveConfig) -> ExecResult<SchedulePlan> {
    let mut schedule = Schedule::new();
    let mut pins: Vec<(u8, PinMode)> = Vec::new();

    for task in &config.tasks {
        let action = build_action(task, &mut pins)?;
        debug!(task = %task.name, rate = ?task.rate, "task registered");
        schedule.register(Task::new(task.name.clone(), to_rate(task.rate), action));
    }

    Ok(SchedulePlan { schedule, pins })
}

fn to_rate(spec: RateSpec) -> Rate {
    match spec {
        RateSpec::EveryTick => Rate::EveryTick,
        RateSpec::Rollover => Rate::Rollover,
        RateSpec::Frame(n) => Rate::Frame(n),
        RateSpec::Modulo(n) => Rate::Modulo(n),
    }
}

fn build_action(task: &TaskConfig, pins: &mut Vec<(u8, PinMode)>) -> ExecResult<TaskAction> {
    match task.action {
        ActionSpec::Toggle { pin } => {
            claim_pin(pins, pin, PinMode::Output, &task.name)?;
            Ok(Box::new(move |io: &mut dyn DigitalIo| {
                let level = io.read(pin);
                io.write(pin, !level);
            }))
        }
        ActionSpec::Follow {
            input,
            output,
            invert,
        } => {
            claim_pin(pins, input, PinMode::Input, &task.name)?;
            claim_pin(pins, output, PinMode::Output, &task.name)?;
            Ok(Box::new(move |io: &mut dyn DigitalIo| {
                let level = io.read(input);
                io.write(output, level != invert);
            }))
        }
    }
}

fn claim_pin(pins: &mut Vec<(u8, PinMode)>, pin: u8, mode: PinMode, task: &str) -> ExecResult<()> {
    match pins.iter().find(|(p, _)| *p == pin) {
        Some((_, existing)) if *existing != mode => Err(ExecError::Config(format!(
            "task '{task}': pin {pin} is already bound as {existing:?}"
        ))),
        Some(_) => Ok(()),
        None => {
            pins.push((pin, mode));
            Ok(())
        }
    }
}
