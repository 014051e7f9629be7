//! Declarative task schedule and dispatcher.
//!
//! Each task carries a [`Rate`] predicate over the frame index instead of
//! hand-written frame-number checks in the loop, so adding or testing a
//! task never touches the loop's control flow. The schedule is populated
//! before the loop starts and is immutable afterwards; registration order
//! is dispatch order within a serviced frame.

use crate::gpio::DigitalIo;
use std::fmt;
use tracing::trace;

/// Schedule predicate over the frame index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rate {
    /// Fire on every serviced tick (the base rate).
    EveryTick,
    /// Fire on frame 0, once per rollover period.
    Rollover,
    /// Fire on one specific frame index.
    Frame(u32),
    /// Fire whenever `frame % n == 0`.
    Modulo(u32),
}

impl Rate {
    /// Evaluate the predicate against a frame index.
    #[must_use]
    pub fn matches(&self, frame: u32) -> bool {
        match self {
            Self::EveryTick => true,
            Self::Rollover => frame == 0,
            Self::Frame(n) => frame == *n,
            Self::Modulo(n) => *n != 0 && frame % n == 0,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EveryTick => write!(f, "every tick"),
            Self::Rollover => write!(f, "rollover"),
            Self::Frame(n) => write!(f, "frame {n}"),
            Self::Modulo(n) => write!(f, "every {n} frames"),
        }
    }
}

/// Action invoked when a task's predicate matches. Runs entirely within
/// the loop context, never within the notification context.
pub type TaskAction = Box<dyn FnMut(&mut dyn DigitalIo) + Send>;

/// One registered periodic task.
pub struct Task {
    name: String,
    rate: Rate,
    action: TaskAction,
    fired: u64,
}

impl Task {
    /// Create a task from a name, a rate predicate, and an action closed
    /// over its pin bindings.
    pub fn new(name: impl Into<String>, rate: Rate, action: TaskAction) -> Self {
        Self {
            name: name.into(),
            rate,
            action,
            fired: 0,
        }
    }

    /// Task name for logging and diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The task's rate predicate.
    #[must_use]
    pub fn rate(&self) -> Rate {
        self.rate
    }

    /// Number of times this task has fired.
    #[must_use]
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("rate", &self.rate)
            .field("fired", &self.fired)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of tasks; the dispatcher half of the executive.
#[derive(Debug, Default)]
pub struct Schedule {
    tasks: Vec<Task>,
}

impl Schedule {
    /// Create an empty schedule.
    #[must_use]
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Register a task. Registration order defines invocation order
    /// within a serviced frame.
    pub fn register(&mut self, task: Task) {
        self.tasks.push(task);
    }

    /// Number of registered tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// True when no tasks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The registered tasks, in dispatch order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Dispatch one frame: evaluate every task's predicate exactly once
    /// against `frame` and run matching actions synchronously, in
    /// registration order. Returns the number of tasks fired.
    ///
    /// A slow action delays all tasks after it in this frame; actions do
    /// not report results back into the scheduling core.
    pub fn dispatch(&mut self, frame: u32, io: &mut dyn DigitalIo) -> u32 {
        let mut fired = 0;
        for task in &mut self.tasks {
            if task.rate.matches(frame) {
                trace!(task = %task.name, frame, "dispatching task");
                (task.action)(io);
                task.fired += 1;
                fired += 1;
            }
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{PinMode, SimulatedGpio};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn counting_task(name: &str, rate: Rate, count: &Arc<AtomicU32>) -> Task {
        let count = Arc::clone(count);
        Task::new(
            name,
            rate,
            Box::new(move |_io| {
                count.fetch_add(1, Ordering::Relaxed);
            }),
        )
    }

    #[test]
    fn test_rate_predicates() {
        assert!(Rate::EveryTick.matches(0));
        assert!(Rate::EveryTick.matches(1999));

        assert!(Rate::Rollover.matches(0));
        assert!(!Rate::Rollover.matches(1));

        assert!(Rate::Frame(100).matches(100));
        assert!(!Rate::Frame(100).matches(101));

        assert!(Rate::Modulo(40).matches(0));
        assert!(Rate::Modulo(40).matches(80));
        assert!(!Rate::Modulo(40).matches(81));
        // Degenerate modulo never fires rather than dividing by zero.
        assert!(!Rate::Modulo(0).matches(0));
    }

    #[test]
    fn test_dispatch_fires_matching_tasks() {
        let every = Arc::new(AtomicU32::new(0));
        let rollover = Arc::new(AtomicU32::new(0));

        let mut schedule = Schedule::new();
        schedule.register(counting_task("every", Rate::EveryTick, &every));
        schedule.register(counting_task("rollover", Rate::Rollover, &rollover));

        let mut io = SimulatedGpio::new();
        assert_eq!(schedule.dispatch(0, &mut io), 2);
        assert_eq!(schedule.dispatch(1, &mut io), 1);
        assert_eq!(schedule.dispatch(2, &mut io), 1);

        assert_eq!(every.load(Ordering::Relaxed), 3);
        assert_eq!(rollover.load(Ordering::Relaxed), 1);
        assert_eq!(schedule.tasks()[0].fired(), 3);
        assert_eq!(schedule.tasks()[1].fired(), 1);
    }

    #[test]
    fn test_dispatch_preserves_registration_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut schedule = Schedule::new();
        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            schedule.register(Task::new(
                name,
                Rate::EveryTick,
                Box::new(move |_io| log.lock().unwrap().push(name)),
            ));
        }

        let mut io = SimulatedGpio::new();
        schedule.dispatch(0, &mut io);

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_tasks_touch_io() {
        let mut schedule = Schedule::new();
        schedule.register(Task::new(
            "set-high",
            Rate::EveryTick,
            Box::new(|io| io.write(4, true)),
        ));

        let mut io = SimulatedGpio::new();
        io.configure_pin(4, PinMode::Output).unwrap();
        schedule.dispatch(0, &mut io);

        assert!(io.level(4));
    }
}
