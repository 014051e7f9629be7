//! Deterministic scheduling properties, stepped frame by frame with
//! simulated GPIO at the original program's rates: 500us ticks, 2000
//! frames per rollover.

use exec_common::config::ExecutiveConfig;
use exec_runtime::executive::Executive;
use exec_runtime::gpio::{PinMode, SimulatedGpio};
use exec_runtime::schedule::{Rate, Schedule, Task};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

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

fn start_executive(config: &ExecutiveConfig, schedule: Schedule, io: &mut SimulatedGpio) -> Executive {
    let mut executive = Executive::new(config, schedule);
    executive.initialize(io, &[]).unwrap();
    executive.start().unwrap();
    executive
}

/// One simulated second at 2 kHz: the every-tick task fires 2000 times,
/// the rollover task exactly once, and the frame index returns to 0.
#[test]
fn one_simulated_second_at_2khz() {
    let config = ExecutiveConfig::default();
    assert_eq!(config.tick_interval.as_micros(), 500);
    assert_eq!(config.frames_per_rollover, 2000);

    let every = Arc::new(AtomicU32::new(0));
    let rollover = Arc::new(AtomicU32::new(0));

    let mut schedule = Schedule::new();
    schedule.register(counting_task("always", Rate::EveryTick, &every));
    schedule.register(counting_task("once-per-second", Rate::Rollover, &rollover));

    let mut io = SimulatedGpio::new();
    let mut executive = start_executive(&config, schedule, &mut io);

    for _ in 0..2000 {
        executive.service_frame(1, &mut io);
    }

    assert_eq!(every.load(Ordering::Relaxed), 2000);
    assert_eq!(rollover.load(Ordering::Relaxed), 1);
    assert_eq!(executive.frame(), 0);
    assert_eq!(executive.rollovers(), 1);
}

/// The frame index always equals the serviced tick count modulo the
/// rollover length, across several wraps.
#[test]
fn frame_index_tracks_serviced_ticks() {
    let config = ExecutiveConfig {
        frames_per_rollover: 60,
        ..Default::default()
    };

    let mut io = SimulatedGpio::new();
    let mut executive = start_executive(&config, Schedule::new(), &mut io);

    for n in 1u64..=300 {
        executive.service_frame(1, &mut io);
        assert_eq!(u64::from(executive.frame()), n % 60, "after {n} ticks");
    }
}

/// At frame 0 both tasks fire and the earlier-registered action completes
/// before the later one begins.
#[test]
fn registration_order_is_dispatch_order() {
    let config = ExecutiveConfig {
        frames_per_rollover: 4,
        ..Default::default()
    };

    let log: Arc<Mutex<Vec<&str>>> = Arc::new(Mutex::new(Vec::new()));

    let mut schedule = Schedule::new();
    let always_log = Arc::clone(&log);
    schedule.register(Task::new(
        "always",
        Rate::EveryTick,
        Box::new(move |_io| always_log.lock().unwrap().push("always")),
    ));
    let rollover_log = Arc::clone(&log);
    schedule.register(Task::new(
        "rollover",
        Rate::Rollover,
        Box::new(move |_io| rollover_log.lock().unwrap().push("rollover")),
    ));

    let mut io = SimulatedGpio::new();
    let mut executive = start_executive(&config, schedule, &mut io);

    // Service up to and including the rollover frame.
    for _ in 0..4 {
        executive.service_frame(1, &mut io);
    }

    let entries = log.lock().unwrap();
    // The rollover pass appends "always" then "rollover", in that order.
    assert_eq!(entries[entries.len() - 2..], ["always", "rollover"]);
}

/// Backlog is dropped, not caught up: one frame advance per servicing
/// pass regardless of accrued ticks, with the remainder counted.
#[test]
fn overrun_backlog_is_dropped_and_counted() {
    let config = ExecutiveConfig {
        frames_per_rollover: 60,
        ..Default::default()
    };

    let every = Arc::new(AtomicU32::new(0));
    let mut schedule = Schedule::new();
    schedule.register(counting_task("always", Rate::EveryTick, &every));

    let mut io = SimulatedGpio::new();
    let mut executive = start_executive(&config, schedule, &mut io);

    let report = executive.service_frame(3, &mut io);

    assert_eq!(report.frame, 1);
    assert_eq!(report.dropped_ticks, 2);
    assert_eq!(executive.frames_serviced(), 1);
    assert_eq!(executive.dropped_ticks(), 2);
    assert_eq!(every.load(Ordering::Relaxed), 1);
}

/// The original program's wiring, end-to-end over simulated pins: the
/// heartbeat LED toggles once per rollover and the active-low button is
/// mirrored inverted onto the second LED at the base rate.
#[test]
fn original_wiring_over_simulated_pins() {
    let config = ExecutiveConfig {
        frames_per_rollover: 2000,
        ..Default::default()
    };

    const LED1: u8 = 18;
    const LED2: u8 = 23;
    const BUTTON: u8 = 22;

    let mut schedule = Schedule::new();
    schedule.register(Task::new(
        "heartbeat",
        Rate::Rollover,
        Box::new(|io| {
            let level = io.read(LED1);
            io.write(LED1, !level);
        }),
    ));
    schedule.register(Task::new(
        "button-mirror",
        Rate::EveryTick,
        Box::new(|io| {
            let level = io.read(BUTTON);
            io.write(LED2, !level);
        }),
    ));

    let pins = [
        (LED1, PinMode::Output),
        (BUTTON, PinMode::Input),
        (LED2, PinMode::Output),
    ];

    let mut io = SimulatedGpio::new();
    let mut executive = Executive::new(&config, schedule);
    executive.initialize(&mut io, &pins).unwrap();
    executive.start().unwrap();

    // Button released (pulled high): LED2 stays low.
    io.set_level(BUTTON, true);
    for _ in 0..1999 {
        executive.service_frame(1, &mut io);
    }
    assert!(!io.level(LED1), "heartbeat must not fire before the rollover");
    assert!(!io.level(LED2));

    // The 2000th tick is the rollover: heartbeat toggles on.
    executive.service_frame(1, &mut io);
    assert!(io.level(LED1));

    // Press the button (active low): LED2 follows on the next frame.
    io.set_level(BUTTON, false);
    executive.service_frame(1, &mut io);
    assert!(io.level(LED2));

    // One more simulated second: heartbeat toggles back off.
    for _ in 0..2000 {
        executive.service_frame(1, &mut io);
    }
    assert!(!io.level(LED1));
}
