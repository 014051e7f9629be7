//! Frame executive daemon entry point.
//!
//! Integrates the executive loop, timer source, GPIO driver, and the
//! configured task schedule into a complete process with signal handling
//! and a two-phase startup: initialize (configure pins, arm the timer)
//! then run until signaled.

mod signals;
mod tasks;

use anyhow::{Context, Result};
use clap::Parser;
use exec_common::config::{ExecutiveConfig, GpioDriver};
use exec_common::state::RuntimeState;
use exec_runtime::executive::Executive;
use exec_runtime::gpio::{DigitalIo, PinMode, SimulatedGpio, SysfsGpio};
use exec_runtime::realtime::init_realtime;
use exec_runtime::timer::TickSource;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::signals::SignalHandler;
use crate::tasks::{build_schedule, SchedulePlan};

/// Frame executive command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "exec-daemon",
    about = "Frame executive daemon - fixed-rate periodic task dispatch",
    version,
    long_about = None
)]
struct Args {
    /// Path to an executive configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run with simulated GPIO (no hardware access).
    #[arg(long, short = 's')]
    simulated: bool,

    /// Maximum frames to service (0 = run until signaled).
    #[arg(long, default_value = "0")]
    max_frames: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "starting frame executive");

    // Load configuration
    let mut config = load_config(&args)?;

    // Override with command-line arguments
    if args.simulated {
        config.gpio.driver = GpioDriver::Simulated;
    }

    config.validate().context("Invalid configuration")?;

    info!(
        tick_interval = %humantime::format_duration(config.tick_interval),
        frames_per_rollover = config.frames_per_rollover,
        driver = ?config.gpio.driver,
        tasks = config.tasks.len(),
        "configuration loaded"
    );

    // Set up signal handling
    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    // Real-time environment (memory locking, RT priority)
    let rt_status = init_realtime(&config.realtime).context("Real-time initialization failed")?;
    debug!(?rt_status, "real-time environment");

    // Build the schedule and its pin plan from configuration
    let SchedulePlan { schedule, pins } =
        build_schedule(&config).context("Failed to build task schedule")?;

    let mut io = create_gpio_driver(&config);

    // Initialization phase: configure pins, then arm the timer
    let mut executive = Executive::new(&config, schedule);
    executive
        .initialize(io.as_mut(), &pins)
        .context("Executive initialization failed")?;

    // Fatal on failure: the executive cannot run its real-time duties
    // without its clock. No retry.
    #[cfg(target_os = "linux")]
    let timer = exec_runtime::timer::PosixIntervalTimer::arm(config.tick_interval)
        .context("Failed to arm interval timer")?;
    #[cfg(not(target_os = "linux"))]
    let timer = {
        warn!("POSIX interval timer unavailable on this platform, using thread timer");
        exec_runtime::timer::ThreadIntervalTimer::arm(config.tick_interval)
            .context("Failed to arm interval timer")?
    };

    run_loop(
        &mut executive,
        &timer,
        io.as_mut(),
        &signal_handler,
        args.max_frames,
    )?;

    shutdown(&mut executive, io.as_mut(), &pins, &signal_handler)
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!("exec_daemon={level},exec_runtime={level},exec_common={level}");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `EXEC_CONFIG_PATH` environment variable
/// 3. `/etc/frame-executive/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<ExecutiveConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "loading config from command-line argument");
        return ExecutiveConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var("EXEC_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "loading config from EXEC_CONFIG_PATH");
            return ExecutiveConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from EXEC_CONFIG_PATH={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "EXEC_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    // 3. System path
    let system_path = PathBuf::from("/etc/frame-executive/config.toml");
    if system_path.exists() {
        info!(?system_path, "loading config from system path");
        return ExecutiveConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {system_path:?}"));
    }

    // 4. Local development path
    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "loading config from local path");
        return ExecutiveConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {local_path:?}"));
    }

    // 5. Built-in defaults
    info!("no config file found, using built-in defaults");
    Ok(ExecutiveConfig::default())
}

/// Create the appropriate GPIO driver based on configuration.
fn create_gpio_driver(config: &ExecutiveConfig) -> Box<dyn DigitalIo> {
    match config.gpio.driver {
        GpioDriver::Simulated => {
            info!("using simulated GPIO driver");
            Box::new(SimulatedGpio::new())
        }
        GpioDriver::Sysfs => {
            info!(root = ?config.gpio.sysfs_root, "using sysfs GPIO driver");
            Box::new(SysfsGpio::with_root(config.gpio.sysfs_root.clone()))
        }
    }
}

/// Run the executive main loop until signaled, faulted, or the frame
/// limit is reached.
fn run_loop<T: TickSource>(
    executive: &mut Executive,
    timer: &T,
    io: &mut dyn DigitalIo,
    signal_handler: &SignalHandler,
    max_frames: u64,
) -> Result<()> {
    executive.start().context("Failed to start executive")?;
    info!(state = %executive.state(), "executive started, entering main loop");

    while executive.state() == RuntimeState::Run {
        // Check for shutdown signal; any delivered signal also wakes the
        // idle park, so this check is reached promptly.
        if signal_handler.shutdown_requested() {
            info!("shutdown signal received, leaving main loop");
            break;
        }

        let report = match executive.poll(timer, io) {
            Ok(Some(report)) => report,
            Ok(None) => continue,
            Err(e) => {
                error!("frame service failed: {e}");
                signal_handler.request_shutdown();
                break;
            }
        };

        // Check frame limit
        if max_frames > 0 && report.frames_serviced >= max_frames {
            info!(frames = report.frames_serviced, "maximum frame count reached");
            break;
        }

        // Periodic status logging (every 10000 frames)
        if report.frames_serviced % 10_000 == 0 {
            let metrics = executive.metrics();
            info!(
                frames = report.frames_serviced,
                mean_us = metrics.mean().map(|d| d.as_micros() as u64).unwrap_or(0),
                max_us = metrics.max().map(|d| d.as_micros() as u64).unwrap_or(0),
                dropped_ticks = executive.dropped_ticks(),
                "periodic status"
            );
        }
    }

    Ok(())
}

/// Graceful shutdown: halt the executive, drive outputs to a safe state,
/// and log final statistics.
fn shutdown(
    executive: &mut Executive,
    io: &mut dyn DigitalIo,
    pins: &[(u8, PinMode)],
    signal_handler: &SignalHandler,
) -> Result<()> {
    info!("shutting down...");

    if let Err(e) = executive.stop() {
        warn!("executive stop failed: {e}");
    }

    // Drive every configured output low before exit.
    for &(pin, mode) in pins {
        if mode == PinMode::Output {
            io.write(pin, false);
        }
    }

    let snapshot = executive.metrics().snapshot();
    info!(
        total_frames = snapshot.frames,
        dropped_ticks = snapshot.dropped_ticks,
        service_overruns = snapshot.service_overruns,
        rollovers = executive.rollovers(),
        signals = signal_handler.signal_count(),
        final_state = %executive.state(),
        "shutdown complete"
    );

    Ok(())
}
