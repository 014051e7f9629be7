//! Configuration structures for the frame executive.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for production deployment.

use crate::error::{ExecError, ExecResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level executive configuration.
///
/// The whole surface is fixed at startup: base tick interval, frames per
/// rollover, the task schedule, and the pin/capability bindings each task
/// uses. Nothing here is runtime-mutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutiveConfig {
    /// Base tick interval; the timer fires once per interval.
    #[serde(with = "humantime_serde")]
    pub tick_interval: Duration,

    /// Number of frames in one rollover period. With the default 500us
    /// interval, 2000 frames make the rollover land once per second.
    pub frames_per_rollover: u32,

    /// GPIO capability configuration.
    pub gpio: GpioConfig,

    /// Real-time environment configuration.
    pub realtime: RealtimeConfig,

    /// Metrics collection configuration.
    pub metrics: MetricsConfig,

    /// The task schedule. Registration order here is dispatch order.
    pub tasks: Vec<TaskConfig>,
}

impl Default for ExecutiveConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_micros(500),
            frames_per_rollover: 2000,
            gpio: GpioConfig::default(),
            realtime: RealtimeConfig::default(),
            metrics: MetricsConfig::default(),
            tasks: Vec::new(),
        }
    }
}

/// GPIO driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioConfig {
    /// GPIO driver type.
    pub driver: GpioDriver,

    /// Root of the sysfs GPIO tree. Overridable so tests can point the
    /// sysfs driver at a fixture directory.
    pub sysfs_root: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            driver: GpioDriver::Simulated,
            sysfs_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}

/// Supported GPIO drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GpioDriver {
    /// Simulated pins for testing.
    #[default]
    Simulated,
    /// Linux sysfs GPIO.
    Sysfs,
}

/// Real-time environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Enable real-time scheduling (requires privileges).
    pub enabled: bool,

    /// Scheduler policy: "fifo" or "rr" (round-robin).
    pub policy: SchedPolicy,

    /// Scheduler priority (1-99 for RT policies).
    pub priority: u8,

    /// Lock all memory pages (mlockall).
    pub lock_memory: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            policy: SchedPolicy::Fifo,
            priority: 90,
            lock_memory: true,
        }
    }
}

/// Scheduler policy for the executive loop thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    /// SCHED_FIFO: First-in-first-out real-time.
    #[default]
    Fifo,
    /// SCHED_RR: Round-robin real-time.
    Rr,
    /// SCHED_OTHER: Normal time-sharing (non-RT).
    Other,
}

/// Metrics collection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,

    /// Size of the service-time histogram ring buffer.
    pub histogram_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_size: 10_000,
        }
    }
}

/// One scheduled task: a name, a firing rate over the frame index, and the
/// hardware action it performs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task name for logging and diagnostics.
    pub name: String,

    /// Schedule predicate over the frame index.
    pub rate: RateSpec,

    /// Hardware action bound to this task.
    pub action: ActionSpec,
}

/// Declarative firing rate, as written in TOML.
///
/// Unit variants are plain strings (`rate = "rollover"`); parameterized
/// variants are single-key tables (`rate = { modulo = 40 }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSpec {
    /// Fire on every serviced tick (the base rate).
    EveryTick,
    /// Fire on frame 0, once per rollover period.
    Rollover,
    /// Fire on one specific frame index.
    Frame(u32),
    /// Fire whenever `frame % n == 0`.
    Modulo(u32),
}

/// Hardware action bound to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionSpec {
    /// Read an output pin and write back the opposite level.
    Toggle {
        /// Output pin to toggle.
        pin: u8,
    },
    /// Mirror an input pin onto an output pin.
    Follow {
        /// Input pin to sample.
        input: u8,
        /// Output pin to drive.
        output: u8,
        /// Invert the sampled level (for active-low inputs).
        #[serde(default)]
        invert: bool,
    },
}

impl ExecutiveConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Validate the configuration surface before the executive starts.
    ///
    /// # Errors
    ///
    /// Returns `ExecError::Config` for a zero tick interval, zero frames
    /// per rollover, out-of-range or degenerate rate predicates, or
    /// duplicate task names.
    pub fn validate(&self) -> ExecResult<()> {
        if self.tick_interval.is_zero() {
            return Err(ExecError::Config("tick_interval must be nonzero".into()));
        }
        if self.frames_per_rollover == 0 {
            return Err(ExecError::Config(
                "frames_per_rollover must be at least 1".into(),
            ));
        }

        let mut names = std::collections::HashSet::new();
        for task in &self.tasks {
            if task.name.is_empty() {
                return Err(ExecError::Config("task name must not be empty".into()));
            }
            if !names.insert(task.name.as_str()) {
                return Err(ExecError::Config(format!(
                    "duplicate task name '{}'",
                    task.name
                )));
            }
            match task.rate {
                RateSpec::Frame(frame) if frame >= self.frames_per_rollover => {
                    return Err(ExecError::Config(format!(
                        "task '{}': frame {} is outside [0, {})",
                        task.name, frame, self.frames_per_rollover
                    )));
                }
                RateSpec::Modulo(0) => {
                    return Err(ExecError::Config(format!(
                        "task '{}': modulo rate must be nonzero",
                        task.name
                    )));
                }
                _ => {}
            }
        }

        Ok(())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
