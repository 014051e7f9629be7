//! Digital GPIO capability: the only interface the executive core calls
//! outward to.
//!
//! Tasks close over pin numbers and invoke the capability through
//! [`DigitalIo`]; the scheduling core never references specific pins
//! itself. Per-frame reads and writes are modeled as non-failing at the
//! trait: drivers handle I/O trouble internally with a log-and-skip
//! policy, because one pin's failure must never halt the periodic service
//! of every other task.

use exec_common::error::{ExecError, ExecResult};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Direction of a digital pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinMode {
    /// Pin is sampled by tasks.
    Input,
    /// Pin is driven by tasks.
    Output,
}

/// Digital I/O capability.
///
/// `configure_pin` runs once during startup, before the loop begins; only
/// `read` and `write` are on the per-frame hot path.
pub trait DigitalIo: Send {
    /// Configure a pin's direction. Startup only.
    ///
    /// # Errors
    ///
    /// Returns `ExecError::Gpio` if the pin cannot be configured; callers
    /// treat this as fatal during initialization.
    fn configure_pin(&mut self, pin: u8, mode: PinMode) -> ExecResult<()>;

    /// Sample a pin's current level.
    fn read(&mut self, pin: u8) -> bool;

    /// Drive a pin to the given level.
    fn write(&mut self, pin: u8, value: bool);
}

/// Highest pin index the simulated driver models.
const SIM_PIN_COUNT: usize = 64;

/// Simulated GPIO for tests and the `--simulated` daemon mode.
///
/// Levels are shared between directions, so reading back an output pin
/// returns the last written level, the way sysfs GPIO behaves.
#[derive(Debug)]
pub struct SimulatedGpio {
    levels: u64,
    modes: [Option<PinMode>; SIM_PIN_COUNT],
}

impl Default for SimulatedGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedGpio {
    /// Create a simulated driver with all pins unconfigured and low.
    #[must_use]
    pub fn new() -> Self {
        Self {
            levels: 0,
            modes: [None; SIM_PIN_COUNT],
        }
    }

    /// Drive a simulated input level (for tests).
    pub fn set_level(&mut self, pin: u8, value: bool) {
        if (pin as usize) < SIM_PIN_COUNT {
            if value {
                self.levels |= 1 << pin;
            } else {
                self.levels &= !(1 << pin);
            }
        }
    }

    /// Observe a pin's current level (for tests).
    #[must_use]
    pub fn level(&self, pin: u8) -> bool {
        (pin as usize) < SIM_PIN_COUNT && (self.levels >> pin) & 1 != 0
    }

    /// The configured mode of a pin, if any (for tests).
    #[must_use]
    pub fn mode(&self, pin: u8) -> Option<PinMode> {
        self.modes.get(pin as usize).copied().flatten()
    }
}

impl DigitalIo for SimulatedGpio {
    fn configure_pin(&mut self, pin: u8, mode: PinMode) -> ExecResult<()> {
        let slot = self
            .modes
            .get_mut(pin as usize)
            .ok_or_else(|| ExecError::Gpio(format!("pin {pin} is out of range")))?;
        *slot = Some(mode);
        Ok(())
    }

    fn read(&mut self, pin: u8) -> bool {
        self.level(pin)
    }

    fn write(&mut self, pin: u8, value: bool) {
        match self.mode(pin) {
            Some(PinMode::Output) => self.set_level(pin, value),
            other => {
                warn!(pin, ?other, "write to a pin not configured as output, skipping");
            }
        }
    }
}

/// Linux sysfs GPIO driver.
///
/// Pins are exported and given a direction during startup; per-frame reads
/// and writes go through the `value` files. The root is configurable so
/// tests can point the driver at a fixture directory.
#[derive(Debug)]
pub struct SysfsGpio {
    root: PathBuf,
    exported: Vec<u8>,
}

impl SysfsGpio {
    /// Create a driver over the standard `/sys/class/gpio` tree.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(PathBuf::from("/sys/class/gpio"))
    }

    /// Create a driver over an alternate sysfs root.
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            root,
            exported: Vec::new(),
        }
    }

    fn value_path(&self, pin: u8) -> PathBuf {
        self.root.join(format!("gpio{pin}")).join("value")
    }
}

impl Default for SysfsGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl DigitalIo for SysfsGpio {
    fn configure_pin(&mut self, pin: u8, mode: PinMode) -> ExecResult<()> {
        let pin_dir = self.root.join(format!("gpio{pin}"));

        if !pin_dir.exists() {
            fs::write(self.root.join("export"), pin.to_string())
                .map_err(|e| ExecError::Gpio(format!("failed to export pin {pin}: {e}")))?;
        }

        let direction = match mode {
            PinMode::Input => "in",
            PinMode::Output => "out",
        };
        fs::write(pin_dir.join("direction"), direction).map_err(|e| {
            ExecError::Gpio(format!("failed to set direction of pin {pin}: {e}"))
        })?;

        if !self.exported.contains(&pin) {
            self.exported.push(pin);
        }
        debug!(pin, ?mode, "sysfs pin configured");
        Ok(())
    }

    fn read(&mut self, pin: u8) -> bool {
        // Log-and-skip policy: a failed sample reads as low and the frame
        // goes on; the loop is never aborted for one pin's I/O trouble.
        match fs::read_to_string(self.value_path(pin)) {
            Ok(value) => value.trim() == "1",
            Err(e) => {
                warn!(pin, error = %e, "sysfs read failed, sampling low");
                false
            }
        }
    }

    fn write(&mut self, pin: u8, value: bool) {
        let level = if value { "1" } else { "0" };
        if let Err(e) = fs::write(self.value_path(pin), level) {
            warn!(pin, error = %e, "sysfs write failed, skipping");
        }
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        // Best-effort unexport; the kernel reclaims the pins either way.
        for &pin in &self.exported {
            let _ = fs::write(self.root.join("unexport"), pin.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_configure_and_rw() {
        let mut gpio = SimulatedGpio::new();

        gpio.configure_pin(18, PinMode::Output).unwrap();
        gpio.configure_pin(22, PinMode::Input).unwrap();
        assert_eq!(gpio.mode(18), Some(PinMode::Output));
        assert_eq!(gpio.mode(22), Some(PinMode::Input));

        assert!(!gpio.read(18));
        gpio.write(18, true);
        assert!(gpio.read(18));
        gpio.write(18, false);
        assert!(!gpio.read(18));
    }

    #[test]
    fn test_simulated_input_levels() {
        let mut gpio = SimulatedGpio::new();
        gpio.configure_pin(22, PinMode::Input).unwrap();

        gpio.set_level(22, true);
        assert!(gpio.read(22));

        // Writes to input pins are skipped.
        gpio.write(22, false);
        assert!(gpio.read(22));
    }

    #[test]
    fn test_simulated_rejects_out_of_range_pin() {
        let mut gpio = SimulatedGpio::new();
        assert!(gpio.configure_pin(64, PinMode::Output).is_err());
        assert!(!gpio.read(64));
    }

    #[test]
    fn test_sysfs_configure_and_rw() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir(root.join("gpio18")).unwrap();
        fs::write(root.join("gpio18").join("value"), "0").unwrap();

        let mut gpio = SysfsGpio::with_root(root.clone());
        gpio.configure_pin(18, PinMode::Output).unwrap();

        assert_eq!(
            fs::read_to_string(root.join("export")).unwrap().trim(),
            "18"
        );
        assert_eq!(
            fs::read_to_string(root.join("gpio18").join("direction"))
                .unwrap()
                .trim(),
            "out"
        );

        gpio.write(18, true);
        assert!(gpio.read(18));
        gpio.write(18, false);
        assert!(!gpio.read(18));
    }

    #[test]
    fn test_sysfs_read_failure_samples_low() {
        let dir = tempfile::tempdir().unwrap();
        let mut gpio = SysfsGpio::with_root(dir.path().to_path_buf());

        // No gpio5 directory: read degrades to low instead of failing.
        assert!(!gpio.read(5));
    }

    #[test]
    fn test_sysfs_configure_fails_without_pin_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut gpio = SysfsGpio::with_root(dir.path().to_path_buf());

        // The export write succeeds (plain file) but the kernel-created
        // gpio4 directory is absent, so setting the direction fails.
        assert!(gpio.configure_pin(4, PinMode::Output).is_err());
    }

    #[test]
    fn test_sysfs_unexports_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        fs::create_dir(root.join("gpio7")).unwrap();
        fs::write(root.join("gpio7").join("value"), "0").unwrap();

        {
            let mut gpio = SysfsGpio::with_root(root.clone());
            gpio.configure_pin(7, PinMode::Input).unwrap();
        }

        assert_eq!(
            fs::read_to_string(root.join("unexport")).unwrap().trim(),
            "7"
        );
    }
}
