//! Status indicator sinks.
//!
//! Two LEDs are driven: green for ready and success, red for failure, both
//! dark while busy. [`SysfsLedIndicator`] writes GPIO values through sysfs;
//! [`LogIndicator`] only records the signal in the log, for hosts without
//! LEDs.

use crate::error::Result;
use crate::traits::{Signal, StatusIndicator};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lamp states for one signal, as `(green, red)`.
fn lamps(signal: Signal) -> (bool, bool) {
    match signal {
        Signal::Off => (false, false),
        Signal::Ready | Signal::Success => (true, false),
        Signal::Failure => (false, true),
    }
}

/// Indicator that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    async fn signal(&mut self, signal: Signal) -> Result<()> {
        info!(%signal, "Status");
        Ok(())
    }
}

/// Two-LED indicator on sysfs GPIO value files.
///
/// # Examples
///
/// ```no_run
/// use fingerbridge_hardware::{Signal, StatusIndicator, SysfsLedIndicator};
///
/// # async fn run() -> fingerbridge_hardware::Result<()> {
/// let mut leds = SysfsLedIndicator::new(
///     "/sys/class/gpio/gpio12/value",
///     "/sys/class/gpio/gpio13/value",
/// );
/// leds.signal(Signal::Ready).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SysfsLedIndicator {
    green: PathBuf,
    red: PathBuf,
    active_low: bool,
}

impl SysfsLedIndicator {
    pub fn new(green: impl Into<PathBuf>, red: impl Into<PathBuf>) -> Self {
        Self {
            green: green.into(),
            red: red.into(),
            active_low: false,
        }
    }

    /// Invert the written levels for LEDs wired to sink current.
    pub fn active_low(mut self, active_low: bool) -> Self {
        self.active_low = active_low;
        self
    }

    async fn write_level(&self, path: &Path, lit: bool) -> Result<()> {
        let level = if lit != self.active_low { "1" } else { "0" };
        tokio::fs::write(path, level).await?;
        Ok(())
    }
}

impl StatusIndicator for SysfsLedIndicator {
    async fn signal(&mut self, signal: Signal) -> Result<()> {
        let (green, red) = lamps(signal);
        self.write_level(&self.green, green).await?;
        self.write_level(&self.red, red).await?;
        debug!(%signal, green, red, "LEDs updated");
        Ok(())
    }
}

/// Indicator chosen at startup.
#[derive(Debug, Clone)]
pub enum Indicator {
    Log(LogIndicator),
    Sysfs(SysfsLedIndicator),
}

impl StatusIndicator for Indicator {
    async fn signal(&mut self, signal: Signal) -> Result<()> {
        match self {
            Indicator::Log(log) => log.signal(signal).await,
            Indicator::Sysfs(leds) => leds.signal(signal).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Signal::Off, false, false)]
    #[case(Signal::Ready, true, false)]
    #[case(Signal::Success, true, false)]
    #[case(Signal::Failure, false, true)]
    fn test_lamp_mapping(#[case] signal: Signal, #[case] green: bool, #[case] red: bool) {
        assert_eq!(lamps(signal), (green, red));
    }

    #[tokio::test]
    async fn test_sysfs_writes_levels() {
        let dir = tempfile::tempdir().unwrap();
        let green = dir.path().join("green");
        let red = dir.path().join("red");
        let mut leds = SysfsLedIndicator::new(&green, &red);

        leds.signal(Signal::Failure).await.unwrap();
        assert_eq!(std::fs::read_to_string(&green).unwrap(), "0");
        assert_eq!(std::fs::read_to_string(&red).unwrap(), "1");

        leds.signal(Signal::Ready).await.unwrap();
        assert_eq!(std::fs::read_to_string(&green).unwrap(), "1");
        assert_eq!(std::fs::read_to_string(&red).unwrap(), "0");
    }

    #[tokio::test]
    async fn test_sysfs_active_low_inverts() {
        let dir = tempfile::tempdir().unwrap();
        let green = dir.path().join("green");
        let red = dir.path().join("red");
        let mut leds = SysfsLedIndicator::new(&green, &red).active_low(true);

        leds.signal(Signal::Off).await.unwrap();
        assert_eq!(std::fs::read_to_string(&green).unwrap(), "1");
        assert_eq!(std::fs::read_to_string(&red).unwrap(), "1");
    }

    #[tokio::test]
    async fn test_sysfs_missing_path_is_error() {
        let mut leds = SysfsLedIndicator::new(
            "/nonexistent/fingerbridge/green",
            "/nonexistent/fingerbridge/red",
        );
        assert!(leds.signal(Signal::Ready).await.is_err());
    }

    #[tokio::test]
    async fn test_log_indicator_never_fails() {
        let mut indicator = Indicator::Log(LogIndicator);
        indicator.signal(Signal::Success).await.unwrap();
    }
}
