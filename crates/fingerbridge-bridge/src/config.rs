//! Configuration for the bridge.
//!
//! Resolution order: explicit path → `$FINGERBRIDGE_CONFIG` → defaults.
//! Every field has a default, so a file only needs the keys it changes:
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyAMA0"
//!
//! [upload]
//! host = "192.168.1.20"
//!
//! [enrollment]
//! fingers = ["thumb", "index", "middle"]
//! samples_per_finger = 3
//! ```

use crate::orchestrator::EnrollmentPlan;
use crate::presence::PresenceTiming;
use fingerbridge_core::constants::*;
use fingerbridge_core::{FingerLabel, SensorGeometry};
use fingerbridge_hardware::{Indicator, LogIndicator, SensorConfig, SysfsLedIndicator};
use fingerbridge_network::UploadConfig;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "FINGERBRIDGE_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub serial: SerialSettings,
    pub sensor: SensorSettings,
    pub upload: UploadSettings,
    pub enrollment: EnrollmentSettings,
    pub timing: TimingSettings,
    pub indicator: IndicatorSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    pub address: u32,
    pub password: u32,
    pub width: u32,
    pub height: u32,
    /// Bound on each header or body read.
    pub packet_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub connect_timeout_ms: u64,
    pub write_timeout_ms: u64,
    pub header_timeout_ms: u64,
    pub body_timeout_ms: u64,
    pub max_header_bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentSettings {
    /// Fingers captured in order.
    pub fingers: Vec<String>,
    pub samples_per_finger: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSettings {
    /// Continuous absence required before arming.
    pub quiet_period_ms: u64,
    pub idle_poll_ms: u64,
    pub poll_interval_ms: u64,
    pub lift_poll_ms: u64,
    pub lift_timeout_ms: u64,
    /// Upper bound on the clear-window check during cleanup.
    pub cleanup_idle_timeout_ms: u64,
    pub settle_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Log,
    Sysfs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub kind: IndicatorKind,
    /// sysfs value file of the green LED.
    pub green: PathBuf,
    /// sysfs value file of the red LED.
    pub red: PathBuf,
    pub active_low: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            address: BROADCAST_ADDRESS,
            password: DEFAULT_SENSOR_PASSWORD,
            width: DEFAULT_SENSOR_WIDTH,
            height: DEFAULT_SENSOR_HEIGHT,
            packet_timeout_ms: DEFAULT_PACKET_TIMEOUT_MS,
        }
    }
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_UPLOAD_PORT,
            path: DEFAULT_UPLOAD_PATH.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_BODY_TIMEOUT_MS,
            header_timeout_ms: DEFAULT_HEADER_TIMEOUT_MS,
            body_timeout_ms: DEFAULT_BODY_TIMEOUT_MS,
            max_header_bytes: MAX_RESPONSE_HEADER_BYTES,
        }
    }
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            fingers: DEFAULT_FINGERS.iter().map(|f| f.to_string()).collect(),
            samples_per_finger: DEFAULT_SAMPLES_PER_FINGER,
        }
    }
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            quiet_period_ms: DEFAULT_QUIET_PERIOD_MS,
            idle_poll_ms: DEFAULT_IDLE_POLL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            lift_poll_ms: DEFAULT_LIFT_POLL_MS,
            lift_timeout_ms: DEFAULT_LIFT_TIMEOUT_MS,
            cleanup_idle_timeout_ms: DEFAULT_LIFT_TIMEOUT_MS,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            kind: IndicatorKind::Log,
            green: PathBuf::from("/sys/class/gpio/gpio12/value"),
            red: PathBuf::from("/sys/class/gpio/gpio13/value"),
            active_low: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BridgeConfig {
    /// Load config: explicit path → `$FINGERBRIDGE_CONFIG` → defaults.
    ///
    /// An explicit or environment path must exist; the defaults apply only
    /// when neither is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let config = match path {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Check every derived value once, so later conversions cannot fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry()?;
        self.finger_sequence()?;
        self.samples_per_finger()?;
        if self.serial.port.trim().is_empty() {
            return Err(ConfigError::invalid("serial.port", "must not be empty"));
        }
        if self.upload.host.trim().is_empty() {
            return Err(ConfigError::invalid("upload.host", "must not be empty"));
        }
        if !self.upload.path.starts_with('/') {
            return Err(ConfigError::invalid("upload.path", "must start with '/'"));
        }
        if self.timing.poll_interval_ms == 0
            || self.timing.idle_poll_ms == 0
            || self.timing.lift_poll_ms == 0
        {
            return Err(ConfigError::invalid("timing", "poll intervals must be non-zero"));
        }
        Ok(())
    }

    pub fn geometry(&self) -> Result<SensorGeometry, ConfigError> {
        SensorGeometry::new(self.sensor.width, self.sensor.height)
            .map_err(|e| ConfigError::invalid("sensor.width/height", e.to_string()))
    }

    pub fn finger_sequence(&self) -> Result<Vec<FingerLabel>, ConfigError> {
        if self.enrollment.fingers.is_empty() {
            return Err(ConfigError::invalid(
                "enrollment.fingers",
                "at least one finger is required",
            ));
        }
        self.enrollment
            .fingers
            .iter()
            .map(|f| {
                FingerLabel::new(f)
                    .map_err(|e| ConfigError::invalid("enrollment.fingers", e.to_string()))
            })
            .collect()
    }

    pub fn samples_per_finger(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.enrollment.samples_per_finger).ok_or_else(|| {
            ConfigError::invalid("enrollment.samples_per_finger", "must be at least 1")
        })
    }

    pub fn enrollment_plan(&self) -> Result<EnrollmentPlan, ConfigError> {
        Ok(EnrollmentPlan {
            fingers: self.finger_sequence()?,
            samples_per_finger: self.samples_per_finger()?,
        })
    }

    pub fn sensor_config(&self) -> SensorConfig {
        SensorConfig {
            address: self.sensor.address,
            password: self.sensor.password,
            packet_timeout: Duration::from_millis(self.sensor.packet_timeout_ms),
        }
    }

    pub fn upload_config(&self) -> UploadConfig {
        UploadConfig {
            host: self.upload.host.clone(),
            port: self.upload.port,
            path: self.upload.path.clone(),
            connect_timeout: Duration::from_millis(self.upload.connect_timeout_ms),
            write_timeout: Duration::from_millis(self.upload.write_timeout_ms),
            header_timeout: Duration::from_millis(self.upload.header_timeout_ms),
            body_timeout: Duration::from_millis(self.upload.body_timeout_ms),
            max_header_bytes: self.upload.max_header_bytes,
        }
    }

    pub fn presence_timing(&self) -> PresenceTiming {
        let t = &self.timing;
        PresenceTiming {
            quiet_period: Duration::from_millis(t.quiet_period_ms),
            idle_poll: Duration::from_millis(t.idle_poll_ms),
            poll_interval: Duration::from_millis(t.poll_interval_ms),
            lift_poll: Duration::from_millis(t.lift_poll_ms),
            lift_timeout: Duration::from_millis(t.lift_timeout_ms),
        }
    }

    pub fn cleanup_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.cleanup_idle_timeout_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.timing.settle_ms)
    }

    pub fn indicator(&self) -> Indicator {
        match self.indicator.kind {
            IndicatorKind::Log => Indicator::Log(LogIndicator),
            IndicatorKind::Sysfs => Indicator::Sysfs(
                SysfsLedIndicator::new(&self.indicator.green, &self.indicator.red)
                    .active_low(self.indicator.active_low),
            ),
        }
    }
}
