//! Sensor and indicator hardware layer for the fingerprint bridge.
//!
//! This crate owns everything that touches a device:
//!
//! - [`SerialLink`]: byte transport with exact-count, time-bounded reads
//! - [`SerialPortLink`]: the `serialport`-backed link used in production
//! - [`SensorDriver`]: the packet-protocol driver (password handshake,
//!   presence query, image download)
//! - [`StatusIndicator`]: the ready/success/failure sink, with a logging
//!   sink and a sysfs GPIO two-LED sink
//! - [`mock`]: an in-memory sensor module and a recording indicator
//!
//! # Example
//!
//! ```no_run
//! use fingerbridge_hardware::{SensorConfig, SensorDriver, SerialPortLink};
//!
//! # async fn run() -> fingerbridge_hardware::Result<()> {
//! let link = SerialPortLink::open("/dev/ttyS0", 57_600)?;
//! let mut sensor = SensorDriver::new(link, SensorConfig::default());
//! sensor.verify_password().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`Result<T>`][error::Result] with a
//! [`HardwareError`]. Framing failures carry the underlying
//! [`FramingError`](fingerbridge_core::FramingError) unchanged.

pub mod error;
pub mod indicator;
pub mod mock;
pub mod sensor;
pub mod serial;
pub mod traits;

pub use error::{HardwareError, Result};
pub use indicator::{Indicator, LogIndicator, SysfsLedIndicator};
pub use sensor::{SensorConfig, SensorDriver};
pub use serial::SerialPortLink;
pub use traits::{SerialLink, Signal, StatusIndicator};
