//! Device trait definitions.
//!
//! [`SerialLink`] is the byte transport under the sensor driver and
//! [`StatusIndicator`] is the side-effect sink for operator feedback. Both
//! have a real implementation and a mock one, so the capture cycle can be
//! exercised without a module on the bench.
//!
//! All traits use native `async fn` methods (Rust 1.90 + Edition 2024 RPITIT),
//! eliminating the need for the `async_trait` macro.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// Byte transport to the sensor module.
///
/// # Contract
///
/// - `read_exact` returns exactly `n` bytes or fails; it never hands back a
///   partial read. Running out of time is `FramingError::ShortRead`.
/// - `drain` never waits for more bytes to arrive.
///
/// # Examples
///
/// ```no_run
/// use fingerbridge_hardware::traits::SerialLink;
/// use fingerbridge_hardware::Result;
/// use std::time::Duration;
///
/// async fn read_header<L: SerialLink>(link: &mut L) -> Result<[u8; 9]> {
///     let bytes = link.read_exact(9, Duration::from_secs(5)).await?;
///     let mut header = [0u8; 9];
///     header.copy_from_slice(&bytes);
///     Ok(header)
/// }
/// ```
pub trait SerialLink {
    /// Read exactly `n` bytes, waiting at most `timeout` in total.
    ///
    /// # Errors
    ///
    /// - `HardwareError::Framing(ShortRead)` if fewer than `n` bytes arrived in time
    /// - `HardwareError::Io` / `HardwareError::Serial` on port failure
    async fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Bytes>;

    /// Write all bytes and flush them to the wire.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Discard every buffered unread byte and report how many were dropped.
    async fn drain(&mut self) -> Result<usize>;
}

/// Operator-visible status.
///
/// `Off` doubles as the busy indication: nothing is lit while the sensor is
/// capturing or the upload is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Off,
    Ready,
    Success,
    Failure,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Off => "off",
            Signal::Ready => "ready",
            Signal::Success => "success",
            Signal::Failure => "failure",
        };
        f.write_str(name)
    }
}

/// Sink for status signals.
///
/// Implementations must not block the control loop for long; a failing
/// indicator is logged by the caller and never aborts a capture.
pub trait StatusIndicator {
    async fn signal(&mut self, signal: Signal) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_display() {
        assert_eq!(Signal::Ready.to_string(), "ready");
        assert_eq!(Signal::Off.to_string(), "off");
        assert_eq!(Signal::Failure.to_string(), "failure");
    }
}
