//! Serial link backed by the `serialport` crate.
//!
//! The port is opened in blocking mode with a short per-call timeout. Reads
//! loop until the requested count arrives or the overall deadline passes,
//! yielding to the runtime between slices so the single control task is
//! never parked for longer than one slice.

use crate::error::{HardwareError, Result};
use crate::traits::SerialLink;
use bytes::{Bytes, BytesMut};
use fingerbridge_core::FramingError;
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace};

/// Longest single blocking read.
const READ_SLICE: Duration = Duration::from_millis(20);

/// Serial link to the sensor module (8N1, no flow control).
pub struct SerialPortLink {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialPortLink {
    /// Open a serial port.
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyS0")
    /// * `baud_rate` - Baud rate (e.g., 57600)
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_SLICE)
            .open()
            .map_err(|e| {
                HardwareError::initialization_failed(format!("cannot open {path}: {e}"))
            })?;

        info!(path, baud_rate, "Opened serial port");

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl std::fmt::Debug for SerialPortLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPortLink")
            .field("path", &self.path)
            .finish()
    }
}

impl SerialLink for SerialPortLink {
    async fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Bytes> {
        let deadline = Instant::now() + timeout;
        let mut buf = BytesMut::zeroed(n);
        let mut filled = 0;

        while filled < n {
            let now = Instant::now();
            if now >= deadline {
                return Err(FramingError::ShortRead {
                    expected: n,
                    received: filled,
                }
                .into());
            }
            self.port.set_timeout((deadline - now).min(READ_SLICE))?;

            match self.port.read(&mut buf[filled..]) {
                Ok(0) => {}
                Ok(read) => {
                    trace!(read, filled, wanted = n, "Serial read");
                    filled += read;
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => {}
                Err(e) => return Err(e.into()),
            }
            tokio::task::yield_now().await;
        }

        Ok(buf.freeze())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        trace!(len = bytes.len(), "Serial write");
        Ok(())
    }

    async fn drain(&mut self) -> Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        self.port.clear(ClearBuffer::Input)?;
        if pending > 0 {
            debug!(pending, path = %self.path, "Drained serial input");
        }
        Ok(pending)
    }
}
