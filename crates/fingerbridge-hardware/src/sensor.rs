//! Sensor module driver.
//!
//! Wraps a [`SerialLink`] and speaks the packet protocol: every instruction
//! is one command packet answered by one acknowledge, and the image download
//! is followed by a run of data packets that the caller pulls one at a time
//! with [`SensorDriver::read_packet`].

use crate::error::{HardwareError, Result};
use crate::traits::SerialLink;
use fingerbridge_core::constants::{
    BROADCAST_ADDRESS, DEFAULT_PACKET_TIMEOUT_MS, DEFAULT_SENSOR_PASSWORD, HEADER_LEN,
};
use fingerbridge_protocol::{Confirmation, Instruction, Packet, PacketHeader, PacketType};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Static parameters of one sensor module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorConfig {
    pub address: u32,
    pub password: u32,
    /// Upper bound for reading a header, and again for its body.
    pub packet_timeout: Duration,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            address: BROADCAST_ADDRESS,
            password: DEFAULT_SENSOR_PASSWORD,
            packet_timeout: Duration::from_millis(DEFAULT_PACKET_TIMEOUT_MS),
        }
    }
}

/// Driver owning the serial link to the module.
///
/// # Examples
///
/// ```no_run
/// use fingerbridge_hardware::{SensorConfig, SensorDriver, SerialPortLink};
///
/// # async fn run() -> fingerbridge_hardware::Result<()> {
/// let link = SerialPortLink::open("/dev/ttyS0", 57_600)?;
/// let mut sensor = SensorDriver::new(link, SensorConfig::default());
/// sensor.verify_password().await?;
///
/// if sensor.finger_present().await? {
///     println!("finger on the window");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SensorDriver<L> {
    link: L,
    config: SensorConfig,
}

impl<L: SerialLink> SensorDriver<L> {
    pub fn new(link: L, config: SensorConfig) -> Self {
        Self { link, config }
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    /// Send one instruction with its parameter block.
    pub async fn send_command(&mut self, instruction: Instruction, params: &[u8]) -> Result<()> {
        let packet = Packet::command(self.config.address, instruction.code(), params)?;
        trace!(%instruction, "Sending command");
        self.link.write(&packet.encode()).await
    }

    /// Read one complete, checksum-verified packet.
    ///
    /// The header and the body are each bounded by the packet timeout.
    ///
    /// # Errors
    ///
    /// - `Framing(BadStartMarker | BadLength | ShortRead | BadChecksum | UnknownPacketType)`
    /// - `AddressMismatch` if the packet names another module
    pub async fn read_packet(&mut self) -> Result<Packet> {
        let timeout = self.config.packet_timeout;
        let head = self.link.read_exact(HEADER_LEN, timeout).await?;

        let mut header_bytes = [0u8; HEADER_LEN];
        header_bytes.copy_from_slice(&head);
        let header = PacketHeader::parse(&header_bytes)?;

        let rest = self.link.read_exact(header.body_len(), timeout).await?;
        let packet = header.into_packet(&rest)?;

        if packet.address != self.config.address {
            return Err(HardwareError::AddressMismatch {
                expected: self.config.address,
                actual: packet.address,
            });
        }

        trace!(%packet, "Received packet");
        Ok(packet)
    }

    /// Read the acknowledge answering `instruction`.
    async fn read_ack(&mut self, instruction: Instruction) -> Result<Confirmation> {
        let packet = self.read_packet().await?;
        if packet.packet_type != PacketType::Acknowledge {
            return Err(HardwareError::unexpected_packet(
                "Acknowledge",
                packet.packet_type,
            ));
        }
        packet
            .confirmation_code()
            .map(Confirmation)
            .ok_or(HardwareError::EmptyAcknowledge { instruction })
    }

    /// Run one instruction and require confirmation `0x00`.
    async fn execute(&mut self, instruction: Instruction, params: &[u8]) -> Result<()> {
        self.send_command(instruction, params).await?;
        let code = self.read_ack(instruction).await?;
        if !code.is_ok() {
            return Err(HardwareError::nack(instruction, code));
        }
        Ok(())
    }

    /// Handshake with the module password.
    ///
    /// # Errors
    ///
    /// `SensorNack` with `0x13` if the password is wrong; any framing error
    /// if the module is not answering.
    pub async fn verify_password(&mut self) -> Result<()> {
        let password = self.config.password.to_be_bytes();
        self.execute(Instruction::VerifyPassword, &password).await?;
        debug!("Sensor password verified");
        Ok(())
    }

    /// Ask the module to acquire an image and report whether a finger was
    /// on the window.
    ///
    /// `0x00` means present. `0x02` means absent, as does any other
    /// rejection, which is logged.
    pub async fn finger_present(&mut self) -> Result<bool> {
        self.send_command(Instruction::CaptureImage, &[]).await?;
        let code = self.read_ack(Instruction::CaptureImage).await?;
        match code {
            Confirmation::OK => Ok(true),
            Confirmation::NO_FINGER => Ok(false),
            other => {
                warn!(code = %other, "Image capture rejected, treating as no finger");
                Ok(false)
            }
        }
    }

    /// Start streaming the image buffer.
    ///
    /// On success the module follows up with Data packets and a final
    /// DataEnd, which the caller reads with [`read_packet`](Self::read_packet).
    pub async fn begin_download(&mut self) -> Result<()> {
        self.execute(Instruction::DownloadImage, &[]).await
    }

    /// Discard any bytes buffered on the link.
    pub async fn drain(&mut self) -> Result<usize> {
        self.link.drain().await
    }
}
