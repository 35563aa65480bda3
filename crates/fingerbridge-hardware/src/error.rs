//! Error types for serial and sensor operations.
//!
//! Framing failures keep their [`FramingError`] identity so callers can tell
//! a corrupted packet from a module that answered but refused the command.

use fingerbridge_core::FramingError;
use fingerbridge_protocol::{Confirmation, Instruction, PacketType};

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while talking to the sensor module or an indicator.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// A packet could not be framed or unframed.
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    /// The module answered an instruction with a non-zero confirmation code.
    #[error("Sensor rejected {instruction}: {code}")]
    SensorNack {
        instruction: Instruction,
        code: Confirmation,
    },

    /// A well-formed packet of the wrong kind arrived.
    #[error("Unexpected packet: expected {expected}, got {actual}")]
    UnexpectedPacket {
        expected: &'static str,
        actual: PacketType,
    },

    /// A packet came from a different module address.
    #[error("Address mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    AddressMismatch { expected: u32, actual: u32 },

    /// An acknowledge arrived without a confirmation code.
    #[error("Empty acknowledge for {instruction}")]
    EmptyAcknowledge { instruction: Instruction },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Serial port error.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    pub fn nack(instruction: Instruction, code: Confirmation) -> Self {
        Self::SensorNack { instruction, code }
    }

    pub fn unexpected_packet(expected: &'static str, actual: PacketType) -> Self {
        Self::UnexpectedPacket { expected, actual }
    }

    /// Whether the failure came from the byte stream rather than the module's
    /// answer. After such a failure the link may hold stale bytes.
    pub fn is_framing(&self) -> bool {
        matches!(self, Self::Framing(_) | Self::AddressMismatch { .. })
    }

    /// Whether the reply was out of step with the request: garbled bytes, or
    /// a well-formed packet that belongs to an earlier exchange (such as the
    /// tail of an abandoned image download). The link should be drained
    /// before the next command.
    pub fn is_out_of_step(&self) -> bool {
        self.is_framing()
            || matches!(
                self,
                Self::UnexpectedPacket { .. } | Self::EmptyAcknowledge { .. }
            )
    }
}
