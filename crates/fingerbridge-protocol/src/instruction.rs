//! Sensor instruction and confirmation codes.
//!
//! Only the instructions the bridge issues are modelled. Confirmation codes
//! cover the values the module documents, so a rejected instruction can be
//! logged with a readable reason.

use fingerbridge_core::constants::{
    CMD_CAPTURE_IMAGE, CMD_DOWNLOAD_IMAGE, CMD_VERIFY_PASSWORD,
};
use std::fmt;

/// Instructions sent to the sensor module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// Acquire an image; the reply tells whether a finger is present.
    CaptureImage,
    /// Stream the acquired image to the host.
    DownloadImage,
    /// Handshake with the module password.
    VerifyPassword,
}

impl Instruction {
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Instruction::CaptureImage => CMD_CAPTURE_IMAGE,
            Instruction::DownloadImage => CMD_DOWNLOAD_IMAGE,
            Instruction::VerifyPassword => CMD_VERIFY_PASSWORD,
        }
    }

    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            CMD_CAPTURE_IMAGE => Some(Instruction::CaptureImage),
            CMD_DOWNLOAD_IMAGE => Some(Instruction::DownloadImage),
            CMD_VERIFY_PASSWORD => Some(Instruction::VerifyPassword),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instruction::CaptureImage => "CaptureImage",
            Instruction::DownloadImage => "DownloadImage",
            Instruction::VerifyPassword => "VerifyPassword",
        };
        write!(f, "{name}(0x{:02X})", self.code())
    }
}

/// Confirmation code carried in the first payload byte of an acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Confirmation(pub u8);

impl Confirmation {
    pub const OK: Confirmation = Confirmation(0x00);
    pub const PACKET_ERROR: Confirmation = Confirmation(0x01);
    pub const NO_FINGER: Confirmation = Confirmation(0x02);
    pub const ENROLL_FAILED: Confirmation = Confirmation(0x03);
    pub const UPLOAD_FAILED: Confirmation = Confirmation(0x0F);
    pub const WRONG_PASSWORD: Confirmation = Confirmation(0x13);
    pub const NO_VALID_IMAGE: Confirmation = Confirmation(0x15);

    #[must_use]
    pub fn is_ok(&self) -> bool {
        *self == Self::OK
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self.0 {
            0x00 => "command executed",
            0x01 => "error receiving packet",
            0x02 => "no finger on sensor",
            0x03 => "failed to enroll finger",
            0x06 => "image too disordered",
            0x07 => "too few feature points",
            0x0F => "error uploading image",
            0x13 => "wrong password",
            0x15 => "no valid image in buffer",
            0x18 => "error writing flash",
            _ => "unknown confirmation code",
        }
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.0, self.description())
    }
}
