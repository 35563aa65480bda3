use thiserror::Error;

/// Failures while framing or unframing a sensor packet.
///
/// Every variant is fatal to the exchange that produced it; no packet is
/// ever accepted partially.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("Bad start marker: expected 0xEF01, got 0x{0:04X}")]
    BadStartMarker(u16),

    #[error("Short read: expected {expected} bytes, got {received}")]
    ShortRead { expected: usize, received: usize },

    #[error("Bad checksum: computed 0x{expected:04X}, received 0x{actual:04X}")]
    BadChecksum { expected: u16, actual: u16 },

    #[error("Bad length field: {0} (must be at least 2)")]
    BadLength(u16),

    #[error("Unknown packet type: 0x{0:02X}")]
    UnknownPacketType(u8),

    #[error("Payload too large: {0} bytes")]
    PayloadTooLarge(usize),
}

#[derive(Error, Debug)]
pub enum Error {
    // Sensor protocol errors
    #[error("Framing error: {0}")]
    Framing(#[from] FramingError),

    // Domain validation errors
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid finger label: {0}")]
    InvalidFingerLabel(String),

    #[error("Invalid capture job: {0}")]
    InvalidJob(String),

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framing_error_display() {
        assert_eq!(
            FramingError::BadStartMarker(0x1234).to_string(),
            "Bad start marker: expected 0xEF01, got 0x1234"
        );
        assert_eq!(
            FramingError::BadChecksum {
                expected: 0x000A,
                actual: 0x000B
            }
            .to_string(),
            "Bad checksum: computed 0x000A, received 0x000B"
        );
    }

    #[test]
    fn test_framing_error_converts_into_error() {
        let err: Error = FramingError::ShortRead {
            expected: 9,
            received: 3,
        }
        .into();
        assert!(matches!(err, Error::Framing(FramingError::ShortRead { .. })));
        assert!(err.to_string().contains("expected 9 bytes, got 3"));
    }
}
