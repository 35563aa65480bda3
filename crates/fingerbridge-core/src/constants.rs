//! Core constants for the fingerprint bridge.
//!
//! This module collects the wire-level constants of the sensor packet
//! protocol and the deployment defaults used when no configuration file
//! overrides them.
//!
//! # Packet Structure
//!
//! Every packet exchanged with the sensor module has the same layout:
//!
//! ```text
//! EF 01 | AA AA AA AA | TT | LL LL | PAYLOAD ... | CC CC
//! ^^^^^   ^^^^^^^^^^^   ^^   ^^^^^                 ^^^^^
//! start   address (BE)  type length = payload + 2  checksum (BE)
//! ```
//!
//! The checksum is the 16-bit wrapping sum of the type byte, both length
//! bytes and every payload byte. The address is not covered by it.
//!
//! # Usage
//!
//! ```
//! use fingerbridge_core::constants::*;
//!
//! assert_eq!(START_CODE, 0xEF01);
//! assert_eq!(HEADER_LEN, 9);
//! assert_eq!(packed_image_len(DEFAULT_SENSOR_WIDTH, DEFAULT_SENSOR_HEIGHT), 36_864);
//! ```

// ============================================================================
// Packet Framing
// ============================================================================

/// Two-byte start marker opening every packet.
pub const START_CODE: u16 = 0xEF01;

/// Address used for every exchange (the module's factory default).
pub const BROADCAST_ADDRESS: u32 = 0xFFFF_FFFF;

/// Header size: start code (2) + address (4) + type (1) + length (2).
pub const HEADER_LEN: usize = 9;

/// Size of the trailing checksum, counted in the length field.
pub const CHECKSUM_LEN: usize = 2;

/// Largest payload a length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize - CHECKSUM_LEN;

// ============================================================================
// Packet Types
// ============================================================================

/// Command packet sent by the host.
pub const PACKET_COMMAND: u8 = 0x01;

/// Data packet, more data follows.
pub const PACKET_DATA: u8 = 0x02;

/// Acknowledge packet sent by the module.
pub const PACKET_ACK: u8 = 0x07;

/// Final data packet of a transfer.
pub const PACKET_DATA_END: u8 = 0x08;

// ============================================================================
// Sensor Instructions
// ============================================================================

/// Acquire an image into the module's image buffer.
///
/// The confirmation code doubles as the presence query: `0x00` means a
/// finger was on the window, `0x02` means nothing was detected.
pub const CMD_CAPTURE_IMAGE: u8 = 0x01;

/// Stream the image buffer to the host as Data/DataEnd packets.
pub const CMD_DOWNLOAD_IMAGE: u8 = 0x0A;

/// Handshake with the module password.
pub const CMD_VERIFY_PASSWORD: u8 = 0x13;

/// Factory default module password.
pub const DEFAULT_SENSOR_PASSWORD: u32 = 0x0000_0000;

/// Payload size of each Data packet the module emits by default.
pub const DEFAULT_DATA_PACKET_LEN: usize = 128;

// ============================================================================
// Sensor Geometry
// ============================================================================

/// Default sensor image width in pixels.
pub const DEFAULT_SENSOR_WIDTH: u32 = 256;

/// Default sensor image height in pixels.
pub const DEFAULT_SENSOR_HEIGHT: u32 = 288;

/// Pixel format tag announced to the matching service (two 4-bit pixels per byte).
pub const PACKED_FORMAT: &str = "packed4";

/// Byte size of one packed image of the given geometry.
pub const fn packed_image_len(width: u32, height: u32) -> usize {
    (width as usize * height as usize) / 2
}

// ============================================================================
// Serial Link
// ============================================================================

/// Default serial baud rate of the module.
pub const DEFAULT_BAUD_RATE: u32 = 57_600;

/// Default per-read timeout for packet headers and bodies (milliseconds).
pub const DEFAULT_PACKET_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// Presence Timing
// ============================================================================

/// Continuous absence required before arming for a new placement (milliseconds).
pub const DEFAULT_QUIET_PERIOD_MS: u64 = 800;

/// Interval between presence probes while waiting for a placement (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 80;

/// Interval between presence probes while confirming a clear window (milliseconds).
pub const DEFAULT_IDLE_POLL_MS: u64 = 120;

/// Interval between presence probes while waiting for a lift (milliseconds).
pub const DEFAULT_LIFT_POLL_MS: u64 = 150;

/// How long to wait for the finger to be lifted after an upload (milliseconds).
pub const DEFAULT_LIFT_TIMEOUT_MS: u64 = 7_000;

/// Settle delay at the end of cleanup (milliseconds).
pub const DEFAULT_SETTLE_MS: u64 = 30;

// ============================================================================
// Upload Service
// ============================================================================

/// Default matching service port.
pub const DEFAULT_UPLOAD_PORT: u16 = 3000;

/// Default matching service path.
pub const DEFAULT_UPLOAD_PATH: &str = "/upload-image";

/// Connect timeout for the matching service (milliseconds).
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 3_000;

/// Time allowed to receive the response head (milliseconds).
pub const DEFAULT_HEADER_TIMEOUT_MS: u64 = 5_000;

/// Time allowed to receive the response body (milliseconds).
pub const DEFAULT_BODY_TIMEOUT_MS: u64 = 10_000;

/// Largest response head accepted before giving up.
pub const MAX_RESPONSE_HEADER_BYTES: usize = 8_192;

// ============================================================================
// Enrollment Plan
// ============================================================================

/// Fingers captured during enrollment, in operator order.
pub const DEFAULT_FINGERS: [&str; 2] = ["thumb", "index"];

/// Samples captured for each finger during enrollment.
pub const DEFAULT_SAMPLES_PER_FINGER: u32 = 5;

/// Words on the command channel that cancel a job waiting for a finger.
pub const ABORT_WORDS: [&str; 3] = ["stop", "quit", "exit"];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_image_len_matches_deployment() {
        assert_eq!(packed_image_len(256, 288), 36_864);
        assert_eq!(packed_image_len(192, 192), 18_432);
    }

    #[test]
    fn test_default_image_spans_whole_data_packets() {
        let len = packed_image_len(DEFAULT_SENSOR_WIDTH, DEFAULT_SENSOR_HEIGHT);
        assert_eq!(len % DEFAULT_DATA_PACKET_LEN, 0);
    }
}
