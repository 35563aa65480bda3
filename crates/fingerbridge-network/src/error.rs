use fingerbridge_hardware::HardwareError;
use thiserror::Error;

/// Errors that can occur while uploading one sample.
///
/// Every variant is fatal to the sample that produced it. A response whose
/// body cannot be interpreted is not an error: it degrades to a status-only
/// [`UploadResult`](crate::UploadResult).
#[derive(Debug, Error)]
pub enum UploadError {
    /// Host name did not resolve to any address
    #[error("Cannot resolve {0}")]
    Resolve(String),

    /// Connection attempt timed out
    #[error("Connection timeout after {0}ms")]
    ConnectTimeout(u64),

    /// Read operation timed out
    #[error("Read timeout after {0}ms")]
    ReadTimeout(u64),

    /// Write operation timed out
    #[error("Write timeout after {0}ms")]
    WriteTimeout(u64),

    /// Connection closed before a response arrived
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Response head exceeded the allowed size without a terminator
    #[error("Response header exceeds {0} bytes")]
    HeaderTooLarge(usize),

    /// Streamed body size differs from the declared Content-Length
    #[error("Body length mismatch: declared {declared} bytes, streamed {streamed}")]
    BodyLengthMismatch { declared: usize, streamed: usize },

    /// The sensor failed while its image was being streamed
    #[error("Sensor error: {0}")]
    Sensor(#[from] HardwareError),

    /// Low-level I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UploadError>;
