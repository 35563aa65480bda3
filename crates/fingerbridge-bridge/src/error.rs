use crate::config::ConfigError;
use fingerbridge_hardware::HardwareError;
use fingerbridge_network::UploadError;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Errors surfaced by the orchestration layer.
///
/// Per-sample failures never appear here; they are folded into a
/// [`CycleOutcome`](crate::CycleOutcome). What remains is what stops a
/// whole command or the process.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Core(#[from] fingerbridge_core::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Response output failed: {0}")]
    Output(#[from] LinesCodecError),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
