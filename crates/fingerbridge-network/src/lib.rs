//! Network layer of the fingerprint bridge.
//!
//! This crate uploads sensor images to the remote matching service. It
//! handles connection setup with timeouts, streams the image body straight
//! from the sensor link into the socket, and interprets the response.
//!
//! # Components
//!
//! - **UploadRequest**: body length and metadata headers of one upload
//! - **UploadClient**: connects and sends the request head
//! - **UploadConnection**: streams the body and reads the response
//! - **UploadResult**: status code plus the optional match decision
//!
//! # Example
//!
//! ```no_run
//! use fingerbridge_network::{UploadClient, UploadConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = UploadClient::new(UploadConfig::default());
//! client.probe().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod request;
mod response;

pub use client::{UploadClient, UploadConfig, UploadConnection};
pub use error::{Result, UploadError};
pub use request::UploadRequest;
pub use response::{MatchDecision, UploadResult, parse_content_length, parse_status_code};
