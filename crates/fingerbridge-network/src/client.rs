//! Streaming upload client.
//!
//! Sends one sensor image per connection as the body of an HTTP/1.1 `POST`.
//! The body is never assembled in memory: each Data packet payload read
//! from the sensor is written to the socket as soon as it is verified.
//!
//! # Architecture
//!
//! ```text
//! SensorDriver ──(Data/DataEnd payloads)──> UploadConnection ───(TCP)───> Matching service
//!                                                  │
//!                                                  └─< status line, headers, JSON body
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use fingerbridge_core::SensorGeometry;
//! use fingerbridge_hardware::{SensorConfig, SensorDriver, SerialPortLink};
//! use fingerbridge_network::{UploadClient, UploadConfig, UploadRequest};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let link = SerialPortLink::open("/dev/ttyS0", 57_600)?;
//! let mut sensor = SensorDriver::new(link, SensorConfig::default());
//!
//! let client = UploadClient::new(UploadConfig {
//!     host: "192.168.0.100".to_string(),
//!     ..UploadConfig::default()
//! });
//! let request = UploadRequest::detect(SensorGeometry::default(), 1);
//! let result = client.upload_from_sensor(&request, &mut sensor).await?;
//! println!("status {}", result.status_code);
//! # Ok(())
//! # }
//! ```
//!
//! # Timeout Handling
//!
//! Every network wait is bounded:
//! - Connection timeout
//! - Per-write timeout while streaming
//! - Header timeout for the whole response head
//! - Body timeout for the whole response body

use crate::error::{Result, UploadError};
use crate::request::UploadRequest;
use crate::response::{UploadResult, parse_content_length, parse_status_code};
use bytes::BytesMut;
use fingerbridge_core::constants::{
    DEFAULT_BODY_TIMEOUT_MS, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HEADER_TIMEOUT_MS,
    DEFAULT_UPLOAD_PATH, DEFAULT_UPLOAD_PORT, MAX_RESPONSE_HEADER_BYTES,
};
use fingerbridge_hardware::{HardwareError, SensorDriver, SerialLink};
use fingerbridge_protocol::PacketType;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, error, info, trace, warn};

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Configuration for the upload client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    pub header_timeout: Duration,
    pub body_timeout: Duration,
    pub max_header_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_UPLOAD_PORT,
            path: DEFAULT_UPLOAD_PATH.to_string(),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            write_timeout: Duration::from_millis(DEFAULT_BODY_TIMEOUT_MS),
            header_timeout: Duration::from_millis(DEFAULT_HEADER_TIMEOUT_MS),
            body_timeout: Duration::from_millis(DEFAULT_BODY_TIMEOUT_MS),
            max_header_bytes: MAX_RESPONSE_HEADER_BYTES,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Client for the matching service.
///
/// Holds no connection between uploads; each upload opens, streams, reads
/// and closes its own.
#[derive(Debug, Clone)]
pub struct UploadClient {
    config: UploadConfig,
}

impl UploadClient {
    pub fn new(config: UploadConfig) -> Self {
        debug!(host = %config.host, port = config.port, path = %config.path, "Creating upload client");
        Self { config }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    async fn resolve(&self) -> Result<SocketAddr> {
        let target = format!("{}:{}", self.config.host, self.config.port);
        let lookup = tokio::net::lookup_host((self.config.host.as_str(), self.config.port));
        match tokio::time::timeout(self.config.connect_timeout, lookup).await {
            Ok(Ok(mut addrs)) => addrs.next().ok_or(UploadError::Resolve(target)),
            Ok(Err(e)) => {
                warn!(%target, error = %e, "Address lookup failed");
                Err(UploadError::Resolve(target))
            }
            Err(_) => Err(UploadError::ConnectTimeout(millis(self.config.connect_timeout))),
        }
    }

    async fn connect(&self) -> Result<TcpStream> {
        let addr = self.resolve().await?;
        let stream =
            match tokio::time::timeout(self.config.connect_timeout, TcpStream::connect(addr)).await
            {
                Ok(Ok(stream)) => stream,
                Ok(Err(e)) => {
                    error!(%addr, error = %e, "Connection failed");
                    return Err(e.into());
                }
                Err(_) => {
                    warn!(%addr, timeout_ms = millis(self.config.connect_timeout), "Connection timeout");
                    return Err(UploadError::ConnectTimeout(millis(
                        self.config.connect_timeout,
                    )));
                }
            };

        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "Failed to set TCP_NODELAY");
        }
        Ok(stream)
    }

    /// Check that the service accepts connections.
    ///
    /// Opens and immediately closes one connection.
    pub async fn probe(&self) -> Result<()> {
        let mut stream = self.connect().await?;
        let _ = stream.shutdown().await;
        info!(host = %self.config.host, port = self.config.port, "Matching service reachable");
        Ok(())
    }

    /// Connect and send the request head.
    pub async fn open(&self, request: &UploadRequest) -> Result<UploadConnection> {
        let mut stream = self.connect().await?;
        let head = request.render_head(&self.config.host, self.config.port, &self.config.path);

        match tokio::time::timeout(self.config.write_timeout, stream.write_all(head.as_bytes()))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(UploadError::WriteTimeout(millis(self.config.write_timeout))),
        }

        trace!(filename = request.filename(), declared = request.declared_body_length(), "Request head sent");
        Ok(UploadConnection {
            stream,
            declared: request.declared_body_length(),
            streamed: 0,
            write_timeout: self.config.write_timeout,
            max_header_bytes: self.config.max_header_bytes,
        })
    }

    /// Open, stream the sensor's image, and read the response.
    pub async fn upload_from_sensor<L: SerialLink>(
        &self,
        request: &UploadRequest,
        sensor: &mut SensorDriver<L>,
    ) -> Result<UploadResult> {
        let mut connection = self.open(request).await?;
        let streamed = connection.stream_from_sensor(sensor).await?;
        let result = connection
            .read_response(self.config.header_timeout, self.config.body_timeout)
            .await?;

        info!(
            filename = request.filename(),
            streamed,
            status = result.status_code,
            "Upload complete"
        );
        Ok(result)
    }
}

/// One in-flight upload.
#[derive(Debug)]
pub struct UploadConnection {
    stream: TcpStream,
    declared: usize,
    streamed: usize,
    write_timeout: Duration,
    max_header_bytes: usize,
}

impl UploadConnection {
    pub fn declared(&self) -> usize {
        self.declared
    }

    pub fn streamed(&self) -> usize {
        self.streamed
    }

    /// Write one slice of the body.
    ///
    /// # Errors
    ///
    /// `BodyLengthMismatch` if the slice would overrun the declared length;
    /// nothing is written in that case.
    pub async fn send_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        let total = self.streamed + chunk.len();
        if total > self.declared {
            return Err(UploadError::BodyLengthMismatch {
                declared: self.declared,
                streamed: total,
            });
        }

        match tokio::time::timeout(self.write_timeout, self.stream.write_all(chunk)).await {
            Ok(Ok(())) => {
                self.streamed = total;
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(UploadError::WriteTimeout(millis(self.write_timeout))),
        }
    }

    /// Verify that the whole declared body was sent.
    pub fn finish(&self) -> Result<()> {
        if self.streamed != self.declared {
            return Err(UploadError::BodyLengthMismatch {
                declared: self.declared,
                streamed: self.streamed,
            });
        }
        Ok(())
    }

    /// Pull the image from the sensor straight into the connection.
    ///
    /// Issues the download instruction, then forwards every Data payload
    /// until DataEnd. Returns the number of body bytes sent.
    ///
    /// # Errors
    ///
    /// - `Sensor(SensorNack)` if the module refuses the download
    /// - `Sensor(UnexpectedPacket)` for anything but Data/DataEnd mid-stream
    /// - `Sensor(Framing(..))` for a corrupted or truncated packet
    /// - `BodyLengthMismatch` if the image is longer or shorter than declared
    pub async fn stream_from_sensor<L: SerialLink>(
        &mut self,
        sensor: &mut SensorDriver<L>,
    ) -> Result<usize> {
        sensor.begin_download().await?;

        let mut packets = 0usize;
        loop {
            let packet = sensor.read_packet().await?;
            match packet.packet_type {
                PacketType::Data | PacketType::DataEnd => {
                    self.send_chunk(&packet.payload).await?;
                    packets += 1;
                    if packet.packet_type == PacketType::DataEnd {
                        break;
                    }
                }
                other => {
                    return Err(
                        HardwareError::unexpected_packet("Data or DataEnd", other).into()
                    );
                }
            }
        }

        self.finish()?;
        debug!(packets, bytes = self.streamed, "Image streamed");
        Ok(self.streamed)
    }

    /// Read and interpret the service's answer, then close the connection.
    ///
    /// The head must end within `header_timeout`; the body is read up to
    /// `Content-Length` (or to end of stream when absent) within
    /// `body_timeout`.
    pub async fn read_response(
        mut self,
        header_timeout: Duration,
        body_timeout: Duration,
    ) -> Result<UploadResult> {
        if let Err(e) = self.stream.flush().await {
            warn!(error = %e, "Flush before response failed");
        }

        let (head, mut body) =
            match tokio::time::timeout(header_timeout, self.read_head()).await {
                Ok(result) => result?,
                Err(_) => return Err(UploadError::ReadTimeout(millis(header_timeout))),
            };

        let status_code = parse_status_code(&head);
        if status_code == 0 {
            warn!(status_line = head.lines().next().unwrap_or(""), "Unreadable status line");
        }
        let content_length = parse_content_length(&head);

        match tokio::time::timeout(body_timeout, self.read_body(&mut body, content_length)).await
        {
            Ok(result) => result?,
            Err(_) => return Err(UploadError::ReadTimeout(millis(body_timeout))),
        }
        if let Some(len) = content_length {
            body.truncate(len);
        }

        let _ = self.stream.shutdown().await;
        trace!(status_code, body_len = body.len(), "Response received");
        Ok(UploadResult::new(status_code, body.freeze()))
    }

    /// Read until the blank line; returns the head and any body bytes that
    /// arrived with it.
    async fn read_head(&mut self) -> Result<(String, BytesMut)> {
        let mut buf = BytesMut::with_capacity(512);
        let mut chunk = [0u8; 256];

        loop {
            if let Some(pos) = find(&buf, HEAD_TERMINATOR) {
                let head = String::from_utf8_lossy(&buf[..pos]).into_owned();
                let body = buf.split_off(pos + HEAD_TERMINATOR.len());
                return Ok((head, body));
            }
            if buf.len() > self.max_header_bytes {
                return Err(UploadError::HeaderTooLarge(self.max_header_bytes));
            }

            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                if buf.is_empty() {
                    return Err(UploadError::ConnectionLost(
                        "closed before response".to_string(),
                    ));
                }
                warn!(received = buf.len(), "Response ended inside the head");
                let head = String::from_utf8_lossy(&buf).into_owned();
                return Ok((head, BytesMut::new()));
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    async fn read_body(&mut self, body: &mut BytesMut, content_length: Option<usize>) -> Result<()> {
        let mut chunk = [0u8; 1024];
        loop {
            if content_length.is_some_and(|len| body.len() >= len) {
                return Ok(());
            }
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                if let Some(len) = content_length {
                    warn!(expected = len, received = body.len(), "Response body truncated");
                }
                return Ok(());
            }
            body.extend_from_slice(&chunk[..n]);
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UploadConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.path, "/upload-image");
        assert_eq!(config.header_timeout, Duration::from_secs(5));
        assert_eq!(config.body_timeout, Duration::from_secs(10));
        assert_eq!(config.max_header_bytes, 8192);
    }

    #[test]
    fn test_find_terminator() {
        assert_eq!(find(b"HTTP/1.1 200 OK\r\n\r\n{}", HEAD_TERMINATOR), Some(15));
        assert_eq!(find(b"HTTP/1.1 200 OK\r\n", HEAD_TERMINATOR), None);
        assert_eq!(find(b"", HEAD_TERMINATOR), None);
    }
}
