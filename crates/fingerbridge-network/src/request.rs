//! Upload request metadata.
//!
//! The image is sent as the raw body of a single `POST`; everything the
//! matching service needs to file or match it travels in `X-` headers.

use fingerbridge_core::constants::PACKED_FORMAT;
use fingerbridge_core::{FingerLabel, Identity, JobMode, SensorGeometry};
use std::fmt::Write;

/// One image upload, described before any byte of the body is sent.
///
/// # Example
///
/// ```
/// use fingerbridge_core::{FingerLabel, Identity, SensorGeometry};
/// use fingerbridge_network::UploadRequest;
///
/// let request = UploadRequest::enroll(
///     SensorGeometry::default(),
///     &Identity::new("42").unwrap(),
///     &FingerLabel::new("thumb").unwrap(),
///     3,
/// );
/// assert_eq!(request.filename(), "42_thumb_3");
/// assert_eq!(request.declared_body_length(), 36_864);
/// assert_eq!(request.header("X-Identify"), Some("0"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    mode: JobMode,
    declared_body_length: usize,
    filename: String,
    headers: Vec<(String, String)>,
}

impl UploadRequest {
    /// Request for one enrollment sample.
    pub fn enroll(
        geometry: SensorGeometry,
        identity: &Identity,
        finger: &FingerLabel,
        sample: u32,
    ) -> Self {
        let filename = format!("{identity}_{finger}_{sample}");
        Self::build(geometry, JobMode::Enroll, Some(identity), filename)
    }

    /// Request for the `n`th identification of this session.
    pub fn detect(geometry: SensorGeometry, n: u64) -> Self {
        Self::build(geometry, JobMode::Detect, None, format!("detect_img_{n}"))
    }

    fn build(
        geometry: SensorGeometry,
        mode: JobMode,
        identity: Option<&Identity>,
        filename: String,
    ) -> Self {
        let mut headers = vec![
            ("X-Format".to_string(), PACKED_FORMAT.to_string()),
            ("X-Width".to_string(), geometry.width.to_string()),
            ("X-Height".to_string(), geometry.height.to_string()),
        ];
        if let Some(identity) = identity {
            headers.push(("X-Person-Id".to_string(), identity.to_string()));
        }
        headers.push(("X-Mode".to_string(), mode.as_str().to_string()));
        headers.push(("X-Filename".to_string(), filename.clone()));
        headers.push((
            "X-Identify".to_string(),
            if mode.identify() { "1" } else { "0" }.to_string(),
        ));

        Self {
            mode,
            declared_body_length: geometry.packed_len(),
            filename,
            headers,
        }
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    /// Bytes the body must contain, announced as `Content-Length`.
    pub fn declared_body_length(&self) -> usize {
        self.declared_body_length
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Metadata headers in send order.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Render the request line and all headers, ending with the blank line.
    pub fn render_head(&self, host: &str, port: u16, path: &str) -> String {
        let mut head = String::with_capacity(256);
        // Writing to a String cannot fail.
        let _ = write!(head, "POST {path} HTTP/1.1\r\n");
        let _ = write!(head, "Host: {host}:{port}\r\n");
        head.push_str("Content-Type: application/octet-stream\r\n");
        let _ = write!(head, "Content-Length: {}\r\n", self.declared_body_length);
        head.push_str("Connection: close\r\n");
        for (name, value) in &self.headers {
            let _ = write!(head, "{name}: {value}\r\n");
        }
        head.push_str("\r\n");
        head
    }
}
