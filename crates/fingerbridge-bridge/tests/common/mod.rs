//! Shared fixtures for bridge integration tests.
//!
//! - [`MatchingService`]: loopback HTTP endpoint recording every complete
//!   upload and answering through a caller-supplied closure
//! - [`runner`]: a [`CycleRunner`] over the mock sensor and mock indicator
//!   with short timings
//!
//! The mock sensor arms a placement only after the window has been clear
//! for `ARM_AFTER`, which is longer than the quiet period, so every cycle
//! sees exactly one placement.

#![allow(dead_code)]

use fingerbridge_bridge::{CycleRunner, PresenceMonitor, PresenceTiming, Reclaimer};
use fingerbridge_hardware::mock::{
    MockIndicator, MockIndicatorHandle, MockSensorConfig, MockSensorHandle, MockSensorLink,
};
use fingerbridge_hardware::{SensorConfig, SensorDriver};
use fingerbridge_network::{UploadClient, UploadConfig};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const ARM_AFTER: Duration = Duration::from_millis(60);

/// One upload as the service received it.
#[derive(Debug, Clone)]
pub struct Upload {
    pub head: String,
    pub body_len: usize,
}

impl Upload {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }

    pub fn filename(&self) -> &str {
        self.header("X-Filename").unwrap_or("")
    }
}

type Responder = dyn Fn(&Upload) -> (u16, String) + Send + Sync;

/// Loopback stand-in for the matching service.
pub struct MatchingService {
    addr: SocketAddr,
    uploads: Arc<Mutex<Vec<Upload>>>,
}

impl MatchingService {
    /// Serve forever, answering each upload with `respond(upload)`.
    pub async fn spawn<F>(respond: F) -> Self
    where
        F: Fn(&Upload) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let respond: Arc<Responder> = Arc::new(respond);

        let recorded = Arc::clone(&uploads);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let recorded = Arc::clone(&recorded);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    serve(stream, recorded, respond).await;
                });
            }
        });

        Self { addr, uploads }
    }

    /// Answer every upload with `200 OK` and `body`.
    pub async fn ok(body: &'static str) -> Self {
        Self::spawn(move |_| (200, body.to_string())).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.uploads()
            .iter()
            .map(|u| u.filename().to_string())
            .collect()
    }

    pub fn client(&self) -> UploadClient {
        UploadClient::new(UploadConfig {
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
            connect_timeout: Duration::from_secs(1),
            write_timeout: Duration::from_secs(1),
            header_timeout: Duration::from_secs(1),
            body_timeout: Duration::from_secs(1),
            ..UploadConfig::default()
        })
    }
}

async fn serve(mut stream: TcpStream, recorded: Arc<Mutex<Vec<Upload>>>, respond: Arc<Responder>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut upload = Upload { head, body_len: 0 };
    let declared: usize = upload
        .header("Content-Length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut body_len = buf.len() - head_end - 4;
    while body_len < declared {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => body_len += n,
        }
    }
    upload.body_len = body_len;

    let (status, body) = respond(&upload);
    recorded
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(upload);

    let response = format!(
        "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

pub fn timing() -> PresenceTiming {
    PresenceTiming {
        quiet_period: Duration::from_millis(20),
        idle_poll: Duration::from_millis(5),
        poll_interval: Duration::from_millis(5),
        lift_poll: Duration::from_millis(5),
        lift_timeout: Duration::from_millis(500),
    }
}

pub fn mock_sensor() -> (SensorDriver<MockSensorLink>, MockSensorHandle) {
    let (link, handle) = MockSensorLink::with_config(MockSensorConfig {
        arm_after: ARM_AFTER,
        ..MockSensorConfig::default()
    });
    (SensorDriver::new(link, SensorConfig::default()), handle)
}

pub struct Rig {
    pub runner: CycleRunner<MockSensorLink, MockIndicator>,
    pub sensor: MockSensorHandle,
    pub indicator: MockIndicatorHandle,
}

/// Cycle runner wired to the mock devices and `client`.
pub fn runner(client: UploadClient) -> Rig {
    runner_with(client, timing())
}

pub fn runner_with(client: UploadClient, timing: PresenceTiming) -> Rig {
    let (sensor, sensor_handle) = mock_sensor();
    let (indicator, indicator_handle) = MockIndicator::new();
    let runner = CycleRunner::new(
        sensor,
        indicator,
        client,
        PresenceMonitor::new(timing),
        Reclaimer::new(Duration::from_millis(1), Duration::from_millis(500)),
    );
    Rig {
        runner,
        sensor: sensor_handle,
        indicator: indicator_handle,
    }
}
