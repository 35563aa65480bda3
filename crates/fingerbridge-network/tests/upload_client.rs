//! Integration tests for UploadClient
//!
//! These tests run the full open-stream-respond cycle against a loopback
//! TCP server standing in for the matching service, with the mock sensor
//! module supplying the image.

use fingerbridge_core::{FingerLabel, Identity, SensorGeometry};
use fingerbridge_hardware::mock::{MockSensorHandle, MockSensorLink};
use fingerbridge_hardware::{HardwareError, SensorConfig, SensorDriver};
use fingerbridge_network::{UploadClient, UploadConfig, UploadError, UploadRequest};
use fingerbridge_protocol::Confirmation;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// What the fake service saw.
#[derive(Debug)]
struct Captured {
    head: String,
    body: Vec<u8>,
}

async fn read_request(stream: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return Captured {
                head: String::from_utf8_lossy(&buf).into_owned(),
                body: Vec::new(),
            };
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let declared = head
        .lines()
        .find_map(|l| l.strip_prefix("Content-Length: "))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[head_end + 4..].to_vec();
    while body.len() < declared {
        let n = stream.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Captured { head, body }
}

/// Serve one request with a canned response.
async fn spawn_service(response: &'static [u8]) -> (SocketAddr, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let captured = read_request(&mut stream).await;
        let _ = stream.write_all(response).await;
        let _ = stream.shutdown().await;
        captured
    });
    (addr, task)
}

fn client_for(addr: SocketAddr) -> UploadClient {
    UploadClient::new(UploadConfig {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_timeout: Duration::from_millis(1000),
        write_timeout: Duration::from_millis(1000),
        header_timeout: Duration::from_millis(1000),
        body_timeout: Duration::from_millis(1000),
        ..UploadConfig::default()
    })
}

fn sensor() -> (SensorDriver<MockSensorLink>, MockSensorHandle) {
    let (link, handle) = MockSensorLink::new();
    (SensorDriver::new(link, SensorConfig::default()), handle)
}

fn enroll_request() -> UploadRequest {
    UploadRequest::enroll(
        SensorGeometry::default(),
        &Identity::new("42").unwrap(),
        &FingerLabel::new("thumb").unwrap(),
        1,
    )
}

#[tokio::test]
async fn test_detect_upload_with_match() {
    let (addr, service) = spawn_service(
        b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 47\r\n\r\n{\"match_id\":\"42\",\"score\":0.93,\"threshold\":0.80}",
    )
    .await;
    let (mut sensor, handle) = sensor();

    let request = UploadRequest::detect(SensorGeometry::default(), 1);
    let result = client_for(addr)
        .upload_from_sensor(&request, &mut sensor)
        .await
        .unwrap();

    assert_eq!(result.status_code, 200);
    assert!(result.is_success());
    assert_eq!(result.match_identity(), Some("42"));
    let decision = result.parsed.unwrap();
    assert_eq!(decision.score, 0.93);
    assert_eq!(decision.threshold, 0.8);

    let captured = service.await.unwrap();
    assert!(captured.head.starts_with("POST /upload-image HTTP/1.1\r\n"));
    assert!(captured.head.contains("Content-Length: 36864\r\n"));
    assert!(captured.head.contains("X-Filename: detect_img_1"));
    assert!(captured.head.contains("X-Identify: 1"));
    assert_eq!(captured.body.len(), 36_864);
    assert_eq!(captured.body[..4], [0, 1, 2, 3]);
    assert_eq!(handle.download_count(), 1);
}

#[tokio::test]
async fn test_enroll_upload_non_json_body() {
    let (addr, service) =
        spawn_service(b"HTTP/1.1 201 Created\r\nContent-Length: 5\r\n\r\nSaved").await;
    let (mut sensor, _handle) = sensor();

    let result = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap();

    assert_eq!(result.status_code, 201);
    assert_eq!(&result.body[..], b"Saved");
    assert!(result.parsed.is_none());

    let captured = service.await.unwrap();
    assert!(captured.head.contains("X-Person-Id: 42"));
    assert!(captured.head.contains("X-Filename: 42_thumb_1"));
    assert!(captured.head.contains("X-Mode: enroll"));
}

#[tokio::test]
async fn test_response_without_content_length_reads_to_eof() {
    let (addr, _service) =
        spawn_service(b"HTTP/1.1 500 Internal Server Error\r\n\r\n{\"error\":\"disk full\"}").await;
    let (mut sensor, _handle) = sensor();

    let result = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap();

    assert_eq!(result.status_code, 500);
    assert!(!result.is_success());
    assert_eq!(&result.body[..], br#"{"error":"disk full"}"#);
    assert_eq!(result.match_identity(), None);
}

#[tokio::test]
async fn test_garbled_status_line_is_zero() {
    let (addr, _service) = spawn_service(b"WHAT\r\n\r\n").await;
    let (mut sensor, _handle) = sensor();

    let result = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap();
    assert_eq!(result.status_code, 0);
    assert!(!result.is_success());
}

#[tokio::test]
async fn test_sensor_nack_fails_upload() {
    let (addr, _service) = spawn_service(b"HTTP/1.1 200 OK\r\n\r\n").await;
    let (mut sensor, handle) = sensor();
    handle.set_download_ack(Confirmation::UPLOAD_FAILED.0);

    let err = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UploadError::Sensor(HardwareError::SensorNack {
            code: Confirmation::UPLOAD_FAILED,
            ..
        })
    ));
    assert_eq!(handle.download_count(), 0);
}

#[tokio::test]
async fn test_short_image_is_body_length_mismatch() {
    let (addr, _service) = spawn_service(b"HTTP/1.1 200 OK\r\n\r\n").await;
    let (mut sensor, handle) = sensor();
    handle.set_image(vec![0u8; 36_864 - 128]);

    let err = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UploadError::BodyLengthMismatch {
            declared: 36_864,
            streamed: 36_736
        }
    ));
}

#[tokio::test]
async fn test_long_image_is_body_length_mismatch() {
    let (addr, _service) = spawn_service(b"HTTP/1.1 200 OK\r\n\r\n").await;
    let (mut sensor, handle) = sensor();
    handle.set_image(vec![0u8; 36_864 + 1]);

    let err = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UploadError::BodyLengthMismatch {
            declared: 36_864,
            streamed: 36_865
        }
    ));
}

#[tokio::test]
async fn test_corrupted_data_packet_fails_upload() {
    let (addr, _service) = spawn_service(b"HTTP/1.1 200 OK\r\n\r\n").await;
    let (mut sensor, handle) = sensor();
    // Stale bytes ahead of the acknowledge break the very first header.
    handle.inject_bytes(&[0x00, 0x01]);

    let err = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap_err();

    match err {
        UploadError::Sensor(e) => assert!(e.is_framing()),
        other => panic!("expected framing failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_silent_service_is_read_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _captured = read_request(&mut stream).await;
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let client = UploadClient::new(UploadConfig {
        header_timeout: Duration::from_millis(100),
        ..client_for(addr).config().clone()
    });
    let (mut sensor, _handle) = sensor();

    let err = client
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ReadTimeout(100)));
}

#[tokio::test]
async fn test_oversized_head_rejected() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _captured = read_request(&mut stream).await;
        let mut huge = b"HTTP/1.1 200 OK\r\n".to_vec();
        huge.extend(std::iter::repeat_n(b'x', 9000));
        let _ = stream.write_all(&huge).await;
        tokio::time::sleep(Duration::from_secs(2)).await;
    });

    let (mut sensor, _handle) = sensor();
    let err = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::HeaderTooLarge(8192)));
}

#[tokio::test]
async fn test_closed_before_response() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let _captured = read_request(&mut stream).await;
        let _ = stream.shutdown().await;
    });

    let (mut sensor, _handle) = sensor();
    let err = client_for(addr)
        .upload_from_sensor(&enroll_request(), &mut sensor)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::ConnectionLost(_)));
}

#[tokio::test]
async fn test_probe_and_refused_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = listener.accept().await;
    });
    client_for(addr).probe().await.unwrap();

    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_addr = closed.local_addr().unwrap();
    drop(closed);

    let err = client_for(closed_addr).probe().await.unwrap_err();
    assert!(matches!(err, UploadError::Io(_)));
}

#[tokio::test]
async fn test_unresolvable_host() {
    let client = UploadClient::new(UploadConfig {
        host: "host.invalid".to_string(),
        connect_timeout: Duration::from_millis(2000),
        ..UploadConfig::default()
    });
    let err = client.probe().await.unwrap_err();
    assert!(matches!(
        err,
        UploadError::Resolve(_) | UploadError::ConnectTimeout(_)
    ));
}
