//! Mock sensor module speaking the packet protocol over an in-memory link.
//!
//! Bytes written by the host are decoded as command packets and answered
//! the way the module would: an acknowledge for every instruction, and for
//! an image download a run of Data packets closed by DataEnd.
//!
//! # Finger model
//!
//! The window starts clear. A finger is placed only once the window has been
//! clear for `arm_after` and a placement is pending (queued with
//! [`MockSensorHandle::place_finger`], or unlimited with
//! [`MockSensorHandle::set_auto_place`]). It then answers "present" to
//! `hold_reads` capture queries and lifts.
//!
//! Reads never wait: if the requested bytes are not buffered the read fails
//! at once with `ShortRead`, as a real link would after its timeout.

use crate::error::Result;
use crate::traits::SerialLink;
use bytes::{Bytes, BytesMut};
use fingerbridge_core::FramingError;
use fingerbridge_core::constants::{
    DEFAULT_DATA_PACKET_LEN, DEFAULT_SENSOR_HEIGHT, DEFAULT_SENSOR_WIDTH, packed_image_len,
};
use fingerbridge_protocol::{Confirmation, Instruction, Packet, PacketType, SensorCodec};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::codec::Decoder;

/// Behaviour knobs of the mock module.
#[derive(Debug, Clone)]
pub struct MockSensorConfig {
    /// Clear-window time required before a pending placement appears.
    pub arm_after: Duration,
    /// Capture queries answered "present" per placement.
    pub hold_reads: u32,
    /// Payload size of each Data packet.
    pub data_packet_len: usize,
}

impl Default for MockSensorConfig {
    fn default() -> Self {
        Self {
            arm_after: Duration::from_millis(50),
            hold_reads: 2,
            data_packet_len: DEFAULT_DATA_PACKET_LEN,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Window {
    Clear { since: Instant },
    Touched { reads_left: u32 },
}

#[derive(Debug)]
struct ModuleState {
    config: MockSensorConfig,
    inbound: VecDeque<u8>,
    outbound: BytesMut,
    codec: SensorCodec,
    window: Window,
    pending_placements: usize,
    auto_place: bool,
    image: Bytes,
    download_ack: u8,
    password_ack: u8,
    reply_address: Option<u32>,
    silent: bool,
    commands: Vec<Instruction>,
    captures: usize,
    downloads: usize,
    drained: usize,
}

impl ModuleState {
    fn new(config: MockSensorConfig) -> Self {
        let image_len = packed_image_len(DEFAULT_SENSOR_WIDTH, DEFAULT_SENSOR_HEIGHT);
        Self {
            config,
            inbound: VecDeque::new(),
            outbound: BytesMut::new(),
            codec: SensorCodec::new(),
            window: Window::Clear {
                since: Instant::now(),
            },
            pending_placements: 0,
            auto_place: false,
            image: (0..image_len).map(|i| (i % 251) as u8).collect(),
            download_ack: Confirmation::OK.0,
            password_ack: Confirmation::OK.0,
            reply_address: None,
            silent: false,
            commands: Vec::new(),
            captures: 0,
            downloads: 0,
            drained: 0,
        }
    }

    /// Answer one capture query, advancing the finger model.
    fn query_window(&mut self) -> bool {
        if let Window::Clear { since } = self.window {
            let pending = self.auto_place || self.pending_placements > 0;
            if pending && since.elapsed() >= self.config.arm_after {
                self.pending_placements = self.pending_placements.saturating_sub(1);
                self.window = Window::Touched {
                    reads_left: self.config.hold_reads,
                };
            }
        }

        match self.window {
            Window::Touched { reads_left } if reads_left > 0 => {
                self.window = Window::Touched {
                    reads_left: reads_left - 1,
                };
                true
            }
            Window::Touched { .. } => {
                self.window = Window::Clear {
                    since: Instant::now(),
                };
                false
            }
            Window::Clear { .. } => false,
        }
    }

    fn push_packet(&mut self, address: u32, packet_type: PacketType, payload: Vec<u8>) {
        let address = self.reply_address.unwrap_or(address);
        if let Ok(packet) = Packet::new(address, packet_type, payload) {
            self.inbound.extend(packet.encode().iter());
        }
    }

    fn handle_written(&mut self) {
        loop {
            match self.codec.decode(&mut self.outbound) {
                Ok(Some(packet)) => {
                    if packet.packet_type == PacketType::Command {
                        self.handle_command(&packet);
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    // The module discards a frame it cannot parse.
                    self.outbound.clear();
                    break;
                }
            }
        }
    }

    fn handle_command(&mut self, packet: &Packet) {
        let Some(instruction) = packet
            .payload
            .first()
            .and_then(|code| Instruction::from_code(*code))
        else {
            let code = Confirmation::PACKET_ERROR.0;
            self.push_packet(packet.address, PacketType::Acknowledge, vec![code]);
            return;
        };
        self.commands.push(instruction);
        if self.silent {
            return;
        }

        match instruction {
            Instruction::VerifyPassword => {
                let code = self.password_ack;
                self.push_packet(packet.address, PacketType::Acknowledge, vec![code]);
            }
            Instruction::CaptureImage => {
                self.captures += 1;
                let code = if self.query_window() {
                    Confirmation::OK
                } else {
                    Confirmation::NO_FINGER
                };
                self.push_packet(packet.address, PacketType::Acknowledge, vec![code.0]);
            }
            Instruction::DownloadImage => {
                let code = self.download_ack;
                self.push_packet(packet.address, PacketType::Acknowledge, vec![code]);
                if code != Confirmation::OK.0 {
                    return;
                }
                self.downloads += 1;
                let image = self.image.clone();
                let chunk_len = self.config.data_packet_len.max(1);
                let chunks: Vec<&[u8]> = image.chunks(chunk_len).collect();
                let last = chunks.len().saturating_sub(1);
                for (i, chunk) in chunks.iter().enumerate() {
                    let packet_type = if i == last {
                        PacketType::DataEnd
                    } else {
                        PacketType::Data
                    };
                    self.push_packet(packet.address, packet_type, chunk.to_vec());
                }
                if chunks.is_empty() {
                    self.push_packet(packet.address, PacketType::DataEnd, Vec::new());
                }
            }
        }
    }
}

type Shared = Arc<Mutex<ModuleState>>;

fn lock(state: &Shared) -> MutexGuard<'_, ModuleState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory link to a simulated sensor module.
///
/// # Examples
///
/// ```
/// use fingerbridge_hardware::mock::MockSensorLink;
/// use fingerbridge_hardware::{SensorConfig, SensorDriver};
///
/// #[tokio::main]
/// async fn main() -> fingerbridge_hardware::Result<()> {
///     let (link, handle) = MockSensorLink::new();
///     let mut sensor = SensorDriver::new(link, SensorConfig::default());
///
///     sensor.verify_password().await?;
///     assert!(!sensor.finger_present().await?);
///     assert_eq!(handle.capture_count(), 1);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockSensorLink {
    state: Shared,
}

impl MockSensorLink {
    pub fn new() -> (Self, MockSensorHandle) {
        Self::with_config(MockSensorConfig::default())
    }

    pub fn with_config(config: MockSensorConfig) -> (Self, MockSensorHandle) {
        let state = Arc::new(Mutex::new(ModuleState::new(config)));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockSensorHandle { state },
        )
    }
}

impl SerialLink for MockSensorLink {
    async fn read_exact(&mut self, n: usize, _timeout: Duration) -> Result<Bytes> {
        let mut state = lock(&self.state);
        if state.inbound.len() < n {
            let received = state.inbound.len();
            state.inbound.clear();
            return Err(FramingError::ShortRead {
                expected: n,
                received,
            }
            .into());
        }
        Ok(state.inbound.drain(..n).collect())
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        state.outbound.extend_from_slice(bytes);
        state.handle_written();
        Ok(())
    }

    async fn drain(&mut self) -> Result<usize> {
        let mut state = lock(&self.state);
        let pending = state.inbound.len();
        state.inbound.clear();
        state.drained += pending;
        Ok(pending)
    }
}

/// Handle for controlling a [`MockSensorLink`].
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    state: Shared,
}

impl MockSensorHandle {
    /// Queue one placement.
    pub fn place_finger(&self) {
        lock(&self.state).pending_placements += 1;
    }

    /// Place a finger every time the window has been clear long enough.
    pub fn set_auto_place(&self, auto_place: bool) {
        lock(&self.state).auto_place = auto_place;
    }

    /// Keep the current finger on the window for `reads` more queries.
    pub fn set_hold_reads(&self, reads: u32) {
        lock(&self.state).config.hold_reads = reads;
    }

    /// Replace the image streamed on download.
    pub fn set_image(&self, image: impl Into<Bytes>) {
        lock(&self.state).image = image.into();
    }

    pub fn set_download_ack(&self, code: u8) {
        lock(&self.state).download_ack = code;
    }

    pub fn set_password_ack(&self, code: u8) {
        lock(&self.state).password_ack = code;
    }

    /// Answer from a fixed address instead of echoing the command's.
    pub fn set_reply_address(&self, address: Option<u32>) {
        lock(&self.state).reply_address = address;
    }

    /// Stop answering commands.
    pub fn set_silent(&self, silent: bool) {
        lock(&self.state).silent = silent;
    }

    /// Put raw bytes on the line ahead of the next answer.
    pub fn inject_bytes(&self, bytes: &[u8]) {
        lock(&self.state).inbound.extend(bytes.iter().copied());
    }

    /// Instructions received, oldest first.
    pub fn commands(&self) -> Vec<Instruction> {
        lock(&self.state).commands.clone()
    }

    pub fn capture_count(&self) -> usize {
        lock(&self.state).captures
    }

    /// Downloads that were acknowledged and streamed.
    pub fn download_count(&self) -> usize {
        lock(&self.state).downloads
    }

    /// Total bytes discarded by `drain`.
    pub fn drained_bytes(&self) -> usize {
        lock(&self.state).drained
    }

    /// Bytes still buffered for the host.
    pub fn pending_bytes(&self) -> usize {
        lock(&self.state).inbound.len()
    }

    pub fn pending_placements(&self) -> usize {
        lock(&self.state).pending_placements
    }

    pub fn finger_on_window(&self) -> bool {
        matches!(
            lock(&self.state).window,
            Window::Touched { reads_left } if reads_left > 0
        )
    }
}
