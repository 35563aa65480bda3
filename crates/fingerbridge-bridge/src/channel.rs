//! Host command channel.
//!
//! Lines are read on a background task and queued, so the control loop can
//! either wait for the next command or peek without blocking while a cycle
//! is waiting for a finger. A malformed line (too long, or not UTF-8) is
//! delivered as an error item and reading carries on with the next line.

use bytes::BytesMut;
use fingerbridge_protocol::is_abort_request;
use futures::StreamExt;
use std::collections::VecDeque;
use std::io;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::codec::{Decoder, FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

/// Longest request line accepted.
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Queue depth between the reader task and the control loop.
const LINE_QUEUE: usize = 64;

type Line = Result<String, LinesCodecError>;

/// [`LinesCodec`] that reports a bad line as an item instead of failing the
/// stream. Only I/O errors from the reader end it.
#[derive(Debug)]
struct RequestLineCodec(LinesCodec);

impl RequestLineCodec {
    fn new() -> Self {
        Self(LinesCodec::new_with_max_length(MAX_LINE_LEN))
    }

    fn settle(result: Result<Option<String>, LinesCodecError>) -> io::Result<Option<Line>> {
        match result {
            Ok(line) => Ok(line.map(Ok)),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                Ok(Some(Err(LinesCodecError::MaxLineLengthExceeded)))
            }
            // Invalid UTF-8; the offending line is already consumed.
            Err(LinesCodecError::Io(e)) if e.kind() == io::ErrorKind::InvalidData => {
                Ok(Some(Err(LinesCodecError::Io(e))))
            }
            Err(LinesCodecError::Io(e)) => Err(e),
        }
    }
}

impl Decoder for RequestLineCodec {
    type Item = Line;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Line>> {
        Self::settle(self.0.decode(src))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> io::Result<Option<Line>> {
        Self::settle(self.0.decode_eof(src))
    }
}

/// Source of zero-wait abort checks while a cycle waits for placement.
pub trait AbortProbe {
    /// Whether the operator asked to stop the current job.
    fn abort_requested(&mut self) -> bool;
}

/// Probe that never aborts.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverAbort;

impl AbortProbe for NeverAbort {
    fn abort_requested(&mut self) -> bool {
        false
    }
}

/// Line-oriented request channel from the host.
#[derive(Debug)]
pub struct CommandChannel {
    lines: mpsc::Receiver<Line>,
    /// Lines seen by an abort check, kept for the control loop.
    held: VecDeque<Line>,
    closed: bool,
}

impl CommandChannel {
    /// Spawn a reader task on `reader`.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn from_reader<R>(reader: R) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(LINE_QUEUE);
        tokio::spawn(async move {
            let mut framed = FramedRead::new(reader, RequestLineCodec::new());
            while let Some(item) = framed.next().await {
                let (line, fatal) = match item {
                    Ok(line) => (line, false),
                    Err(e) => (Err(LinesCodecError::Io(e)), true),
                };
                if tx.send(line).await.is_err() || fatal {
                    break;
                }
            }
            debug!("Command reader finished");
        });
        Self {
            lines: rx,
            held: VecDeque::new(),
            closed: false,
        }
    }

    /// Channel on the process's standard input.
    pub fn stdin() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Wait for the next line; `None` once the input is closed and every
    /// queued line has been taken.
    pub async fn next_line(&mut self) -> Option<Line> {
        if let Some(line) = self.held.pop_front() {
            return Some(line);
        }
        if self.closed {
            return None;
        }
        let line = self.lines.recv().await;
        if line.is_none() {
            self.closed = true;
        }
        line
    }

    /// Take a line only if one is already queued.
    pub fn try_next_line(&mut self) -> Option<Line> {
        self.held.pop_front().or_else(|| self.receive_now())
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn receive_now(&mut self) -> Option<Line> {
        match self.lines.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }
}

impl AbortProbe for CommandChannel {
    /// Look through newly queued lines for an abort word. Other lines stay
    /// queued in order and are served once the job ends.
    fn abort_requested(&mut self) -> bool {
        while let Some(line) = self.receive_now() {
            match line {
                Ok(line) if is_abort_request(&line) => {
                    debug!(%line, "Abort requested");
                    return true;
                }
                line => {
                    if self.held.is_empty() {
                        warn!("Input queued while a job is running");
                    }
                    self.held.push_back(line);
                }
            }
        }
        false
    }
}
