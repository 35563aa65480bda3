//! Tokio codec for sensor packet framing.
//!
//! `SensorCodec` lets a byte stream carrying sensor packets be wrapped in a
//! `Framed`/`FramedRead`, and lets buffered bytes be split into packets
//! without hand-written bookkeeping. It shares its validation with
//! [`PacketHeader`], so a packet accepted here is accepted everywhere.
//!
//! Unlike a text protocol there is no resynchronisation: a bad start
//! marker or checksum is returned as an error and the caller decides
//! whether to drain the stream.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::packet::{Packet, PacketHeader};
use fingerbridge_core::{Error, FramingError, constants::HEADER_LEN};

/// Default largest body (payload + checksum) accepted by the decoder.
const DEFAULT_MAX_BODY_LEN: usize = 4 * 1024;

/// Tokio codec for sensor packets.
///
/// # Example
///
/// ```
/// use bytes::BytesMut;
/// use tokio_util::codec::{Decoder, Encoder};
/// use fingerbridge_protocol::{Packet, PacketType, SensorCodec};
///
/// let mut codec = SensorCodec::new();
/// let mut buf = BytesMut::new();
/// let packet = Packet::new(0xFFFF_FFFF, PacketType::Data, vec![1, 2, 3]).unwrap();
/// codec.encode(packet.clone(), &mut buf).unwrap();
///
/// assert_eq!(codec.decode(&mut buf).unwrap(), Some(packet));
/// assert!(buf.is_empty());
/// ```
#[derive(Debug)]
pub struct SensorCodec {
    max_body_len: usize,
}

impl SensorCodec {
    pub fn new() -> Self {
        Self {
            max_body_len: DEFAULT_MAX_BODY_LEN,
        }
    }

    /// Create a codec accepting bodies up to `max_body_len` bytes.
    pub fn with_max_body_len(max_body_len: usize) -> Self {
        Self { max_body_len }
    }

    pub fn max_body_len(&self) -> usize {
        self.max_body_len
    }
}

impl Default for SensorCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for SensorCodec {
    type Item = Packet;
    type Error = Error;

    /// Decode one packet once all of its bytes are buffered.
    ///
    /// Returns `Ok(None)` while the header or body is incomplete; the
    /// buffer is only consumed when a whole packet is taken.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, Error> {
        let Some(header_bytes) = src.get(..HEADER_LEN) else {
            return Ok(None);
        };
        let mut header_buf = [0u8; HEADER_LEN];
        header_buf.copy_from_slice(header_bytes);

        let header = PacketHeader::parse(&header_buf)?;
        if header.body_len() > self.max_body_len {
            return Err(FramingError::PayloadTooLarge(header.body_len()).into());
        }

        let total = HEADER_LEN + header.body_len();
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let rest = src.split_to(header.body_len());
        Ok(Some(header.into_packet(&rest)?))
    }
}

impl Encoder<Packet> for SensorCodec {
    type Error = Error;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), Error> {
        item.encode_into(dst);
        Ok(())
    }
}
