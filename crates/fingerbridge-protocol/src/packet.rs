use bytes::{BufMut, Bytes, BytesMut};
use fingerbridge_core::{FramingError, constants::*};
use std::fmt;

/// Packet type byte of the sensor protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Host-to-module instruction.
    Command,
    /// Module reply carrying a confirmation code.
    Acknowledge,
    /// Bulk data, more follows.
    Data,
    /// Last bulk data packet of a transfer.
    DataEnd,
}

impl PacketType {
    /// Map a wire byte to a packet type.
    ///
    /// # Errors
    /// Returns `FramingError::UnknownPacketType` for bytes outside the protocol.
    pub fn from_u8(byte: u8) -> Result<Self, FramingError> {
        match byte {
            PACKET_COMMAND => Ok(PacketType::Command),
            PACKET_ACK => Ok(PacketType::Acknowledge),
            PACKET_DATA => Ok(PacketType::Data),
            PACKET_DATA_END => Ok(PacketType::DataEnd),
            other => Err(FramingError::UnknownPacketType(other)),
        }
    }

    #[must_use]
    pub fn as_u8(&self) -> u8 {
        match self {
            PacketType::Command => PACKET_COMMAND,
            PacketType::Acknowledge => PACKET_ACK,
            PacketType::Data => PACKET_DATA,
            PacketType::DataEnd => PACKET_DATA_END,
        }
    }

    /// Whether this packet carries image/bulk data.
    #[must_use]
    pub fn is_data(&self) -> bool {
        matches!(self, PacketType::Data | PacketType::DataEnd)
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PacketType::Command => "Command",
            PacketType::Acknowledge => "Acknowledge",
            PacketType::Data => "Data",
            PacketType::DataEnd => "DataEnd",
        };
        write!(f, "{name}(0x{:02X})", self.as_u8())
    }
}

/// Checksum over the type byte, both length bytes and the payload.
///
/// The address and start marker are not covered.
#[must_use]
pub fn checksum(type_byte: u8, length: u16, payload: &[u8]) -> u16 {
    let [len_hi, len_lo] = length.to_be_bytes();
    payload.iter().fold(
        u16::from(type_byte)
            .wrapping_add(u16::from(len_hi))
            .wrapping_add(u16::from(len_lo)),
        |acc, &b| acc.wrapping_add(u16::from(b)),
    )
}

/// The fixed 9-byte prefix of every packet.
///
/// Splitting decode into header and body lets a reader pull exactly
/// [`HEADER_LEN`] bytes, learn how many more to pull, and then finish the
/// packet once the rest has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub address: u32,
    pub type_byte: u8,
    /// Raw length field: payload length plus the two checksum bytes.
    pub length: u16,
}

impl PacketHeader {
    /// Parse and validate a header.
    ///
    /// # Errors
    /// - `BadStartMarker` if the first two bytes are not `EF 01`
    /// - `BadLength` if the length field cannot even hold the checksum
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Result<Self, FramingError> {
        let marker = u16::from_be_bytes([bytes[0], bytes[1]]);
        if marker != START_CODE {
            return Err(FramingError::BadStartMarker(marker));
        }

        let address = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let type_byte = bytes[6];
        let length = u16::from_be_bytes([bytes[7], bytes[8]]);

        if (length as usize) < CHECKSUM_LEN {
            return Err(FramingError::BadLength(length));
        }

        Ok(Self {
            address,
            type_byte,
            length,
        })
    }

    /// Number of bytes that follow the header (payload plus checksum).
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.length as usize
    }

    /// Complete the packet from the bytes that followed the header.
    ///
    /// The checksum is verified before the type byte is interpreted, so a
    /// corrupted type surfaces as `BadChecksum`.
    ///
    /// # Errors
    /// - `ShortRead` if `rest` is not exactly [`body_len`](Self::body_len) bytes
    /// - `BadChecksum` if the transmitted checksum does not match
    /// - `UnknownPacketType` if the (verified) type byte is not a protocol type
    pub fn into_packet(self, rest: &[u8]) -> Result<Packet, FramingError> {
        if rest.len() != self.body_len() {
            return Err(FramingError::ShortRead {
                expected: self.body_len(),
                received: rest.len(),
            });
        }

        let (payload, trailer) = rest.split_at(rest.len() - CHECKSUM_LEN);
        let received = u16::from_be_bytes([trailer[0], trailer[1]]);
        let computed = checksum(self.type_byte, self.length, payload);
        if received != computed {
            return Err(FramingError::BadChecksum {
                expected: computed,
                actual: received,
            });
        }

        Ok(Packet {
            address: self.address,
            packet_type: PacketType::from_u8(self.type_byte)?,
            payload: Bytes::copy_from_slice(payload),
        })
    }
}

/// One framed unit of the sensor protocol.
///
/// # Wire Format
///
/// ```text
/// EF 01 | address (4, BE) | type (1) | length (2, BE) | payload | checksum (2, BE)
/// ```
///
/// # Example
///
/// ```
/// use fingerbridge_protocol::{Packet, PacketType};
/// use fingerbridge_core::constants::BROADCAST_ADDRESS;
///
/// let ack = Packet::new(BROADCAST_ADDRESS, PacketType::Acknowledge, vec![0x00]).unwrap();
/// let wire = ack.encode();
/// assert_eq!(
///     &wire[..],
///     &[0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0A]
/// );
///
/// let (decoded, used) = Packet::decode(&wire).unwrap();
/// assert_eq!(used, wire.len());
/// assert_eq!(decoded, ack);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u32,
    pub packet_type: PacketType,
    pub payload: Bytes,
}

impl Packet {
    /// Create a packet.
    ///
    /// # Errors
    /// Returns `FramingError::PayloadTooLarge` if the payload cannot be
    /// described by the 16-bit length field.
    pub fn new(
        address: u32,
        packet_type: PacketType,
        payload: impl Into<Bytes>,
    ) -> Result<Self, FramingError> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(FramingError::PayloadTooLarge(payload.len()));
        }
        Ok(Self {
            address,
            packet_type,
            payload,
        })
    }

    /// Build a command packet: instruction code followed by its parameters.
    ///
    /// # Errors
    /// Returns `FramingError::PayloadTooLarge` for oversized parameter blocks.
    pub fn command(address: u32, instruction: u8, params: &[u8]) -> Result<Self, FramingError> {
        let mut payload = BytesMut::with_capacity(1 + params.len());
        payload.put_u8(instruction);
        payload.put_slice(params);
        Self::new(address, PacketType::Command, payload.freeze())
    }

    /// Value of the length field as transmitted.
    #[must_use]
    pub fn length_field(&self) -> u16 {
        // Bounded by MAX_PAYLOAD_LEN at construction.
        (self.payload.len() + CHECKSUM_LEN) as u16
    }

    /// Checksum as transmitted.
    #[must_use]
    pub fn checksum(&self) -> u16 {
        checksum(
            self.packet_type.as_u8(),
            self.length_field(),
            &self.payload,
        )
    }

    /// Total size on the wire.
    #[must_use]
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + self.payload.len() + CHECKSUM_LEN
    }

    /// Append the wire encoding to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        dst.reserve(self.wire_len());
        dst.put_u16(START_CODE);
        dst.put_u32(self.address);
        dst.put_u8(self.packet_type.as_u8());
        dst.put_u16(self.length_field());
        dst.put_slice(&self.payload);
        dst.put_u16(self.checksum());
    }

    /// Encode into a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Decode one complete packet from the front of `src`.
    ///
    /// Returns the packet and the number of bytes it occupied.
    ///
    /// # Errors
    /// Any [`FramingError`]; `ShortRead` if `src` ends before the packet does.
    pub fn decode(src: &[u8]) -> Result<(Packet, usize), FramingError> {
        let header_bytes: &[u8; HEADER_LEN] = src
            .get(..HEADER_LEN)
            .and_then(|h| h.try_into().ok())
            .ok_or(FramingError::ShortRead {
                expected: HEADER_LEN,
                received: src.len(),
            })?;

        let header = PacketHeader::parse(header_bytes)?;
        let total = HEADER_LEN + header.body_len();
        let rest = src.get(HEADER_LEN..total).ok_or(FramingError::ShortRead {
            expected: header.body_len(),
            received: src.len() - HEADER_LEN,
        })?;

        Ok((header.into_packet(rest)?, total))
    }

    /// First payload byte, which is the confirmation code of an
    /// acknowledge packet.
    #[must_use]
    pub fn confirmation_code(&self) -> Option<u8> {
        self.payload.first().copied()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet[addr=0x{:08X}, type={}, payload={}B]",
            self.address,
            self.packet_type,
            self.payload.len()
        )
    }
}
