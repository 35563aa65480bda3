//! Wire formats of the fingerprint bridge.
//!
//! - [`packet`]: the sensor module's checksummed serial packets
//! - [`codec`]: a Tokio codec over those packets
//! - [`instruction`]: instruction and confirmation codes
//! - [`host`]: the line-delimited JSON protocol spoken with the operator

pub mod codec;
pub mod host;
pub mod instruction;
pub mod packet;

pub use codec::SensorCodec;
pub use host::{HostCommand, HostCommandError, HostResponse, ResponseStatus, is_abort_request};
pub use instruction::{Confirmation, Instruction};
pub use packet::{Packet, PacketHeader, PacketType, checksum};
