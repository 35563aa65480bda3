//! Integration tests for SensorCodec with Tokio streams.
//!
//! These tests verify the codec works over real async byte streams, where
//! packets arrive split across reads the way a serial line delivers them.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::{Framed, FramedRead};
use fingerbridge_core::{Error, FramingError, constants::*};
use fingerbridge_protocol::{Packet, PacketType, SensorCodec};

/// Helper function to create a framed duplex stream for testing.
fn create_framed_duplex(
    buffer_size: usize,
) -> (
    Framed<DuplexStream, SensorCodec>,
    Framed<DuplexStream, SensorCodec>,
) {
    let (host, module) = tokio::io::duplex(buffer_size);
    (
        Framed::new(host, SensorCodec::new()),
        Framed::new(module, SensorCodec::new()),
    )
}

fn image_packets(image: &[u8], chunk: usize) -> Vec<Packet> {
    let chunks: Vec<&[u8]> = image.chunks(chunk).collect();
    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            let ty = if i == last {
                PacketType::DataEnd
            } else {
                PacketType::Data
            };
            Packet::new(BROADCAST_ADDRESS, ty, c.to_vec()).unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_command_then_ack_exchange() {
    let (mut host, mut module) = create_framed_duplex(1024);

    let cmd = Packet::command(BROADCAST_ADDRESS, CMD_DOWNLOAD_IMAGE, &[]).unwrap();
    host.send(cmd.clone()).await.unwrap();

    let received = module.next().await.unwrap().unwrap();
    assert_eq!(received, cmd);
    assert_eq!(received.payload[0], CMD_DOWNLOAD_IMAGE);

    let ack = Packet::new(BROADCAST_ADDRESS, PacketType::Acknowledge, vec![0x00]).unwrap();
    module.send(ack.clone()).await.unwrap();
    assert_eq!(host.next().await.unwrap().unwrap(), ack);
}

#[tokio::test]
async fn test_image_stream_reassembles_exactly() {
    let (mut host, mut module) = create_framed_duplex(64 * 1024);

    let image: Vec<u8> = (0..packed_image_len(64, 64)).map(|i| (i % 251) as u8).collect();
    for packet in image_packets(&image, DEFAULT_DATA_PACKET_LEN) {
        module.send(packet).await.unwrap();
    }

    let mut received = Vec::new();
    loop {
        let packet = host.next().await.unwrap().unwrap();
        received.extend_from_slice(&packet.payload);
        if packet.packet_type == PacketType::DataEnd {
            break;
        }
    }
    assert_eq!(received, image);
}

#[tokio::test]
async fn test_packet_split_across_writes() {
    let (mut writer, reader) = tokio::io::duplex(1024);
    let mut framed = FramedRead::new(reader, SensorCodec::new());

    let packet = Packet::new(BROADCAST_ADDRESS, PacketType::Data, vec![7u8; 40]).unwrap();
    let wire = packet.encode();

    tokio::spawn(async move {
        for byte in wire.iter() {
            writer.write_all(&[*byte]).await.unwrap();
            tokio::task::yield_now().await;
        }
    });

    assert_eq!(framed.next().await.unwrap().unwrap(), packet);
}

#[tokio::test]
async fn test_corrupted_stream_reports_framing_error() {
    let (mut writer, reader) = tokio::io::duplex(1024);
    let mut framed = FramedRead::new(reader, SensorCodec::new());

    let mut wire = Packet::new(BROADCAST_ADDRESS, PacketType::Data, vec![1, 2, 3])
        .unwrap()
        .encode()
        .to_vec();
    wire[10] ^= 0x40;
    writer.write_all(&wire).await.unwrap();

    let result = framed.next().await.unwrap();
    assert!(matches!(
        result,
        Err(Error::Framing(FramingError::BadChecksum { .. }))
    ));
}

#[tokio::test]
async fn test_stream_ends_cleanly_after_last_packet() {
    let (mut writer, reader) = tokio::io::duplex(1024);
    let mut framed = FramedRead::new(reader, SensorCodec::new());

    let ack = Packet::new(BROADCAST_ADDRESS, PacketType::Acknowledge, vec![0x00]).unwrap();
    writer.write_all(&ack.encode()).await.unwrap();
    drop(writer);

    assert_eq!(framed.next().await.unwrap().unwrap(), ack);
    assert!(framed.next().await.is_none());
}
