//! Performance benchmarks for SensorCodec and packet framing.
//!
//! A full image download is 288 data packets of 128 bytes at 57600 baud,
//! so framing must stay far below the serial line's own cost.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench packet_codec_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fingerbridge_core::constants::*;
use fingerbridge_protocol::{Packet, PacketType, SensorCodec};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

fn create_ack() -> Packet {
    Packet::new(BROADCAST_ADDRESS, PacketType::Acknowledge, vec![0x00]).unwrap()
}

fn create_data_packet(len: usize) -> Packet {
    let payload: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
    Packet::new(BROADCAST_ADDRESS, PacketType::Data, payload).unwrap()
}

/// Encode a full default-geometry image as it arrives from the module.
fn create_image_stream() -> BytesMut {
    let image_len = packed_image_len(DEFAULT_SENSOR_WIDTH, DEFAULT_SENSOR_HEIGHT);
    let image: Vec<u8> = (0..image_len).map(|i| (i % 251) as u8).collect();
    let mut codec = SensorCodec::new();
    let mut buffer = BytesMut::new();
    let chunks: Vec<&[u8]> = image.chunks(DEFAULT_DATA_PACKET_LEN).collect();
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.into_iter().enumerate() {
        let ty = if i == last {
            PacketType::DataEnd
        } else {
            PacketType::Data
        };
        let packet = Packet::new(BROADCAST_ADDRESS, ty, chunk.to_vec()).unwrap();
        codec.encode(packet, &mut buffer).unwrap();
    }
    buffer
}

/// Benchmark encoding an acknowledge packet.
fn bench_encode_ack(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_ack");
    group.throughput(Throughput::Elements(1));

    let packet = create_ack();

    group.bench_function("encode_ack_packet", |b| {
        b.iter(|| {
            let mut codec = SensorCodec::new();
            let mut buffer = BytesMut::new();
            codec.encode(black_box(packet.clone()), &mut buffer).unwrap();
            black_box(buffer);
        });
    });

    group.finish();
}

/// Benchmark decoding data packets of several payload sizes.
fn bench_decode_data_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_data_sizes");

    for size in [32, 128, 256].iter() {
        group.throughput(Throughput::Bytes(*size as u64));

        let encoded = create_data_packet(*size).encode();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut codec = SensorCodec::new();
                let mut buffer = BytesMut::from(&encoded[..]);
                let result = codec.decode(&mut buffer).unwrap();
                black_box(result);
            });
        });
    }

    group.finish();
}

/// Benchmark reassembling one whole image download.
fn bench_decode_image(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_image");

    let stream = create_image_stream().freeze();
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("decode_full_image", |b| {
        b.iter(|| {
            let mut codec = SensorCodec::new();
            let mut buffer = BytesMut::from(&stream[..]);
            let mut received = 0usize;

            while let Ok(Some(packet)) = codec.decode(&mut buffer) {
                received += packet.payload.len();
                if packet.packet_type == PacketType::DataEnd {
                    break;
                }
            }

            black_box(received);
        });
    });

    group.finish();
}

/// Benchmark decoding with bytes trickling in the way a UART delivers them.
fn bench_decode_partial_streaming(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_partial_streaming");
    group.throughput(Throughput::Elements(1));

    let full_frame = create_data_packet(DEFAULT_DATA_PACKET_LEN).encode();

    for chunk_size in [1, 8, 32].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("chunk_{}_bytes", chunk_size)),
            chunk_size,
            |b, &size| {
                b.iter(|| {
                    let mut codec = SensorCodec::new();
                    let mut buffer = BytesMut::new();
                    let mut result = None;

                    for chunk in full_frame.chunks(size) {
                        buffer.extend_from_slice(chunk);
                        if let Ok(Some(packet)) = codec.decode(&mut buffer) {
                            result = Some(packet);
                            break;
                        }
                    }

                    black_box(result);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark the checksum alone over a default data payload.
fn bench_checksum(c: &mut Criterion) {
    let mut group = c.benchmark_group("checksum");
    group.throughput(Throughput::Bytes(DEFAULT_DATA_PACKET_LEN as u64));

    let payload = vec![0xA5u8; DEFAULT_DATA_PACKET_LEN];

    group.bench_function("checksum_128_bytes", |b| {
        b.iter(|| {
            black_box(fingerbridge_protocol::checksum(
                PACKET_DATA,
                (DEFAULT_DATA_PACKET_LEN + CHECKSUM_LEN) as u16,
                black_box(&payload),
            ))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_encode_ack,
    bench_decode_data_sizes,
    bench_decode_image,
    bench_decode_partial_streaming,
    bench_checksum,
);

criterion_main!(benches);
