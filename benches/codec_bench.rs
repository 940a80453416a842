//! Performance benchmarks for the binary and text encodings.
//!
//! A master polls every node every few hundred milliseconds, so frame
//! handling must stay far below a millisecond per message.
//!
//! Run benchmarks with:
//! ```sh
//! cargo bench --bench codec_bench
//! ```

use bytes::BytesMut;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use doorlink_core::{DeviceKind, NodeUid};
use doorlink_protocol::{Envelope, Message, TextCodec, binary, text};
use std::hint::black_box;
use tokio_util::codec::{Decoder, Encoder};

fn card_read() -> Message {
    Message::CardRead {
        reader_id: 2,
        code: 1000,
        bits: 26,
    }
}

fn identity() -> Message {
    Message::IdentifyResponse {
        uid: NodeUid::new("E6614103E7452D2F").unwrap(),
        device_kind: DeviceKind::Rp2040,
        address: 1,
        reader_count: 4,
    }
}

/// Benchmark binary encode and decode of a card read.
fn bench_binary(c: &mut Criterion) {
    let mut group = c.benchmark_group("binary");
    group.throughput(Throughput::Elements(1));

    let msg = card_read();
    let bytes = binary::encode_to_bytes(&msg).unwrap();

    group.bench_function("encode_card_read", |b| {
        b.iter(|| black_box(binary::encode_to_bytes(black_box(&msg)).unwrap()));
    });

    group.bench_function("decode_card_read", |b| {
        b.iter(|| black_box(binary::decode_bytes(black_box(&bytes)).unwrap()));
    });

    let identity_bytes = binary::encode_to_bytes(&identity()).unwrap();
    group.bench_function("decode_identity", |b| {
        b.iter(|| black_box(binary::decode_bytes(black_box(&identity_bytes)).unwrap()));
    });

    group.finish();
}

/// Benchmark text encode and decode of single lines.
fn bench_text(c: &mut Criterion) {
    let mut group = c.benchmark_group("text");
    group.throughput(Throughput::Elements(1));

    for (name, msg) in [("card_read", card_read()), ("identity", identity())] {
        let envelope = Envelope::new(1, msg);
        let line = text::encode_line(&envelope).unwrap();

        group.bench_with_input(BenchmarkId::new("encode", name), &envelope, |b, env| {
            b.iter(|| black_box(text::encode_line(black_box(env)).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("decode", name), &line, |b, line| {
            b.iter(|| black_box(text::decode_line(black_box(line)).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark decoding a buffer of many lines through the stream codec.
fn bench_stream_decode_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_decode_batch");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));

        let mut codec = TextCodec::new();
        let mut encoded = BytesMut::new();
        for i in 0..*batch_size {
            codec
                .encode(Envelope::new((i % 32) as u8, card_read()), &mut encoded)
                .unwrap();
        }
        let encoded_bytes = encoded.freeze();

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, _| {
                b.iter(|| {
                    let mut codec = TextCodec::new();
                    let mut buffer = BytesMut::from(&encoded_bytes[..]);
                    let mut count = 0;

                    while let Ok(Some(Ok(_))) = codec.decode(&mut buffer) {
                        count += 1;
                    }

                    black_box(count);
                });
            },
        );
    }

    group.finish();
}

/// Benchmark a stream where every other line is noise.
fn bench_stream_with_noise(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_with_noise");
    group.throughput(Throughput::Elements(200));

    let good = text::encode_line(&Envelope::new(1, Message::Heartbeat)).unwrap();
    let mut input = String::new();
    for _ in 0..100 {
        input.push_str(&good);
        input.push_str("<{\"type\":\"heartbeat\",\"hub_addr\":1}>|00\n");
    }

    group.bench_function("mixed", |b| {
        b.iter(|| {
            let mut codec = TextCodec::new();
            let mut buffer = BytesMut::from(input.as_bytes());
            let mut accepted = 0;

            while let Ok(Some(item)) = codec.decode(&mut buffer) {
                if item.is_ok() {
                    accepted += 1;
                }
            }

            black_box(accepted);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_binary,
    bench_text,
    bench_stream_decode_batch,
    bench_stream_with_noise,
);

criterion_main!(benches);
