use bytes::BytesMut;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use message_protocol::core::frame::FrameCodec;
use message_protocol::prelude::*;
use std::sync::Arc;
use tokio_util::codec::{Decoder, Encoder};

const BLOB: MessageTypeDescriptor = MessageTypeDescriptor::new(
    1,
    MessageCategory::Monitor,
    PayloadKind::Binary,
    HandlerKind::Monitor,
);

#[allow(clippy::unwrap_used)]
fn bench_envelope_encode_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("envelope_encode_decode");
    let registry = Arc::new(MessageRegistry::with_descriptors([BLOB]).unwrap());
    let payload_sizes = [64usize, 512, 4096, 65536, 1024 * 1024];

    for format in [
        SerializationFormat::Bincode,
        SerializationFormat::Json,
        SerializationFormat::MessagePack,
    ] {
        let codec = EnvelopeCodec::new(registry.clone(), Codec::new(format));
        for &size in &payload_sizes {
            let envelope = Envelope::with_content(BLOB, Payload::Binary(vec![0xAB; size]));
            group.throughput(Throughput::Bytes(size as u64));

            group.bench_function(format!("{}_encode_{size}b", format.name()), |b| {
                b.iter(|| codec.encode(&envelope).unwrap())
            });

            let bytes = codec.encode(&envelope).unwrap();
            group.bench_function(format!("{}_decode_{size}b", format.name()), |b| {
                b.iter(|| {
                    let decoded = codec.decode(&bytes);
                    assert!(decoded.is_ok());
                })
            });
        }
    }

    group.finish();
}

#[allow(clippy::unwrap_used)]
fn bench_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("framing");
    for &size in &[64usize, 4096, 65536] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(format!("frame_roundtrip_{size}b"), |b| {
            b.iter_batched(
                || vec![0u8; size],
                |frame| {
                    let mut codec = FrameCodec::new(1024 * 1024);
                    let mut buf = BytesMut::with_capacity(size + 4);
                    codec.encode(frame, &mut buf).unwrap();
                    codec.decode(&mut buf).unwrap().unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_envelope_encode_decode, bench_framing);
criterion_main!(benches);
