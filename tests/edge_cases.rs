#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests: corrupted input, boundary sizes, queue lifecycle and
//! per-message failure isolation.

use message_protocol::core::codec::{EnvelopeHeader, HEADER_SIZE};
use message_protocol::prelude::*;
use message_protocol::utils::Metrics;
use std::sync::{Arc, Mutex};

const NOTE: MessageTypeDescriptor = MessageTypeDescriptor::new(
    1,
    MessageCategory::Basic,
    PayloadKind::Text,
    HandlerKind::Echo,
);
const BLOB: MessageTypeDescriptor = MessageTypeDescriptor::new(
    2,
    MessageCategory::Monitor,
    PayloadKind::Binary,
    HandlerKind::Monitor,
);
const UNHANDLED: MessageTypeDescriptor = MessageTypeDescriptor::new(
    3,
    MessageCategory::Auction,
    PayloadKind::Text,
    HandlerKind::Auction,
);

fn registry() -> Arc<MessageRegistry> {
    Arc::new(MessageRegistry::with_descriptors([NOTE, BLOB, UNHANDLED]).unwrap())
}

fn codec() -> EnvelopeCodec {
    EnvelopeCodec::new(registry(), Codec::default())
}

fn encoded_note(text: &str) -> Vec<u8> {
    let codec = codec();
    codec
        .encode(&Envelope::with_content(NOTE, Payload::from(text)))
        .unwrap()
}

fn assert_decoding_failure(result: Result<Envelope>) {
    match result {
        Err(ProtocolError::DecodingFailure(_)) => {}
        other => panic!("expected DecodingFailure, got {other:?}"),
    }
}

// ============================================================================
// CODEC EDGE CASES
// ============================================================================

#[test]
fn test_empty_and_truncated_buffers() {
    let codec = codec();
    assert_decoding_failure(codec.decode(&[]));

    let bytes = encoded_note("hello");
    assert_decoding_failure(codec.decode(&bytes[..HEADER_SIZE - 1]));
    assert_decoding_failure(codec.decode(&bytes[..bytes.len() - 1]));
}

#[test]
fn test_trailing_bytes_rejected() {
    let mut bytes = encoded_note("hello");
    bytes.push(0);
    assert_decoding_failure(codec().decode(&bytes));
}

#[test]
fn test_corrupted_header_fields() {
    let codec = codec();
    let original = encoded_note("hello");

    let mut bad_magic = original.clone();
    bad_magic[0] ^= 0xFF;
    assert_decoding_failure(codec.decode(&bad_magic));

    let mut bad_version = original.clone();
    bad_version[2] = 99;
    assert_decoding_failure(codec.decode(&bad_version));

    let mut bad_format = original.clone();
    bad_format[3] = 200;
    assert_decoding_failure(codec.decode(&bad_format));

    let mut unknown_type = original.clone();
    unknown_type[4..8].copy_from_slice(&99u32.to_be_bytes());
    assert!(matches!(
        codec.decode(&unknown_type),
        Err(ProtocolError::UnknownTypeIdentifier(99))
    ));

    // Registered id whose declared payload kind does not match the bytes
    let mut wrong_kind = original.clone();
    wrong_kind[4..8].copy_from_slice(&BLOB.id.to_be_bytes());
    assert_decoding_failure(codec.decode(&wrong_kind));
}

#[test]
fn test_decode_leaves_input_untouched() {
    let bytes = encoded_note("immutable");
    let copy = bytes.clone();
    let _ = codec().decode(&bytes[..bytes.len() - 2]);
    let _ = codec().decode(&bytes);
    assert_eq!(bytes, copy);
}

#[test]
fn test_header_parse() {
    let bytes = encoded_note("hi");
    let header = EnvelopeHeader::parse(&bytes).unwrap();
    assert_eq!(header.type_id, 1);
    assert_eq!(header.format, SerializationFormat::Bincode);
    assert_eq!(header.length, bytes.len() - HEADER_SIZE);
}

#[test]
fn test_payload_size_limit() {
    let registry = registry();
    let small = EnvelopeCodec::new(registry.clone(), Codec::with_limit(SerializationFormat::Bincode, 64));

    let big = Envelope::with_content(BLOB, Payload::Binary(vec![7; 1024]));
    assert!(matches!(small.encode(&big), Err(ProtocolError::EncodingFailure(_))));

    let large = EnvelopeCodec::new(registry, Codec::default());
    let bytes = large.encode(&big).unwrap();
    assert_decoding_failure(small.decode(&bytes));
}

#[test]
fn test_encode_rejects_missing_or_mismatched_content() {
    let codec = codec();
    assert!(matches!(
        codec.encode(&Envelope::new(NOTE)),
        Err(ProtocolError::EncodingFailure(_))
    ));
    assert!(matches!(
        codec.encode(&Envelope::with_content(NOTE, Payload::Integer(5))),
        Err(ProtocolError::EncodingFailure(_))
    ));
}

#[test]
fn test_properties_do_not_travel() {
    let codec = codec();
    let envelope = Envelope::with_content(NOTE, Payload::from("x")).with_property("peer", "10.0.0.1");
    let decoded = codec.decode(&codec.encode(&envelope).unwrap()).unwrap();
    assert!(decoded.properties().is_empty());
    assert_eq!(decoded.content(), envelope.content());
}

// ============================================================================
// QUEUE LIFECYCLE
// ============================================================================

#[test]
fn test_closed_queue_rejects_everything() {
    let queue = ListenerQueue::new("edge");
    queue.enqueue(Envelope::with_content(NOTE, Payload::from("a"))).unwrap();
    queue.disconnect();
    assert!(queue.dequeue_next().unwrap().is_some());
    assert!(queue.dequeue_next().unwrap().is_none());

    assert_eq!(queue.state(), QueueState::Closed);
    assert!(matches!(
        queue.enqueue(Envelope::with_content(NOTE, Payload::from("b"))),
        Err(ProtocolError::QueueClosed)
    ));
    assert!(matches!(queue.dequeue_next(), Err(ProtocolError::QueueClosed)));
    assert_eq!(queue.force_close(), 0);
}

#[test]
fn test_disconnect_on_empty_queue() {
    let queue = ListenerQueue::new("edge");
    assert!(queue.disconnect());
    assert_eq!(queue.state(), QueueState::Draining);
    assert!(queue.dequeue_next().unwrap().is_none());
    assert!(queue.is_closed());
}

#[tokio::test]
async fn test_recv_on_closed_queue_errors() {
    let queue = ListenerQueue::new("edge");
    queue.force_close();
    assert!(matches!(queue.recv().await, Err(ProtocolError::QueueClosed)));
}

// ============================================================================
// DISPATCH ISOLATION
// ============================================================================

#[test]
fn test_handler_not_found_does_not_stop_draining() {
    let mut dispatcher: Dispatcher<Mutex<Vec<String>>> = Dispatcher::new(registry());
    dispatcher
        .register(HandlerKind::Echo, |log: &Mutex<Vec<String>>, env: Envelope| -> Result<()> {
            log.lock()
                .unwrap()
                .push(env.content().and_then(Payload::as_text).unwrap_or_default().to_string());
            Ok(())
        })
        .unwrap();

    let metrics = Arc::new(Metrics::new());
    let endpoint = Endpoint::new("edge", Arc::new(dispatcher), &ProtocolConfig::default())
        .with_observer(metrics.clone());

    let e1 = endpoint.send(&Envelope::with_content(NOTE, Payload::from("e1"))).unwrap();
    let e2 = endpoint.send(&Envelope::with_content(UNHANDLED, Payload::from("e2"))).unwrap();
    let e3 = endpoint.send(&Envelope::with_content(NOTE, Payload::from("e3"))).unwrap();
    for bytes in [&e1, &e2, &e3] {
        endpoint.receive(bytes).unwrap();
    }
    assert!(endpoint.receive(&[1, 2, 3]).is_err());

    let log = Mutex::new(Vec::new());
    let report = endpoint.drain_pending(&log).unwrap();
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(*log.lock().unwrap(), vec!["e1".to_string(), "e3".to_string()]);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.handlers_not_found, 1);
    assert_eq!(snapshot.decoding_failures, 1);
    assert_eq!(snapshot.decoded, 3);
}
