//! # Codecs
//!
//! [`Codec`] turns a [`Payload`] into bytes and back using one
//! [`SerializationFormat`]. [`EnvelopeCodec`] adds the envelope header and
//! resolves type identifiers against a shared [`MessageRegistry`].
//!
//! ## Wire Format
//! ```text
//! [Magic(2)] [Version(1)] [Format(1)] [TypeId(4)] [Length(4)] [Payload(N)]
//! ```
//! All integers are big-endian. Envelope properties are never written.
//!
//! ## Scratch buffers
//! Each codec owns one scratch buffer behind a mutex. It is cleared before and
//! after every call, so concurrent callers are safe and no bytes carry over
//! between calls. Use one codec per connection to avoid contention.

use crate::config::{CodecConfig, MAGIC_BYTES, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
use crate::core::payload::Payload;
use crate::core::serialization::{MultiFormat, SerializationFormat};
use crate::error::constants::{
    ERR_EMPTY_BUFFER, ERR_INVALID_MAGIC, ERR_LENGTH_MISMATCH, ERR_MISSING_CONTENT,
    ERR_TRUNCATED_HEADER,
};
use crate::error::{ProtocolError, Result};
use crate::protocol::message::Envelope;
use crate::protocol::registry::MessageRegistry;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{instrument, trace};

/// Envelope header size in bytes
pub const HEADER_SIZE: usize = 12;

/// Scratch capacity retained between calls; larger buffers are shrunk back
const RETAINED_SCRATCH_CAPACITY: usize = 64 * 1024;

/// Payload codec bound to one serialization format
#[derive(Debug)]
pub struct Codec {
    format: SerializationFormat,
    max_payload_size: usize,
    scratch: Mutex<Vec<u8>>,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(SerializationFormat::default())
    }
}

impl Codec {
    pub fn new(format: SerializationFormat) -> Self {
        Self::with_limit(format, MAX_PAYLOAD_SIZE)
    }

    pub fn with_limit(format: SerializationFormat, max_payload_size: usize) -> Self {
        Self {
            format,
            max_payload_size,
            scratch: Mutex::new(Vec::new()),
        }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        let codec = Self::with_limit(config.format, config.max_payload_size);
        if let Ok(mut scratch) = codec.scratch.lock() {
            scratch.reserve(config.scratch_capacity);
        }
        codec
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Encode a payload. Fails without partial output.
    pub fn encode(&self, payload: &Payload) -> Result<Vec<u8>> {
        self.with_scratch(|buf| {
            payload.serialize_format_into(self.format, buf)?;
            self.check_encoded_size(buf.len())?;
            Ok(buf.to_vec())
        })
    }

    /// Decode a payload written with this codec's format
    pub fn decode(&self, bytes: &[u8]) -> Result<Payload> {
        self.decode_as(bytes, self.format)
    }

    /// Decode a payload written with an explicit format
    pub fn decode_as(&self, bytes: &[u8], format: SerializationFormat) -> Result<Payload> {
        if bytes.len() > self.max_payload_size {
            return Err(ProtocolError::DecodingFailure(format!(
                "Payload too large: {} bytes (max {})",
                bytes.len(),
                self.max_payload_size
            )));
        }
        Payload::deserialize_format(bytes, format)
    }

    fn check_encoded_size(&self, len: usize) -> Result<()> {
        if len > self.max_payload_size {
            return Err(ProtocolError::EncodingFailure(format!(
                "Payload too large: {len} bytes (max {})",
                self.max_payload_size
            )));
        }
        Ok(())
    }

    fn with_scratch<T>(&self, f: impl FnOnce(&mut Vec<u8>) -> Result<T>) -> Result<T> {
        // A panic while holding the lock cannot leave bytes behind: the buffer is cleared below.
        let mut scratch = self.scratch.lock().unwrap_or_else(PoisonError::into_inner);
        scratch.clear();
        let result = f(&mut *scratch);
        scratch.clear();
        if scratch.capacity() > RETAINED_SCRATCH_CAPACITY {
            scratch.shrink_to(RETAINED_SCRATCH_CAPACITY);
        }
        result
    }
}

/// Parsed envelope header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeHeader {
    pub version: u8,
    pub format: SerializationFormat,
    pub type_id: u32,
    pub length: usize,
}

impl EnvelopeHeader {
    /// Parse and validate the fixed-size header at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(ProtocolError::DecodingFailure(ERR_EMPTY_BUFFER.to_string()));
        }
        if bytes.len() < HEADER_SIZE {
            return Err(ProtocolError::DecodingFailure(ERR_TRUNCATED_HEADER.to_string()));
        }
        if bytes[0..2] != MAGIC_BYTES {
            return Err(ProtocolError::DecodingFailure(ERR_INVALID_MAGIC.to_string()));
        }

        let version = bytes[2];
        if version != PROTOCOL_VERSION {
            return Err(ProtocolError::DecodingFailure(format!(
                "Unsupported protocol version: {version}"
            )));
        }

        let format = SerializationFormat::from_byte(bytes[3]).ok_or_else(|| {
            ProtocolError::DecodingFailure(format!("Unknown format byte: {}", bytes[3]))
        })?;

        let type_id = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let length = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;

        Ok(Self {
            version,
            format,
            type_id,
            length,
        })
    }
}

/// Envelope codec: header framing plus registry-backed type resolution
#[derive(Debug)]
pub struct EnvelopeCodec {
    registry: Arc<MessageRegistry>,
    codec: Codec,
}

impl EnvelopeCodec {
    pub fn new(registry: Arc<MessageRegistry>, codec: Codec) -> Self {
        Self { registry, codec }
    }

    pub fn registry(&self) -> &Arc<MessageRegistry> {
        &self.registry
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Encode an envelope for sending.
    ///
    /// The envelope must carry content whose kind matches its descriptor, and
    /// its type must be registered.
    #[instrument(level = "trace", skip_all, fields(type_id = envelope.type_id()))]
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        let descriptor = envelope.descriptor();
        let registered = self.registry.resolve(descriptor.id)?;
        if registered != descriptor {
            return Err(ProtocolError::EncodingFailure(format!(
                "Envelope descriptor {descriptor} does not match registered {registered}"
            )));
        }

        let content = envelope
            .content()
            .ok_or_else(|| ProtocolError::EncodingFailure(ERR_MISSING_CONTENT.to_string()))?;
        if !descriptor.accepts(content) {
            return Err(ProtocolError::EncodingFailure(format!(
                "Type {} expects a {} payload, got {}",
                descriptor.id,
                descriptor.payload_kind,
                content.kind()
            )));
        }

        let format = self.codec.format;
        self.codec.with_scratch(|buf| {
            buf.extend_from_slice(&MAGIC_BYTES);
            buf.push(PROTOCOL_VERSION);
            buf.push(format.format_byte());
            buf.extend_from_slice(&descriptor.id.to_be_bytes());
            buf.extend_from_slice(&[0u8; 4]);

            content.serialize_format_into(format, buf)?;

            let length = buf.len() - HEADER_SIZE;
            self.codec.check_encoded_size(length)?;
            buf[8..HEADER_SIZE].copy_from_slice(&(length as u32).to_be_bytes());

            trace!(bytes = buf.len(), "Envelope encoded");
            Ok(buf.to_vec())
        })
    }

    /// Decode an envelope received from the transport.
    ///
    /// The buffer is only borrowed. Unregistered type ids fail with
    /// `UnknownTypeIdentifier`, everything else with `DecodingFailure`.
    #[instrument(level = "trace", skip_all, fields(bytes = bytes.len()))]
    pub fn decode(&self, bytes: &[u8]) -> Result<Envelope> {
        let header = EnvelopeHeader::parse(bytes)?;
        let body = &bytes[HEADER_SIZE..];
        if body.len() != header.length {
            return Err(ProtocolError::DecodingFailure(format!(
                "{ERR_LENGTH_MISMATCH}: header {} bytes, got {}",
                header.length,
                body.len()
            )));
        }

        let descriptor = *self.registry.resolve(header.type_id)?;
        let payload = self.codec.decode_as(body, header.format)?;
        if !descriptor.accepts(&payload) {
            return Err(ProtocolError::DecodingFailure(format!(
                "Type {} expects a {} payload, got {}",
                descriptor.id,
                descriptor.payload_kind,
                payload.kind()
            )));
        }

        Ok(Envelope::with_content(descriptor, payload))
    }
}
