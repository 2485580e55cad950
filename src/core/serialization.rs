//! # Serialization Formats
//!
//! Abstraction over the serialization formats a payload codec can use.
//! Supports bincode (default), JSON (debugging/interop), and MessagePack (compact encoding).
//!
//! ## Features
//! - **Multiple formats**: Bincode, JSON, MessagePack, selected per codec
//! - **Format metadata**: `format_byte`/`from_byte` give the byte the envelope
//!   header carries, so the receiving side can decode without out-of-band agreement
//! - **Scratch-buffer friendly**: `serialize_format_into` appends to a caller-owned buffer
//!
//! ## Usage
//! ```rust
//! use message_protocol::core::payload::Payload;
//! use message_protocol::core::serialization::{MultiFormat, SerializationFormat};
//!
//! let payload = Payload::Text("hello".into());
//! let bytes = payload.serialize_format(SerializationFormat::MessagePack).unwrap();
//! let back = Payload::deserialize_format(&bytes, SerializationFormat::MessagePack).unwrap();
//! assert_eq!(payload, back);
//! ```

use crate::core::payload::Payload;
use crate::error::{ProtocolError, Result};
use bincode::Options;
use serde::{Deserialize, Serialize};

/// Supported serialization formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    /// Binary compact format (default, fastest)
    #[default]
    Bincode,
    /// Human-readable JSON format (debugging, interop)
    Json,
    /// Compact binary format (MessagePack, efficient)
    MessagePack,
}

impl SerializationFormat {
    /// Get the format identifier byte for wire protocol
    pub fn format_byte(self) -> u8 {
        match self {
            SerializationFormat::Bincode => 0x01,
            SerializationFormat::Json => 0x02,
            SerializationFormat::MessagePack => 0x03,
        }
    }

    /// Detect format from identifier byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(SerializationFormat::Bincode),
            0x02 => Some(SerializationFormat::Json),
            0x03 => Some(SerializationFormat::MessagePack),
            _ => None,
        }
    }

    /// Parse a configuration name, case-insensitively ("msgpack" is accepted too)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "bincode" => Some(SerializationFormat::Bincode),
            "json" => Some(SerializationFormat::Json),
            "messagepack" | "msgpack" => Some(SerializationFormat::MessagePack),
            _ => None,
        }
    }

    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            SerializationFormat::Bincode => "Bincode",
            SerializationFormat::Json => "JSON",
            SerializationFormat::MessagePack => "MessagePack",
        }
    }
}

// Fixed-width integers keep the bincode layout identical to `bincode::serialize`;
// trailing bytes after a value are rejected.
fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// Trait for types that support multiple serialization formats
pub trait MultiFormat: Serialize + for<'de> Deserialize<'de> + Sized {
    /// Serialize to bytes using the specified format
    fn serialize_format(&self, format: SerializationFormat) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.serialize_format_into(format, &mut out)?;
        Ok(out)
    }

    /// Serialize by appending to `out`. On failure `out` may hold partial output;
    /// callers own the buffer and must discard it.
    fn serialize_format_into(&self, format: SerializationFormat, out: &mut Vec<u8>) -> Result<()> {
        match format {
            SerializationFormat::Bincode => bincode_options()
                .serialize_into(&mut *out, self)
                .map_err(|e| ProtocolError::EncodingFailure(e.to_string())),
            SerializationFormat::Json => serde_json::to_writer(&mut *out, self)
                .map_err(|e| ProtocolError::EncodingFailure(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::encode::write(&mut *out, self)
                .map_err(|e| ProtocolError::EncodingFailure(e.to_string())),
        }
    }

    /// Deserialize from bytes using the specified format
    fn deserialize_format(data: &[u8], format: SerializationFormat) -> Result<Self> {
        match format {
            SerializationFormat::Bincode => bincode_options()
                .deserialize(data)
                .map_err(|e| ProtocolError::DecodingFailure(e.to_string())),
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| ProtocolError::DecodingFailure(e.to_string())),
            SerializationFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| ProtocolError::DecodingFailure(e.to_string())),
        }
    }
}

impl MultiFormat for Payload {}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SerializationFormat; 3] = [
        SerializationFormat::Bincode,
        SerializationFormat::Json,
        SerializationFormat::MessagePack,
    ];

    #[test]
    #[allow(clippy::expect_used)]
    fn test_format_byte_roundtrip() {
        for format in &ALL {
            let byte = format.format_byte();
            let recovered = SerializationFormat::from_byte(byte).expect("valid format byte");
            assert_eq!(*format, recovered);
        }
        assert_eq!(SerializationFormat::from_byte(0x7F), None);
    }

    #[test]
    fn test_format_names() {
        assert_eq!(SerializationFormat::Bincode.name(), "Bincode");
        assert_eq!(SerializationFormat::Json.name(), "JSON");
        assert_eq!(SerializationFormat::MessagePack.name(), "MessagePack");
        assert_eq!(SerializationFormat::from_name(" JSON "), Some(SerializationFormat::Json));
        assert_eq!(SerializationFormat::from_name("msgpack"), Some(SerializationFormat::MessagePack));
        assert_eq!(SerializationFormat::from_name("yaml"), None);
    }

    #[test]
    fn test_default_format() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::Bincode);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_bincode_layout_matches_plain_bincode() {
        let payload = Payload::Text("layout".into());
        let ours = payload
            .serialize_format(SerializationFormat::Bincode)
            .expect("serialize");
        let plain = bincode::serialize(&payload).expect("serialize");
        assert_eq!(ours, plain);
    }

    #[test]
    #[allow(clippy::expect_used)]
    fn test_format_sizes() {
        let payload = Payload::Text("size comparison".into());

        let json_size = payload.serialize_format(SerializationFormat::Json).expect("json").len();
        let msgpack_size = payload
            .serialize_format(SerializationFormat::MessagePack)
            .expect("msgpack")
            .len();

        // MessagePack should be more compact than JSON
        assert!(msgpack_size < json_size);
    }
}
