//! # Payload Model
//!
//! Closed set of payload shapes that can travel inside an envelope.
//!
//! Every message type declares the [`PayloadKind`] it carries; the codec and
//! registry compare that kind against the [`Payload`] value instead of looking
//! up types at runtime.
//!
//! Decoding is depth-limited: a value nested deeper than
//! [`MAX_PAYLOAD_DEPTH`] is rejected by the deserializer before it can recurse
//! further, whatever the wire format.

use crate::config::MAX_PAYLOAD_DEPTH;
use serde::de::{self, DeserializeSeed, EnumAccess, MapAccess, SeqAccess, Unexpected, VariantAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Structural shape of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadKind {
    Empty,
    Text,
    Binary,
    Integer,
    Boolean,
    List,
    Map,
}

impl PayloadKind {
    /// Get human-readable name
    pub fn name(self) -> &'static str {
        match self {
            PayloadKind::Empty => "empty",
            PayloadKind::Text => "text",
            PayloadKind::Binary => "binary",
            PayloadKind::Integer => "integer",
            PayloadKind::Boolean => "boolean",
            PayloadKind::List => "list",
            PayloadKind::Map => "map",
        }
    }
}

impl fmt::Display for PayloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A payload value.
///
/// Maps are ordered so two maps with the same entries compare equal no matter
/// the insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Payload {
    Empty,
    Text(String),
    Binary(Vec<u8>),
    Integer(i64),
    Boolean(bool),
    List(Vec<Payload>),
    Map(BTreeMap<String, Payload>),
}

impl Payload {
    /// The structural kind of this value
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Empty => PayloadKind::Empty,
            Payload::Text(_) => PayloadKind::Text,
            Payload::Binary(_) => PayloadKind::Binary,
            Payload::Integer(_) => PayloadKind::Integer,
            Payload::Boolean(_) => PayloadKind::Boolean,
            Payload::List(_) => PayloadKind::List,
            Payload::Map(_) => PayloadKind::Map,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Payload::Binary(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Payload::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Payload>> {
        match self {
            Payload::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Nesting depth, where scalars count as 1
    pub fn depth(&self) -> usize {
        match self {
            Payload::List(items) => 1 + items.iter().map(Payload::depth).max().unwrap_or(0),
            Payload::Map(entries) => 1 + entries.values().map(Payload::depth).max().unwrap_or(0),
            _ => 1,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Text(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Text(value)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Binary(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Payload::Integer(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Payload::Boolean(value)
    }
}

const VARIANTS: &[&str] = &["Empty", "Text", "Binary", "Integer", "Boolean", "List", "Map"];

// Same externally tagged layout as a derived impl, so every format keeps its
// wire shape; only the nesting depth is tracked on the way down.
impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PayloadSeed { depth: 1 }.deserialize(deserializer)
    }
}

#[derive(Clone, Copy)]
struct PayloadSeed {
    depth: usize,
}

impl<'de> DeserializeSeed<'de> for PayloadSeed {
    type Value = Payload;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Payload, D::Error> {
        if self.depth > MAX_PAYLOAD_DEPTH {
            return Err(de::Error::custom(format!(
                "payload nested deeper than {MAX_PAYLOAD_DEPTH} levels"
            )));
        }
        deserializer.deserialize_enum("Payload", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for PayloadSeed {
    type Value = Payload;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a payload")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Payload, A::Error> {
        let inner = PayloadSeed { depth: self.depth + 1 };
        let (kind, variant) = data.variant_seed(VariantTagSeed)?;
        match kind {
            PayloadKind::Empty => variant.unit_variant().map(|()| Payload::Empty),
            PayloadKind::Text => variant.newtype_variant().map(Payload::Text),
            PayloadKind::Binary => variant.newtype_variant().map(Payload::Binary),
            PayloadKind::Integer => variant.newtype_variant().map(Payload::Integer),
            PayloadKind::Boolean => variant.newtype_variant().map(Payload::Boolean),
            PayloadKind::List => variant.newtype_variant_seed(ListSeed(inner)).map(Payload::List),
            PayloadKind::Map => variant.newtype_variant_seed(MapSeed(inner)).map(Payload::Map),
        }
    }
}

/// Elements of a list, each decoded one level deeper
struct ListSeed(PayloadSeed);

impl<'de> DeserializeSeed<'de> for ListSeed {
    type Value = Vec<Payload>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed {
    type Value = Vec<Payload>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a list of payloads")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        // Length prefixes come off the wire, so they only hint the allocation
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(1024));
        while let Some(item) = seq.next_element_seed(self.0)? {
            items.push(item);
        }
        Ok(items)
    }
}

/// Values of a map, each decoded one level deeper
struct MapSeed(PayloadSeed);

impl<'de> DeserializeSeed<'de> for MapSeed {
    type Value = BTreeMap<String, Payload>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed {
    type Value = BTreeMap<String, Payload>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of payloads")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut entries = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(self.0)?;
            entries.insert(key, value);
        }
        Ok(entries)
    }
}

/// Variant tag of an encoded payload: an index for binary formats, a name for
/// self-describing ones
struct VariantTag;

impl<'de> Visitor<'de> for VariantTag {
    type Value = PayloadKind;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a payload variant")
    }

    fn visit_u64<E: de::Error>(self, index: u64) -> Result<PayloadKind, E> {
        match index {
            0 => Ok(PayloadKind::Empty),
            1 => Ok(PayloadKind::Text),
            2 => Ok(PayloadKind::Binary),
            3 => Ok(PayloadKind::Integer),
            4 => Ok(PayloadKind::Boolean),
            5 => Ok(PayloadKind::List),
            6 => Ok(PayloadKind::Map),
            _ => Err(E::invalid_value(Unexpected::Unsigned(index), &"variant index 0 <= i < 7")),
        }
    }

    fn visit_str<E: de::Error>(self, name: &str) -> Result<PayloadKind, E> {
        match name {
            "Empty" => Ok(PayloadKind::Empty),
            "Text" => Ok(PayloadKind::Text),
            "Binary" => Ok(PayloadKind::Binary),
            "Integer" => Ok(PayloadKind::Integer),
            "Boolean" => Ok(PayloadKind::Boolean),
            "List" => Ok(PayloadKind::List),
            "Map" => Ok(PayloadKind::Map),
            _ => Err(E::unknown_variant(name, VARIANTS)),
        }
    }

    fn visit_bytes<E: de::Error>(self, name: &[u8]) -> Result<PayloadKind, E> {
        match std::str::from_utf8(name) {
            Ok(name) => self.visit_str(name),
            Err(_) => Err(E::invalid_value(Unexpected::Bytes(name), &self)),
        }
    }
}

struct VariantTagSeed;

impl<'de> DeserializeSeed<'de> for VariantTagSeed {
    type Value = PayloadKind;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<PayloadKind, D::Error> {
        deserializer.deserialize_identifier(VariantTag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::serialization::{MultiFormat, SerializationFormat};

    fn nested(depth: usize) -> Payload {
        (1..depth).fold(Payload::Integer(7), |inner, _| Payload::List(vec![inner]))
    }

    #[test]
    fn test_kind_matches_variant() {
        assert_eq!(Payload::Empty.kind(), PayloadKind::Empty);
        assert_eq!(Payload::from("hi").kind(), PayloadKind::Text);
        assert_eq!(Payload::from(vec![1u8, 2]).kind(), PayloadKind::Binary);
        assert_eq!(Payload::from(5i64).kind(), PayloadKind::Integer);
        assert_eq!(Payload::from(true).kind(), PayloadKind::Boolean);
        assert_eq!(Payload::List(vec![]).kind(), PayloadKind::List);
        assert_eq!(Payload::Map(BTreeMap::new()).kind(), PayloadKind::Map);
    }

    #[test]
    fn test_map_equality_ignores_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("x".to_string(), Payload::Integer(1));
        a.insert("y".to_string(), Payload::Integer(2));
        let mut b = BTreeMap::new();
        b.insert("y".to_string(), Payload::Integer(2));
        b.insert("x".to_string(), Payload::Integer(1));
        assert_eq!(Payload::Map(a), Payload::Map(b));
    }

    #[test]
    fn test_depth() {
        let nested = Payload::List(vec![Payload::List(vec![Payload::Integer(1)])]);
        assert_eq!(nested.depth(), 3);
        assert_eq!(Payload::Text("a".into()).depth(), 1);
    }

    #[test]
    fn test_decode_accepts_depth_limit() {
        let payload = nested(MAX_PAYLOAD_DEPTH);
        assert_eq!(payload.depth(), MAX_PAYLOAD_DEPTH);
        for format in [SerializationFormat::Bincode, SerializationFormat::MessagePack] {
            let bytes = payload.serialize_format(format).unwrap();
            assert_eq!(Payload::deserialize_format(&bytes, format).unwrap(), payload);
        }
    }

    #[test]
    fn test_decode_rejects_nesting_past_limit() {
        let mut map = BTreeMap::new();
        map.insert("deep".to_string(), nested(MAX_PAYLOAD_DEPTH));
        let payload = Payload::Map(map);
        for format in [
            SerializationFormat::Bincode,
            SerializationFormat::Json,
            SerializationFormat::MessagePack,
        ] {
            let bytes = payload.serialize_format(format).unwrap();
            assert!(matches!(
                Payload::deserialize_format(&bytes, format),
                Err(crate::error::ProtocolError::DecodingFailure(_))
            ));
        }
    }

    #[test]
    fn test_every_variant_decodes_by_name_and_index() {
        let mut map = BTreeMap::new();
        map.insert("k".to_string(), Payload::Boolean(true));
        let payload = Payload::List(vec![
            Payload::Empty,
            Payload::from("t"),
            Payload::from(vec![1u8, 2]),
            Payload::Integer(-9),
            Payload::Map(map),
        ]);
        for format in [
            SerializationFormat::Bincode,
            SerializationFormat::Json,
            SerializationFormat::MessagePack,
        ] {
            let bytes = payload.serialize_format(format).unwrap();
            assert_eq!(Payload::deserialize_format(&bytes, format).unwrap(), payload);
        }
        assert!(serde_json::from_str::<Payload>(r#"{"Float": 1.5}"#).is_err());
    }
}
