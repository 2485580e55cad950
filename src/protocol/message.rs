//! # Message Model
//!
//! Descriptors and envelopes.
//!
//! A [`MessageTypeDescriptor`] binds a stable wire identifier to its category,
//! payload shape and handler kind. An [`Envelope`] carries one payload bound to
//! one descriptor from construction until a handler consumes it.

use crate::core::payload::{Payload, PayloadKind};
use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Informational grouping of message types. Used for filtering and logging,
/// never for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MessageCategory {
    Basic,
    System,
    Player,
    Event,
    Debug,
    Monitor,
    Auction,
}

impl MessageCategory {
    pub const ALL: [MessageCategory; 7] = [
        MessageCategory::Basic,
        MessageCategory::System,
        MessageCategory::Player,
        MessageCategory::Event,
        MessageCategory::Debug,
        MessageCategory::Monitor,
        MessageCategory::Auction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MessageCategory::Basic => "basic",
            MessageCategory::System => "system",
            MessageCategory::Player => "player",
            MessageCategory::Event => "event",
            MessageCategory::Debug => "debug",
            MessageCategory::Monitor => "monitor",
            MessageCategory::Auction => "auction",
        }
    }
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Selects the handler implementation that processes a message type.
///
/// `Custom` lets an embedding application add its own handlers while the set
/// stays closed and hashable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandlerKind {
    Echo,
    Error,
    Heartbeat,
    Session,
    Player,
    Event,
    Debug,
    Monitor,
    Auction,
    Custom(u16),
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerKind::Echo => f.write_str("echo"),
            HandlerKind::Error => f.write_str("error"),
            HandlerKind::Heartbeat => f.write_str("heartbeat"),
            HandlerKind::Session => f.write_str("session"),
            HandlerKind::Player => f.write_str("player"),
            HandlerKind::Event => f.write_str("event"),
            HandlerKind::Debug => f.write_str("debug"),
            HandlerKind::Monitor => f.write_str("monitor"),
            HandlerKind::Auction => f.write_str("auction"),
            HandlerKind::Custom(n) => write!(f, "custom({n})"),
        }
    }
}

/// Registered metadata for one message type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageTypeDescriptor {
    pub id: u32,
    pub category: MessageCategory,
    pub payload_kind: PayloadKind,
    pub handler_kind: HandlerKind,
}

impl MessageTypeDescriptor {
    pub const fn new(
        id: u32,
        category: MessageCategory,
        payload_kind: PayloadKind,
        handler_kind: HandlerKind,
    ) -> Self {
        Self {
            id,
            category,
            payload_kind,
            handler_kind,
        }
    }

    /// Whether `payload` has the shape this type declares
    pub fn accepts(&self, payload: &Payload) -> bool {
        payload.kind() == self.payload_kind
    }
}

impl fmt::Display for MessageTypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {} -> {}",
            self.id, self.category, self.payload_kind, self.handler_kind
        )
    }
}

/// An application's fixed catalog of message types, registered as one batch.
///
/// ```rust
/// use message_protocol::core::payload::PayloadKind;
/// use message_protocol::protocol::message::*;
///
/// enum Chat { Say, Whisper }
///
/// impl MessageType for Chat {
///     fn descriptor(&self) -> MessageTypeDescriptor {
///         match self {
///             Chat::Say => MessageTypeDescriptor::new(10, MessageCategory::Player, PayloadKind::Text, HandlerKind::Player),
///             Chat::Whisper => MessageTypeDescriptor::new(11, MessageCategory::Player, PayloadKind::Map, HandlerKind::Player),
///         }
///     }
/// }
///
/// impl MessageCatalog for Chat {
///     fn catalog() -> Vec<Self> { vec![Chat::Say, Chat::Whisper] }
/// }
/// ```
pub trait MessageCatalog: MessageType + Sized {
    fn catalog() -> Vec<Self>;

    fn descriptors() -> Vec<MessageTypeDescriptor> {
        Self::catalog().iter().map(MessageType::descriptor).collect()
    }
}

/// A typed call-site handle for one message type
pub trait MessageType {
    fn descriptor(&self) -> MessageTypeDescriptor;
}

impl MessageType for MessageTypeDescriptor {
    fn descriptor(&self) -> MessageTypeDescriptor {
        *self
    }
}

/// The typed wrapper around one message payload.
///
/// `properties` hold out-of-band metadata (peer address, receive time, ...)
/// and are never encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    descriptor: MessageTypeDescriptor,
    content: Option<Payload>,
    properties: HashMap<String, serde_json::Value>,
}

impl Envelope {
    /// Create an envelope with no content yet
    pub fn new(descriptor: MessageTypeDescriptor) -> Self {
        Self {
            descriptor,
            content: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_content(descriptor: MessageTypeDescriptor, content: Payload) -> Self {
        Self {
            descriptor,
            content: Some(content),
            properties: HashMap::new(),
        }
    }

    pub fn descriptor(&self) -> &MessageTypeDescriptor {
        &self.descriptor
    }

    pub fn type_id(&self) -> u32 {
        self.descriptor.id
    }

    pub fn category(&self) -> MessageCategory {
        self.descriptor.category
    }

    pub fn handler_kind(&self) -> HandlerKind {
        self.descriptor.handler_kind
    }

    pub fn content(&self) -> Option<&Payload> {
        self.content.as_ref()
    }

    /// Set the payload. Content is set once; a second call fails.
    pub fn set_content(&mut self, content: Payload) -> Result<()> {
        if self.content.is_some() {
            return Err(ProtocolError::ContentAlreadySet);
        }
        self.content = Some(content);
        Ok(())
    }

    /// Consume the envelope and return its payload
    pub fn into_content(self) -> Option<Payload> {
        self.content
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    pub fn properties(&self) -> &HashMap<String, serde_json::Value> {
        &self.properties
    }

    pub fn set_property<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.properties.insert(key.into(), value.into());
    }

    /// Builder form of [`Envelope::set_property`]
    pub fn with_property<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        self.set_property(key, value);
        self
    }
}
