//! # Message Protocol
//!
//! Message-type registry, envelope codec and handler dispatch for a
//! connection-oriented messaging server.
//!
//! ## Layers
//! - [`core`]: payloads, serialization formats, envelope codec and framing
//! - [`protocol`]: registry, dispatcher, listener queue and endpoint
//! - [`transport`]: byte-stream pump feeding an endpoint
//! - [`utils`]: logging, observer hooks, metrics and timeouts
//!
//! ## Quick Start
//! ```rust
//! use message_protocol::prelude::*;
//! use std::sync::Arc;
//!
//! const ECHO: MessageTypeDescriptor =
//!     MessageTypeDescriptor::new(1, MessageCategory::Basic, PayloadKind::Text, HandlerKind::Echo);
//!
//! let registry = Arc::new(MessageRegistry::with_descriptors([ECHO]).unwrap());
//! let mut dispatcher: Dispatcher<()> = Dispatcher::new(registry);
//! dispatcher
//!     .register(HandlerKind::Echo, |_: &(), env: Envelope| -> Result<()> {
//!         assert_eq!(env.content().and_then(Payload::as_text), Some("hi"));
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let endpoint = Endpoint::new("demo", Arc::new(dispatcher), &ProtocolConfig::default());
//! let bytes = endpoint.send(&endpoint.envelope(1, Payload::from("hi")).unwrap()).unwrap();
//! endpoint.receive(&bytes).unwrap();
//! assert_eq!(endpoint.drain_pending(&()).unwrap().dispatched, 1);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod utils;

pub use config::ProtocolConfig;
pub use error::{ProtocolError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::config::ProtocolConfig;
    pub use crate::core::codec::{Codec, EnvelopeCodec};
    pub use crate::core::payload::{Payload, PayloadKind};
    pub use crate::core::serialization::SerializationFormat;
    pub use crate::error::{ProtocolError, Result};
    pub use crate::protocol::dispatcher::{Dispatcher, MessageHandler};
    pub use crate::protocol::endpoint::{DrainReport, Endpoint};
    pub use crate::protocol::message::{
        Envelope, HandlerKind, MessageCatalog, MessageCategory, MessageType, MessageTypeDescriptor,
    };
    pub use crate::protocol::queue::{ListenerQueue, QueueState};
    pub use crate::protocol::registry::MessageRegistry;
}
