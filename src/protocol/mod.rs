//! # Protocol Layer
//!
//! Message model, registry, dispatch and per-connection queueing.
//!
//! ## Components
//! - **Message**: Type descriptors, handler kinds and envelopes
//! - **Registry**: Identifier to descriptor table, populated once at startup
//! - **Dispatcher**: Handler-kind routing with lazily built, shared handlers
//! - **Queue**: Listener queue with Open, Draining and Closed states
//! - **Endpoint**: Decode, enqueue, drain and encode for one connection
//!
//! ## Flow
//! ```text
//! bytes -> EnvelopeCodec::decode -> ListenerQueue -> drain loop -> Dispatcher -> handler
//! handler -> Envelope -> EnvelopeCodec::encode -> bytes
//! ```

pub mod dispatcher;
pub mod endpoint;
pub mod message;
pub mod queue;
pub mod registry;
