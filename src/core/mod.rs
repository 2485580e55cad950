//! # Core Protocol Components
//!
//! Payload model, serialization formats, codecs and stream framing.
//!
//! ## Components
//! - **Payload**: Closed set of payload shapes
//! - **Serialization**: Bincode, JSON and MessagePack behind one trait
//! - **Codec**: Payload and envelope codecs
//! - **Frame**: Tokio codec for framing envelopes over byte streams
//!
//! ## Wire Format
//! ```text
//! [Magic(2)] [Version(1)] [Format(1)] [TypeId(4)] [Length(4)] [Payload(N)]
//! ```
//!
//! ## Security
//! - Maximum payload size: 16MB by default (prevents memory exhaustion)
//! - Magic bytes prevent accidental misinterpretation
//! - Length validation before decoding

pub mod codec;
pub mod frame;
pub mod payload;
pub mod serialization;
