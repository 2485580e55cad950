//! # Error Types
//!
//! Error taxonomy for the message core.
//!
//! This module defines every failure the codec, registry, dispatcher and
//! listener queue can report.
//!
//! ## Error Categories
//! - **Codec Errors**: `EncodingFailure`, `DecodingFailure`
//! - **Registry Errors**: `DuplicateTypeIdentifier`, `UnknownTypeIdentifier`
//! - **Dispatch Errors**: `HandlerNotFound`, `DuplicateHandlerKind`, `Handler`
//! - **Lifecycle Errors**: `QueueClosed`, `ContentAlreadySet`
//!
//! Configuration-time errors are fatal to startup. Per-message errors are
//! recoverable: the drain loop reports them and moves on to the next envelope
//! (see [`ProtocolError::is_recoverable`]).
//!
//! ## Example Usage
//! ```rust
//! use message_protocol::error::{ProtocolError, Result};
//! use tracing::{error, info};
//!
//! fn lookup(id: u32) -> Result<u32> {
//!     if id == 1 {
//!         Ok(id)
//!     } else {
//!         Err(ProtocolError::UnknownTypeIdentifier(id))
//!     }
//! }
//!
//! match lookup(99) {
//!     Ok(id) => info!(id, "Resolved"),
//!     Err(e) => error!(error = %e, recoverable = e.is_recoverable(), "Lookup failed"),
//! }
//! ```

use crate::protocol::message::HandlerKind;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Codec errors
    pub const ERR_MISSING_CONTENT: &str = "Envelope has no content";
    pub const ERR_EMPTY_BUFFER: &str = "Empty buffer";
    pub const ERR_INVALID_MAGIC: &str = "Invalid magic bytes";
    pub const ERR_TRUNCATED_HEADER: &str = "Truncated envelope header";
    pub const ERR_LENGTH_MISMATCH: &str = "Payload length does not match header";
}

/// ProtocolError is the primary error type for all message core operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Encoding failed: {0}")]
    EncodingFailure(String),

    #[error("Decoding failed: {0}")]
    DecodingFailure(String),

    #[error("Duplicate message type identifier: {0}")]
    DuplicateTypeIdentifier(u32),

    #[error("Unknown message type identifier: {0}")]
    UnknownTypeIdentifier(u32),

    #[error("No handler registered for kind {0}")]
    HandlerNotFound(HandlerKind),

    #[error("Handler kind {0} registered twice")]
    DuplicateHandlerKind(HandlerKind),

    #[error("Listener queue closed")]
    QueueClosed,

    #[error("Envelope content already set")]
    ContentAlreadySet,

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Whether the error concerns a single message, so the drain loop may
    /// report it and continue with the next envelope.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProtocolError::DecodingFailure(_)
                | ProtocolError::UnknownTypeIdentifier(_)
                | ProtocolError::HandlerNotFound(_)
                | ProtocolError::Handler(_)
        )
    }

    /// Short stable name used as a structured logging field and metrics key.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ProtocolError::EncodingFailure(_) => "encoding_failure",
            ProtocolError::DecodingFailure(_) => "decoding_failure",
            ProtocolError::DuplicateTypeIdentifier(_) => "duplicate_type_identifier",
            ProtocolError::UnknownTypeIdentifier(_) => "unknown_type_identifier",
            ProtocolError::HandlerNotFound(_) => "handler_not_found",
            ProtocolError::DuplicateHandlerKind(_) => "duplicate_handler_kind",
            ProtocolError::QueueClosed => "queue_closed",
            ProtocolError::ContentAlreadySet => "content_already_set",
            ProtocolError::Handler(_) => "handler",
            ProtocolError::ConfigError(_) => "config",
            ProtocolError::Io(_) => "io",
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;
