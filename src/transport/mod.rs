//! # Transport Layer
//!
//! Moves encoded envelopes over byte streams. Any `AsyncRead`/`AsyncWrite`
//! works: TCP, Unix sockets or in-memory duplex pipes.

pub mod stream;
