//! # Utility Modules
//!
//! Supporting utilities for logging, observability and timing.
//!
//! ## Components
//! - **Logging**: Structured logging configuration
//! - **Metrics**: Observer hook and thread-safe counters
//! - **Timeout**: Shared durations and async timeout wrappers

pub mod logging;
pub mod metrics;
pub mod timeout;

pub use metrics::{Metrics, MetricsSnapshot, NoopObserver, ObserverSet, ProtocolObserver, TracingObserver};
