//! # Configuration Management
//!
//! Centralized configuration for the message core.
//!
//! This module provides structured configuration for the codec, the
//! per-connection listener queue and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment-specific overrides via `from_env()`

use crate::core::serialization::SerializationFormat;
use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Current supported protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Magic bytes opening every encoded envelope ("MP")
pub const MAGIC_BYTES: [u8; 2] = [0x4D, 0x50];

/// Max allowed payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Deepest payload nesting accepted on decode; scalars are depth 1
pub const MAX_PAYLOAD_DEPTH: usize = 128;

/// Default scratch buffer capacity reserved by each codec
pub const DEFAULT_SCRATCH_CAPACITY: usize = 4096;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Codec configuration
    #[serde(default)]
    pub codec: CodecConfig,

    /// Listener queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Stream transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Read and parse a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ProtocolError::ConfigError(format!("Invalid TOML: {e}")))
    }

    /// Defaults overridden by `MESSAGE_PROTOCOL_*` variables.
    ///
    /// Unparseable numbers are ignored; an unknown format name is an error.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(name) = env::var("MESSAGE_PROTOCOL_FORMAT") {
            config.codec.format = SerializationFormat::from_name(&name).ok_or_else(|| {
                ProtocolError::ConfigError(format!("Unknown serialization format: {name}"))
            })?;
        }
        if let Some(size) = env_number("MESSAGE_PROTOCOL_MAX_PAYLOAD_SIZE") {
            config.codec.max_payload_size = size as usize;
        }
        if let Some(ms) = env_number("MESSAGE_PROTOCOL_DRAIN_TIMEOUT_MS") {
            config.queue.drain_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_number("MESSAGE_PROTOCOL_IDLE_TIMEOUT_MS") {
            config.transport.idle_timeout = Duration::from_millis(ms);
        }
        if let Some(depth) = env_number("MESSAGE_PROTOCOL_QUEUE_WARN_DEPTH") {
            config.queue.warn_depth = depth as usize;
        }

        Ok(config)
    }

    /// Defaults with `mutator` applied
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// The default configuration rendered as TOML
    pub fn example_config() -> String {
        Self::default()
            .to_toml()
            .unwrap_or_else(|_| String::from("# example configuration unavailable"))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Cannot render config: {e}")))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml()?).map_err(|e| {
            ProtocolError::ConfigError(format!("Cannot write {}: {e}", path.display()))
        })
    }

    /// Every problem found across all sections. Empty means valid.
    pub fn validate(&self) -> Vec<String> {
        [
            self.codec.validate(),
            self.queue.validate(),
            self.transport.validate(),
            self.logging.validate(),
        ]
        .concat()
    }

    /// [`validate`](Self::validate) folded into one `ConfigError`
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            return Ok(());
        }
        Err(ProtocolError::ConfigError(format!(
            "Configuration validation failed:\n  - {}",
            errors.join("\n  - ")
        )))
    }
}

fn env_number(name: &str) -> Option<u64> {
    env::var(name).ok()?.trim().parse().ok()
}

/// Codec configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CodecConfig {
    /// Serialization format used for outbound payloads
    pub format: SerializationFormat,

    /// Maximum encoded payload size in bytes
    pub max_payload_size: usize,

    /// Bytes reserved up front for the codec's scratch buffer
    #[serde(default = "default_scratch_capacity")]
    pub scratch_capacity: usize,
}

fn default_scratch_capacity() -> usize {
    DEFAULT_SCRATCH_CAPACITY
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            format: SerializationFormat::Bincode,
            max_payload_size: MAX_PAYLOAD_SIZE,
            scratch_capacity: DEFAULT_SCRATCH_CAPACITY,
        }
    }
}

impl CodecConfig {
    /// Largest frame the transport may deliver: header plus payload
    pub fn max_frame_size(&self) -> usize {
        self.max_payload_size + crate::core::codec::HEADER_SIZE
    }

    /// Validate codec configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_payload_size == 0 {
            errors.push("Max payload size cannot be 0".to_string());
        } else if self.max_payload_size > u32::MAX as usize {
            errors.push(format!(
                "Max payload size too large: {} bytes (length field is 32-bit)",
                self.max_payload_size
            ));
        } else if self.max_payload_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "Max payload size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_payload_size
            ));
        }

        if self.scratch_capacity > self.max_payload_size {
            errors.push("Scratch capacity cannot be larger than max payload size".to_string());
        }

        errors
    }
}

/// Listener queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    /// How long a disconnected queue may keep draining before it is force-closed
    #[serde(with = "duration_serde")]
    pub drain_timeout: Duration,

    /// Queue depth above which a warning is logged on enqueue (0 disables)
    pub warn_depth: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            drain_timeout: timeout::DRAIN_TIMEOUT,
            warn_depth: 1024,
        }
    }
}

impl QueueConfig {
    /// Validate queue configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.drain_timeout.as_millis() < 10 {
            errors.push("Drain timeout too short (minimum: 10ms)".to_string());
        } else if self.drain_timeout.as_secs() > 300 {
            errors.push("Drain timeout too long (maximum: 300s)".to_string());
        }

        if self.warn_depth > 10_000_000 {
            errors.push(format!(
                "Queue warn depth too large: {} (max recommended: 10,000,000)",
                self.warn_depth
            ));
        }

        errors
    }
}

/// Stream transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// How long an inbound stream may stay silent before the endpoint disconnects
    #[serde(with = "duration_serde")]
    pub idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            idle_timeout: timeout::IDLE_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.idle_timeout.as_millis() < 100 {
            errors.push("Idle timeout too short (minimum: 100ms)".to_string());
        } else if self.idle_timeout.as_secs() > 3600 {
            errors.push("Idle timeout too long (maximum: 1 hour)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,

    /// Whether to include the event target in log lines
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("message-protocol"),
            log_level: Level::INFO,
            json_format: false,
            with_target: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Durations as whole milliseconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// `tracing::Level` as a lowercase name
mod log_level_serde {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tracing::Level;

    pub fn serialize<S: Serializer>(level: &Level, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&level.as_str().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Level, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| D::Error::custom(format!("Invalid log level: {name}")))
    }
}
