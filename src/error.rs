//! Error types for the live-view pipeline.
//!
//! Only a failed socket bind (and a failed control-channel start) escalate out of
//! [`LiveViewSession::start`](crate::LiveViewSession::start). Everything else is
//! absorbed where it happens and shows up in health statistics instead: lossy
//! live video expects momentary frame loss and must keep streaming.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: the UDP socket could not be bound
//! - **Malformed Packets**: datagrams too short or with an overrunning extension
//! - **Decode Errors**: the image library rejected assembled JPEG bytes
//! - **Control Errors**: the camera control client failed to start or stop a stream
//! - **Config Errors**: invalid configuration values
//! - **Worker Errors**: the OS refused to spawn a pipeline thread
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use liveview::LiveViewError;
//!
//! let error = LiveViewError::control_failed("start_stream", "camera busy");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for live-view operations.
pub type Result<T, E = LiveViewError> = std::result::Result<T, E>;

/// Main error type for live-view operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LiveViewError {
    #[error("Failed to bind UDP socket on {addr}")]
    Transport {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed packet ({len} bytes): {reason}")]
    MalformedPacket { len: usize, reason: String },

    #[error("Failed to decode frame {timestamp}: {details}")]
    Decode { timestamp: u32, details: String },

    #[error("Camera control '{operation}' failed: {reason}")]
    Control {
        operation: String,
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid configuration for '{field}': {details}")]
    Config { field: String, details: String },

    #[error("Invalid frame: {details}")]
    InvalidFrame { details: String },

    #[error("Failed to spawn {name} thread")]
    Worker {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl LiveViewError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            LiveViewError::Transport { .. } => true,
            LiveViewError::Control { .. } => true,
            LiveViewError::MalformedPacket { .. } => false,
            LiveViewError::Decode { .. } => false,
            LiveViewError::Config { .. } => false,
            LiveViewError::InvalidFrame { .. } => false,
            LiveViewError::Worker { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            LiveViewError::Transport { .. } => vec![
                "Start the session again to pick a different port",
                "Check that no other process holds the port range",
                "Verify the bind address belongs to this host",
            ],
            LiveViewError::MalformedPacket { .. } => vec![
                "Check that the sender speaks the camera live-view protocol",
                "Inspect captured packets for truncation",
            ],
            LiveViewError::Decode { .. } => vec![
                "Lower the live-view quality profile",
                "Check WiFi signal strength for packet loss",
            ],
            LiveViewError::Control { .. } => vec![
                "Ensure the camera is powered on and joined to the network",
                "Switch the camera to recording mode",
                "Retry after the settle delay",
            ],
            LiveViewError::Config { .. } => vec![
                "Check the configuration file against the documented defaults",
                "Remove the field to fall back to its default",
            ],
            LiveViewError::InvalidFrame { .. } => {
                vec!["Frames must start with JPEG SOI and end with JPEG EOI"]
            }
            LiveViewError::Worker { .. } => vec![
                "Check the process thread limit",
                "Stop sessions that are no longer needed",
            ],
        }
    }

    /// Helper constructor for socket bind failures.
    pub fn transport_failed(addr: SocketAddr, source: std::io::Error) -> Self {
        LiveViewError::Transport { addr, source }
    }

    /// Helper constructor for malformed packets.
    pub fn malformed(len: usize, reason: impl Into<String>) -> Self {
        LiveViewError::MalformedPacket { len, reason: reason.into() }
    }

    /// Helper constructor for frame decode failures.
    pub fn decode_failed(timestamp: u32, details: impl Into<String>) -> Self {
        LiveViewError::Decode { timestamp, details: details.into() }
    }

    /// Helper constructor for control-channel failures.
    pub fn control_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        LiveViewError::Control { operation: operation.into(), reason: reason.into(), source: None }
    }

    /// Helper constructor for control-channel failures with source.
    pub fn control_failed_with_source(
        operation: impl Into<String>,
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        LiveViewError::Control {
            operation: operation.into(),
            reason: reason.into(),
            source: Some(source),
        }
    }

    /// Helper constructor for worker thread spawn failures.
    pub fn worker_spawn_failed(name: &'static str, source: std::io::Error) -> Self {
        LiveViewError::Worker { name, source }
    }

    /// Helper constructor for configuration errors.
    pub fn config_invalid(field: impl Into<String>, details: impl Into<String>) -> Self {
        LiveViewError::Config { field: field.into(), details: details.into() }
    }
}

impl From<serde_yaml_ng::Error> for LiveViewError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        LiveViewError::Config { field: "<document>".to_string(), details: err.to_string() }
    }
}
