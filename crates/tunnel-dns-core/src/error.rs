//! Error types for the tunnel DNS system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for tunnel DNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the tunnel DNS system
#[derive(Error, Debug)]
pub enum Error {
    /// The tunnel executable could not be found at launch
    #[error("Tunnel binary not found: {binary}")]
    BinaryNotFound {
        /// Path or name of the missing executable
        binary: String,
    },

    /// Line source-related errors
    #[error("Line source error: {0}")]
    LineSource(String),

    /// The tunnel process closed its output
    #[error("Tunnel process exited: {0}")]
    TunnelExited(String),

    /// DNS updater-related errors
    #[error("DNS updater error: {0}")]
    DnsUpdater(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential loading or validation errors
    #[error("Credentials error: {0}")]
    Credentials(String),

    /// I/O errors (process spawning, file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a binary-not-found error
    pub fn binary_not_found(binary: impl Into<String>) -> Self {
        Self::BinaryNotFound {
            binary: binary.into(),
        }
    }

    /// Create a line source error
    pub fn line_source(msg: impl Into<String>) -> Self {
        Self::LineSource(msg.into())
    }

    /// Create a tunnel-exited error
    pub fn tunnel_exited(msg: impl Into<String>) -> Self {
        Self::TunnelExited(msg.into())
    }

    /// Create a DNS updater error
    pub fn dns_updater(msg: impl Into<String>) -> Self {
        Self::DnsUpdater(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a credentials error
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Whether this error means the tunnel executable is missing
    pub fn is_binary_not_found(&self) -> bool {
        matches!(self, Self::BinaryNotFound { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
