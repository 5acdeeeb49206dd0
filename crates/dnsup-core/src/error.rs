//! Error types for the dnsup system
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for dnsup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dnsup system
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (bad CIDR literal, unreadable or invalid file)
    #[error("configuration error: {0}")]
    Config(String),

    /// A required base address was not found on the named interface.
    ///
    /// Fatal: merging against a missing base must never fall back to a
    /// zero-valued address.
    #[error("address resolution error: {0}")]
    Resolution(String),

    /// The signed-update exchange with the authoritative server failed
    #[error("transport error: {0}")]
    Transport(String),

    /// Authentication against the provider API failed
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A single host's provider-API upsert failed (isolated, non-fatal to siblings)
    #[error("provider error for {host}: {message}")]
    Provider {
        /// Host whose record update failed
        host: String,
        /// Error message
        message: String,
    },

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O errors (interface enumeration, config file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a resolution error
    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a per-host provider error
    pub fn provider(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
