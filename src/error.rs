//! Error types for the navigation relay.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use nav_relay::{Result, Error};
//!
//! fn forward(channel: &Channel, event: &NavEvent) -> Result<()> {
//!     channel.send(event)?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::PeerNotFound`], [`Error::ProcessLaunchFailed`] |
//! | Channel | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::MessageTooLarge`] |
//! | Protocol | [`Error::MalformedCommand`] |
//! | Browser | [`Error::InvalidPattern`], [`Error::TabNotFound`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::TabId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// None of these are fatal to the relay: channel errors end the channel,
/// everything else is logged and the offending message is dropped.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when relay or peer configuration is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Native peer program not found at path.
    #[error("Native peer not found at: {path}")]
    PeerNotFound {
        /// Path where the peer program was expected.
        path: PathBuf,
    },

    /// Failed to launch the native peer process.
    #[error("Failed to launch native peer: {message}")]
    ProcessLaunchFailed {
        /// Description of the launch failure.
        message: String,
    },

    // ========================================================================
    // Channel Errors
    // ========================================================================
    /// Channel could not be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Channel is disconnected.
    ///
    /// Returned by every send after the peer closed the channel, the
    /// transport failed, or the channel was disconnected locally.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound message exceeds the frame limit.
    ///
    /// The message is rejected before any byte is written.
    #[error("Message of {size} bytes exceeds limit of {max} bytes")]
    MessageTooLarge {
        /// Encoded size of the rejected message.
        size: usize,
        /// Configured maximum message size.
        max: usize,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Inbound record does not have the shape of a command.
    #[error("Malformed command: {message}")]
    MalformedCommand {
        /// Description of what is missing or wrong.
        message: String,
    },

    // ========================================================================
    // Browser Errors
    // ========================================================================
    /// URL match pattern could not be parsed.
    #[error("Invalid match pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },

    /// Tab not found.
    #[error("Tab not found: {tab_id}")]
    TabNotFound {
        /// The missing tab ID.
        tab_id: TabId,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a peer not found error.
    #[inline]
    pub fn peer_not_found(path: impl Into<PathBuf>) -> Self {
        Self::PeerNotFound { path: path.into() }
    }

    /// Creates a process launch failed error.
    #[inline]
    pub fn process_launch_failed(err: IoError) -> Self {
        Self::ProcessLaunchFailed {
            message: err.to_string(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a message too large error.
    #[inline]
    pub fn message_too_large(size: usize, max: usize) -> Self {
        Self::MessageTooLarge { size, max }
    }

    /// Creates a malformed command error.
    #[inline]
    pub fn malformed_command(message: impl Into<String>) -> Self {
        Self::MalformedCommand {
            message: message.into(),
        }
    }

    /// Creates an invalid pattern error.
    #[inline]
    pub fn invalid_pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Creates a tab not found error.
    #[inline]
    pub fn tab_not_found(tab_id: TabId) -> Self {
        Self::TabNotFound { tab_id }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a channel error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectionClosed
                | Self::ProcessLaunchFailed { .. }
                | Self::PeerNotFound { .. }
        )
    }

    /// Returns `true` if the error only affects the message being handled.
    ///
    /// The channel stays usable after these.
    #[inline]
    #[must_use]
    pub fn is_message_error(&self) -> bool {
        matches!(
            self,
            Self::MessageTooLarge { .. } | Self::MalformedCommand { .. } | Self::Json(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
