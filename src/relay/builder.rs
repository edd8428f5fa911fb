//! Builder pattern for relay configuration.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nav_relay::{MemoryBrowser, Relay};
//!
//! # fn example() -> nav_relay::Result<()> {
//! let browser = MemoryBrowser::new();
//! let relay = Relay::builder()
//!     .peer_program("/usr/local/bin/nav-host")
//!     .url_pattern("https://*/*")
//!     .connect(Arc::new(browser.clone()))?;
//!
//! relay.start(&browser)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use crate::browser::{ALL_URLS, Tabs, UrlPattern};
use crate::error::{Error, Result};
use crate::transport::{Channel, DEFAULT_MAX_MESSAGE_BYTES, PeerConfig};

use super::Relay;

// ============================================================================
// RelayBuilder
// ============================================================================

/// Builder for configuring a [`Relay`].
///
/// Use [`Relay::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct RelayBuilder {
    /// Peer process to launch.
    peer: Option<PeerConfig>,
    /// Largest message body accepted in either direction.
    max_message_bytes: usize,
    /// Filter for forwarded requests.
    url_pattern: String,
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self {
            peer: None,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            url_pattern: ALL_URLS.to_string(),
        }
    }
}

impl RelayBuilder {
    /// Creates a builder with default limits and no peer.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the peer process configuration.
    #[inline]
    #[must_use]
    pub fn peer(mut self, peer: PeerConfig) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Sets the peer program, using the default peer identifier.
    #[inline]
    #[must_use]
    pub fn peer_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.peer = Some(PeerConfig::with_program(program));
        self
    }

    /// Sets the largest message body accepted in either direction.
    #[inline]
    #[must_use]
    pub fn max_message_bytes(mut self, max: usize) -> Self {
        self.max_message_bytes = max;
        self
    }

    /// Sets the URL pattern scoping which requests are forwarded.
    #[inline]
    #[must_use]
    pub fn url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_pattern = pattern.into();
        self
    }

    /// Validates the configuration, launches the peer and wires a relay.
    ///
    /// The relay is returned idle; call [`Relay::start`] to begin.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no peer is set or the size limit is out of range
    /// - [`Error::InvalidPattern`] if the URL pattern does not parse
    /// - [`Error::PeerNotFound`] if the peer program doesn't exist
    /// - [`Error::ProcessLaunchFailed`] if the peer cannot be started
    pub fn connect(self, tabs: Arc<dyn Tabs>) -> Result<Relay> {
        let peer = self.validate_peer()?;
        self.validate_max_message_bytes()?;
        let filter = UrlPattern::parse(&self.url_pattern)?;

        let channel = Channel::connect(&peer, self.max_message_bytes)?;
        Ok(Relay::new(channel, tabs).with_filter(filter))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl RelayBuilder {
    /// Validates the peer configuration.
    fn validate_peer(&self) -> Result<PeerConfig> {
        let peer = self.peer.clone().ok_or_else(|| {
            Error::config(
                "Peer program is required. Use .peer_program() to set it.\n\
                 Example: Relay::builder().peer_program(\"/usr/local/bin/nav-host\")",
            )
        })?;

        peer.validate()?;
        Ok(peer)
    }

    /// Validates the message size limit against the 4-byte length header.
    fn validate_max_message_bytes(&self) -> Result<()> {
        if self.max_message_bytes == 0 {
            return Err(Error::config("max_message_bytes must be greater than zero"));
        }

        if u32::try_from(self.max_message_bytes).is_err() {
            return Err(Error::config(format!(
                "max_message_bytes {} does not fit a 32-bit length header",
                self.max_message_bytes
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
