//! Native peer launch configuration.
//!
//! # Example
//!
//! ```ignore
//! use nav_relay::transport::PeerConfig;
//!
//! let peer = PeerConfig::new("com.example.chrome_ext", "/opt/nav-host/bin/host")
//!     .with_arg("chrome-extension://abcdef/");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::ffi::OsString;
use std::path::PathBuf;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Peer identifier used when none is configured.
pub const DEFAULT_PEER_ID: &str = "com.example.chrome_ext";

// ============================================================================
// PeerConfig
// ============================================================================

/// How to launch the native peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Peer identifier, as registered with the browser.
    pub name: String,

    /// Program to execute.
    pub program: PathBuf,

    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl PeerConfig {
    /// Creates a peer config with no arguments.
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Creates a peer config under the default identifier.
    #[inline]
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self::new(DEFAULT_PEER_ID, program)
    }

    /// Adds a command-line argument.
    #[inline]
    #[must_use]
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Adds multiple command-line arguments.
    #[inline]
    #[must_use]
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Checks the config before launch.
    ///
    /// Relative program names are resolved through `PATH` at launch and are
    /// not checked here.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the identifier or program is empty
    /// - [`Error::PeerNotFound`] if an absolute program path does not exist
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::config("peer identifier must not be empty"));
        }

        if self.program.as_os_str().is_empty() {
            return Err(Error::config("peer program must not be empty"));
        }

        if self.program.is_absolute() && !self.program.exists() {
            return Err(Error::peer_not_found(&self.program));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_methods() {
        let config = PeerConfig::with_program("host")
            .with_arg("--verbose")
            .with_args(["a", "b"]);

        assert_eq!(config.name, DEFAULT_PEER_ID);
        assert_eq!(config.args.len(), 3);
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = PeerConfig::new("  ", "host").validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_empty_program_rejected() {
        let err = PeerConfig::new("peer", "").validate().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_relative_program_not_checked() {
        assert!(PeerConfig::new("peer", "some-host-on-path").validate().is_ok());
    }
}
