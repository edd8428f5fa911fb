//! Nav Relay - Browser navigation relay over native messaging.
//!
//! This library relays page navigation activity between a browser and a
//! native peer process, and lets the peer steer the browser.
//!
//! # Architecture
//!
//! The relay sits between two ends:
//!
//! - **Browser (Rust)**: Observes request lifecycle, drives the active tab
//! - **Native peer (process)**: Receives events, sends commands via stdio
//!
//! Key design principles:
//!
//! - One [`Channel`] per relay: peer process + framed stdio + event loop
//! - Messages are JSON records with a native-endian `u32` length prefix
//! - Inbound commands are validated before anything acts on them
//! - Fire-and-forget in both directions (no acknowledgements)
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use nav_relay::{MemoryBrowser, Relay, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let browser = MemoryBrowser::new();
//!     browser.open_window("about:blank");
//!
//!     // Launch the native peer and start relaying
//!     let relay = Relay::builder()
//!         .peer_program("/path/to/native-host")
//!         .connect(Arc::new(browser.clone()))?;
//!     relay.start(&browser)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`browser`] | Browser interfaces and the in-memory browser |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`peer`] | Native side of the channel |
//! | [`protocol`] | Navigation events and commands |
//! | [`relay`] | Listener, dispatcher and actuator |
//! | [`transport`] | Native messaging channel |

// ============================================================================
// Modules
// ============================================================================

/// Browser interfaces consumed by the relay.
///
/// - [`RequestEvents`] - request lifecycle notifications
/// - [`Tabs`] - active tab query and update
/// - [`MemoryBrowser`] - in-process implementation of both
pub mod browser;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for browser entities.
pub mod identifiers;

/// Native endpoint of the relay channel.
pub mod peer;

/// Native messaging record types.
pub mod protocol;

/// Navigation relay components.
///
/// Use [`Relay::builder()`] to launch a peer and wire a relay.
pub mod relay;

/// Native messaging transport layer.
///
/// Length-prefixed framing over a peer process's standard streams.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Browser types
pub use browser::{
    MemoryBrowser, Navigation, RequestDetails, RequestEvents, RequestHandler, RequestPhase,
    TabInfo, Tabs, UrlPattern,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, TabId, WindowId};

// Peer types
pub use peer::PeerEndpoint;

// Protocol types
pub use protocol::{Command, NavEvent, NavEventKind, ParsedCommand};

// Relay types
pub use relay::{
    CommandDispatcher, DispatchOutcome, EventListener, NavigationActuator, Relay, RelayBuilder,
    RelayState,
};

// Transport types
pub use transport::{Channel, ChannelState, DEFAULT_MAX_MESSAGE_BYTES, DisconnectReason, PeerConfig};
