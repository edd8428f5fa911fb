//! Native messaging transport layer.
//!
//! This module handles communication between the relay and the native peer
//! over length-prefixed JSON frames.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Relay          │        stdin / stdout        │  Native peer    │
//! │                 │◄────────────────────────────►│  (process)      │
//! │  Channel        │   u32 length (NE) + JSON     │  Channel::stdio │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `Channel::connect` - Launch the peer with piped stdin/stdout
//! 2. `Channel::on_message` / `Channel::on_disconnect` - Register handlers
//! 3. `Channel::send` - Queue outbound messages
//! 4. Peer exit or `Channel::disconnect` - Channel becomes `Disconnected`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Channel handle and event loop |
//! | `codec` | Length-delimited framing |
//! | `process` | Peer launch configuration |

// ============================================================================
// Submodules
// ============================================================================

/// Channel handle and event loop.
pub mod channel;

/// Native messaging framing.
pub mod codec;

/// Native peer launch configuration.
pub mod process;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{Channel, ChannelState, DisconnectHandler, DisconnectReason, MessageHandler};
pub use codec::DEFAULT_MAX_MESSAGE_BYTES;
pub use process::{DEFAULT_PEER_ID, PeerConfig};
