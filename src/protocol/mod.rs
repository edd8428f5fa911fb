//! Native messaging message types.
//!
//! This module defines the records exchanged between the relay and the
//! native peer. Every record is a JSON object with a `type` field.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `NavEvent` | Relay → Peer | Request started or completed |
//! | `Command` | Peer → Relay | Instruction, currently `navigate` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Inbound commands and their validation |
//! | `event` | Outbound navigation events |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound command types.
pub mod command;

/// Outbound navigation event types.
pub mod event;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, LEGACY_NAVIGATE, NAVIGATE, ParsedCommand};
pub use event::{NavEvent, NavEventKind};
