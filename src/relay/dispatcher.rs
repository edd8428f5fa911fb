//! Inbound command dispatch.
//!
//! Every inbound record is validated here before anything acts on it:
//!
//! | Record | Outcome |
//! |--------|---------|
//! | `navigate` / `go_to_url` with `url` | URL passed through `encodeURI`, active tab navigated |
//! | any other `type` | Logged and ignored |
//! | no `type`, or bad shape | Logged as unrecognized and dropped |
//!
//! Nothing here ever closes the channel.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::identifiers::TabId;
use crate::protocol::{Command, ParsedCommand};

use super::actuator::NavigationActuator;

// ============================================================================
// Constants
// ============================================================================

/// Characters `encodeURI` leaves untouched besides ASCII alphanumerics.
const URI_SAFE: &str = ";,/?:@&=+$-_.!~*'()#";

// ============================================================================
// DispatchOutcome
// ============================================================================

/// What the dispatcher did with one inbound record.
///
/// Only used locally; the peer never receives it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A navigate command was handed to the actuator.
    Navigated {
        /// Encoded URL passed to the actuator.
        url: String,
        /// Tab that was updated, if any.
        tab_id: Option<TabId>,
    },

    /// The command type is not handled.
    Ignored {
        /// The unhandled type.
        command_type: String,
    },

    /// The record was not a valid command.
    Rejected {
        /// Why it was rejected.
        reason: String,
    },
}

// ============================================================================
// CommandDispatcher
// ============================================================================

/// Routes inbound commands to their handlers.
#[derive(Clone)]
pub struct CommandDispatcher {
    actuator: NavigationActuator,
}

impl CommandDispatcher {
    /// Creates a dispatcher driving `actuator`.
    #[inline]
    #[must_use]
    pub fn new(actuator: NavigationActuator) -> Self {
        Self { actuator }
    }

    /// Handles one inbound record.
    pub async fn dispatch(&self, record: Value) -> DispatchOutcome {
        let command = match Command::from_value(record) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Received unrecognized message");
                return DispatchOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        match command.parse() {
            Ok(ParsedCommand::Navigate { url }) => {
                let url = encode_uri(&url);
                debug!(url = %url, "Got a navigate instruction");

                let tab_id = self.actuator.navigate(&url).await;
                DispatchOutcome::Navigated { url, tab_id }
            }

            Ok(ParsedCommand::Unknown { command_type }) => {
                info!(command_type = %command_type, "Received unhandled message type");
                DispatchOutcome::Ignored { command_type }
            }

            Err(e) => {
                warn!(command_type = %command.command_type, error = %e, "Received unrecognized message");
                DispatchOutcome::Rejected {
                    reason: e.to_string(),
                }
            }
        }
    }
}

// ============================================================================
// URL Encoding
// ============================================================================

/// Percent-encodes a URL for navigation.
///
/// Follows `encodeURI`: ASCII alphanumerics and URI punctuation pass
/// through, everything else is UTF-8 percent-encoded. `%` is not URI
/// punctuation, so an already-escaped URL is escaped again.
#[must_use]
pub fn encode_uri(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    let mut buf = [0u8; 4];

    for ch in url.chars() {
        if ch.is_ascii_alphanumeric() || URI_SAFE.contains(ch) {
            encoded.push(ch);
        } else {
            encoded.push_str(&urlencoding::encode(ch.encode_utf8(&mut buf)));
        }
    }

    encoded
}

// ============================================================================
// Tests
// ============================================================================
