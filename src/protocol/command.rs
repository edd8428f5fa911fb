//! Command definitions sent by the native peer.
//!
//! A command is a JSON object discriminated by its `type` field. Fields
//! other than the ones a command type needs are ignored.
//!
//! | `type` | Fields | Action |
//! |--------|--------|--------|
//! | `navigate` | `url` | Load `url` in the active tab |
//! | `go_to_url` | `url` | Legacy alias of `navigate` |
//! | anything else | - | Ignored |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Canonical navigate command type.
pub const NAVIGATE: &str = "navigate";

/// Legacy name of the navigate command, still accepted inbound.
pub const LEGACY_NAVIGATE: &str = "go_to_url";

// ============================================================================
// Command
// ============================================================================

/// A command record from the native peer.
///
/// # Format
///
/// ```json
/// { "type": "navigate", "url": "https://example.com/" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Command type.
    #[serde(rename = "type")]
    pub command_type: String,

    /// Remaining fields of the record.
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl Command {
    /// Creates a command with no parameters.
    #[must_use]
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            params: Map::new(),
        }
    }

    /// Creates a navigate command.
    #[must_use]
    pub fn navigate(url: impl Into<String>) -> Self {
        Self::new(NAVIGATE).with_param("url", Value::String(url.into()))
    }

    /// Adds a parameter to the command.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    /// Validates an inbound record as a command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCommand`] if the record is not an object,
    /// has no `type` field, or its `type` is not a string.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut params = match value {
            Value::Object(params) => params,
            other => {
                return Err(Error::malformed_command(format!(
                    "expected an object, got {other}"
                )));
            }
        };

        let command_type = match params.remove("type") {
            Some(Value::String(command_type)) => command_type,
            Some(other) => {
                return Err(Error::malformed_command(format!(
                    "`type` must be a string, got {other}"
                )));
            }
            None => return Err(Error::malformed_command("missing `type` field")),
        };

        Ok(Self {
            command_type,
            params,
        })
    }

    /// Parses the command into a typed variant.
    ///
    /// Unknown command types parse successfully as [`ParsedCommand::Unknown`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedCommand`] if a known command lacks a
    /// required field.
    pub fn parse(&self) -> Result<ParsedCommand> {
        match self.command_type.as_str() {
            NAVIGATE | LEGACY_NAVIGATE => {
                let url = self.get_string("url").ok_or_else(|| {
                    Error::malformed_command(format!(
                        "`{}` command requires a string `url`",
                        self.command_type
                    ))
                })?;
                Ok(ParsedCommand::Navigate { url })
            }

            _ => Ok(ParsedCommand::Unknown {
                command_type: self.command_type.clone(),
            }),
        }
    }

    /// Gets a string from params.
    #[inline]
    fn get_string(&self, key: &str) -> Option<String> {
        self.params
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

// ============================================================================
// ParsedCommand
// ============================================================================

/// Parsed command types for type-safe handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// Load a URL in the active tab.
    Navigate {
        /// Target URL as sent by the peer (not yet encoded).
        url: String,
    },

    /// Command type this relay does not handle.
    Unknown {
        /// The unhandled type.
        command_type: String,
    },
}

// ============================================================================
// Tests
// ============================================================================
