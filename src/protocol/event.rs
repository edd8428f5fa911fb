//! Navigation event message types.
//!
//! Events are notifications sent from the relay to the native peer when a
//! network request starts or completes.
//!
//! # Format
//!
//! ```json
//! { "type": "start", "url": "https://example.com/", "time": 1532.25 }
//! ```
//!
//! | `type` | Emitted on |
//! |--------|------------|
//! | `start` | request about to be sent |
//! | `end` | request completed |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// NavEventKind
// ============================================================================

/// Lifecycle phase of the request an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavEventKind {
    /// Request is about to be sent.
    Start,
    /// Request completed.
    End,
}

impl NavEventKind {
    /// Returns the wire name of the kind.
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

impl fmt::Display for NavEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// NavEvent
// ============================================================================

/// One request lifecycle occurrence.
///
/// Events have no identity beyond their fields. Overlapping requests for the
/// same URL produce equal events and nothing deduplicates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavEvent {
    /// Lifecycle phase.
    #[serde(rename = "type")]
    pub kind: NavEventKind,

    /// Request URL as reported by the browser.
    pub url: String,

    /// Milliseconds since the relay started.
    #[serde(rename = "time")]
    pub timestamp_millis: f64,
}

impl NavEvent {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub fn new(kind: NavEventKind, url: impl Into<String>, timestamp_millis: f64) -> Self {
        Self {
            kind,
            url: url.into(),
            timestamp_millis,
        }
    }

    /// Creates a request-start event.
    #[inline]
    #[must_use]
    pub fn start(url: impl Into<String>, timestamp_millis: f64) -> Self {
        Self::new(NavEventKind::Start, url, timestamp_millis)
    }

    /// Creates a request-complete event.
    #[inline]
    #[must_use]
    pub fn end(url: impl Into<String>, timestamp_millis: f64) -> Self {
        Self::new(NavEventKind::End, url, timestamp_millis)
    }
}

// ============================================================================
// Tests
// ============================================================================
