//! Browser collaborators.
//!
//! The relay never talks to a browser directly. It consumes two interfaces:
//!
//! - [`RequestEvents`] - network request lifecycle notifications
//! - [`Tabs`] - active tab lookup and location update
//!
//! [`MemoryBrowser`] implements both in-process.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-process browser model |
//! | `pattern` | URL match patterns for listener filters |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::identifiers::{RequestId, TabId, WindowId};

// ============================================================================
// Submodules
// ============================================================================

/// In-process browser model.
pub mod memory;

/// URL match patterns.
pub mod pattern;

// ============================================================================
// Re-exports
// ============================================================================

pub use memory::{MemoryBrowser, Navigation};
pub use pattern::{ALL_URLS, UrlPattern};

// ============================================================================
// Types
// ============================================================================

/// Request lifecycle phase a listener subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestPhase {
    /// Request is about to be sent.
    BeforeRequest,
    /// Request completed.
    Completed,
}

/// Details of a network request passed to listeners.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDetails {
    /// Request ID, shared by all phases of one request.
    pub request_id: RequestId,

    /// Request URL.
    pub url: String,

    /// Tab that issued the request (None for background requests).
    pub tab_id: Option<TabId>,
}

/// Snapshot of a browser tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    /// Tab ID.
    pub tab_id: TabId,

    /// Window containing the tab.
    pub window_id: WindowId,

    /// Current location.
    pub url: String,

    /// Whether this is the active tab of its window.
    pub active: bool,
}

/// Request listener callback.
///
/// Called once per matching request per phase.
pub type RequestHandler = Arc<dyn Fn(&RequestDetails) + Send + Sync>;

// ============================================================================
// RequestEvents
// ============================================================================

/// Source of network request lifecycle notifications.
///
/// For a single request, `BeforeRequest` is delivered before `Completed`.
/// No ordering is guaranteed across requests.
pub trait RequestEvents: Send + Sync {
    /// Registers a listener for one phase, scoped to URLs matching `filter`.
    ///
    /// Listeners stay registered for the lifetime of the source.
    fn add_listener(&self, phase: RequestPhase, filter: UrlPattern, handler: RequestHandler);
}

// ============================================================================
// Tabs
// ============================================================================

/// Active tab query and update.
#[async_trait]
pub trait Tabs: Send + Sync {
    /// Returns the active tab of the focused window, if there is one.
    async fn active_tab(&self) -> Result<Option<TabInfo>>;

    /// Loads `url` in the given tab.
    async fn update_url(&self, tab_id: TabId, url: &str) -> Result<()>;
}
