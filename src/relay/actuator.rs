//! Navigation of the active tab.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::browser::Tabs;
use crate::identifiers::TabId;

// ============================================================================
// NavigationActuator
// ============================================================================

/// Loads URLs in the active tab of the focused window.
///
/// Navigation is fire-and-forget: failures are logged and never reported
/// to the peer.
#[derive(Clone)]
pub struct NavigationActuator {
    tabs: Arc<dyn Tabs>,
}

impl NavigationActuator {
    /// Creates an actuator over the given tab API.
    #[inline]
    #[must_use]
    pub fn new(tabs: Arc<dyn Tabs>) -> Self {
        Self { tabs }
    }

    /// Loads `url` in the active tab.
    ///
    /// Returns the tab that was updated, or `None` when there is no active
    /// tab or the browser refused the update.
    pub async fn navigate(&self, url: &str) -> Option<TabId> {
        let tab = match self.tabs.active_tab().await {
            Ok(Some(tab)) => tab,
            Ok(None) => {
                debug!(url = %url, "No active tab, skipping navigation");
                return None;
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Active tab query failed");
                return None;
            }
        };

        if let Err(e) = self.tabs.update_url(tab.tab_id, url).await {
            warn!(url = %url, tab_id = %tab.tab_id, error = %e, "Navigation failed");
            return None;
        }

        debug!(url = %url, tab_id = %tab.tab_id, "Navigated active tab");
        Some(tab.tab_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
