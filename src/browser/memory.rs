//! In-process browser model.
//!
//! [`MemoryBrowser`] keeps windows, tabs and focus in memory and delivers
//! request notifications to registered listeners when asked to. It records
//! every location update so callers can see what was navigated where.
//!
//! # Example
//!
//! ```ignore
//! let browser = MemoryBrowser::new();
//! let tab = browser.open_window("about:blank");
//!
//! browser.fire_request(RequestPhase::BeforeRequest, "http://a.test/x");
//! browser.update_url(tab, "http://b.test/").await?;
//! assert_eq!(browser.navigations().len(), 1);
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifiers::{RequestId, TabId, WindowId};

use super::{RequestDetails, RequestEvents, RequestHandler, RequestPhase, TabInfo, Tabs, UrlPattern};

// ============================================================================
// Navigation
// ============================================================================

/// A location update applied to a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Tab that was updated.
    pub tab_id: TabId,
    /// New location.
    pub url: String,
}

// ============================================================================
// Internal State
// ============================================================================

struct WindowState {
    id: WindowId,
    tabs: Vec<TabId>,
    active: Option<TabId>,
}

struct TabState {
    window_id: WindowId,
    url: String,
}

#[derive(Default)]
struct BrowserState {
    /// Windows in creation order.
    windows: Vec<WindowState>,
    tabs: FxHashMap<TabId, TabState>,
    focused: Option<WindowId>,
    next_id: u32,
    navigations: Vec<Navigation>,
}

impl BrowserState {
    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn window_mut(&mut self, window_id: WindowId) -> Option<&mut WindowState> {
        self.windows.iter_mut().find(|w| w.id == window_id)
    }

    fn tab_info(&self, tab_id: TabId) -> Option<TabInfo> {
        let tab = self.tabs.get(&tab_id)?;
        let active = self
            .windows
            .iter()
            .find(|w| w.id == tab.window_id)
            .is_some_and(|w| w.active == Some(tab_id));

        Some(TabInfo {
            tab_id,
            window_id: tab.window_id,
            url: tab.url.clone(),
            active,
        })
    }
}

struct Listener {
    phase: RequestPhase,
    filter: UrlPattern,
    handler: RequestHandler,
}

struct Inner {
    state: RwLock<BrowserState>,
    listeners: RwLock<Vec<Listener>>,
    next_request: AtomicU64,
}

// ============================================================================
// MemoryBrowser
// ============================================================================

/// Browser model held entirely in memory.
///
/// Cloning yields another handle to the same browser.
#[derive(Clone)]
pub struct MemoryBrowser {
    inner: Arc<Inner>,
}

impl Default for MemoryBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBrowser {
    /// Creates a browser with no windows.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(BrowserState::default()),
                listeners: RwLock::new(Vec::new()),
                next_request: AtomicU64::new(1),
            }),
        }
    }

    // ========================================================================
    // Windows & Tabs
    // ========================================================================

    /// Opens a focused window with one active tab showing `url`.
    ///
    /// Returns the new tab's ID.
    pub fn open_window(&self, url: impl Into<String>) -> TabId {
        let mut state = self.inner.state.write();
        let window_id = WindowId::new(state.allocate_id());
        let tab_id = TabId::new(state.allocate_id());

        state.windows.push(WindowState {
            id: window_id,
            tabs: vec![tab_id],
            active: Some(tab_id),
        });
        state.tabs.insert(
            tab_id,
            TabState {
                window_id,
                url: url.into(),
            },
        );
        state.focused = Some(window_id);

        tab_id
    }

    /// Opens a tab in an existing window.
    ///
    /// Returns `None` if the window does not exist.
    pub fn open_tab(&self, window_id: WindowId, url: impl Into<String>, active: bool) -> Option<TabId> {
        let mut state = self.inner.state.write();
        let tab_id = TabId::new(state.allocate_id());

        let window = state.window_mut(window_id)?;
        window.tabs.push(tab_id);
        if active || window.active.is_none() {
            window.active = Some(tab_id);
        }

        state.tabs.insert(
            tab_id,
            TabState {
                window_id,
                url: url.into(),
            },
        );

        Some(tab_id)
    }

    /// Closes a window and all of its tabs.
    ///
    /// Focus moves to the most recently opened remaining window.
    pub fn close_window(&self, window_id: WindowId) -> bool {
        let mut state = self.inner.state.write();
        let Some(index) = state.windows.iter().position(|w| w.id == window_id) else {
            return false;
        };

        let window = state.windows.remove(index);
        for tab_id in window.tabs {
            state.tabs.remove(&tab_id);
        }

        if state.focused == Some(window_id) {
            state.focused = state.windows.last().map(|w| w.id);
        }

        true
    }

    /// Gives focus to a window.
    pub fn focus_window(&self, window_id: WindowId) -> bool {
        let mut state = self.inner.state.write();
        if state.window_mut(window_id).is_none() {
            return false;
        }
        state.focused = Some(window_id);
        true
    }

    /// Makes a tab the active tab of its window.
    pub fn activate_tab(&self, tab_id: TabId) -> bool {
        let mut state = self.inner.state.write();
        let Some(window_id) = state.tabs.get(&tab_id).map(|t| t.window_id) else {
            return false;
        };

        match state.window_mut(window_id) {
            Some(window) => {
                window.active = Some(tab_id);
                true
            }
            None => false,
        }
    }

    /// Returns a snapshot of a tab.
    #[must_use]
    pub fn tab(&self, tab_id: TabId) -> Option<TabInfo> {
        self.inner.state.read().tab_info(tab_id)
    }

    /// Returns the focused window.
    #[must_use]
    pub fn focused_window(&self) -> Option<WindowId> {
        self.inner.state.read().focused
    }

    /// Returns every location update applied so far, oldest first.
    #[must_use]
    pub fn navigations(&self) -> Vec<Navigation> {
        self.inner.state.read().navigations.clone()
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Returns the number of registered request listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }

    /// Creates details for a new request not tied to a tab.
    #[must_use]
    pub fn new_request(&self, url: impl Into<String>) -> RequestDetails {
        RequestDetails {
            request_id: RequestId::new(self.inner.next_request.fetch_add(1, Ordering::Relaxed)),
            url: url.into(),
            tab_id: None,
        }
    }

    /// Delivers a notification to every listener for `phase` whose filter
    /// matches the request URL.
    ///
    /// Returns the number of listeners invoked.
    pub fn dispatch(&self, phase: RequestPhase, details: &RequestDetails) -> usize {
        let handlers: Vec<RequestHandler> = self
            .inner
            .listeners
            .read()
            .iter()
            .filter(|l| l.phase == phase && l.filter.matches(&details.url))
            .map(|l| Arc::clone(&l.handler))
            .collect();

        trace!(?phase, url = %details.url, listeners = handlers.len(), "Dispatching request event");

        for handler in &handlers {
            handler(details);
        }

        handlers.len()
    }

    /// Delivers one phase of a fresh request for `url`.
    ///
    /// Returns the request details that were delivered.
    pub fn fire_request(&self, phase: RequestPhase, url: impl Into<String>) -> RequestDetails {
        let details = self.new_request(url);
        self.dispatch(phase, &details);
        details
    }
}

// ============================================================================
// Collaborator Implementations
// ============================================================================

impl RequestEvents for MemoryBrowser {
    fn add_listener(&self, phase: RequestPhase, filter: UrlPattern, handler: RequestHandler) {
        self.inner.listeners.write().push(Listener {
            phase,
            filter,
            handler,
        });
    }
}

#[async_trait]
impl Tabs for MemoryBrowser {
    async fn active_tab(&self) -> Result<Option<TabInfo>> {
        let state = self.inner.state.read();
        let active = state
            .focused
            .and_then(|focused| state.windows.iter().find(|w| w.id == focused))
            .and_then(|window| window.active)
            .and_then(|tab_id| state.tab_info(tab_id));

        Ok(active)
    }

    async fn update_url(&self, tab_id: TabId, url: &str) -> Result<()> {
        let mut state = self.inner.state.write();
        let tab = state
            .tabs
            .get_mut(&tab_id)
            .ok_or_else(|| Error::tab_not_found(tab_id))?;

        tab.url = url.to_string();
        state.navigations.push(Navigation {
            tab_id,
            url: url.to_string(),
        });

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
