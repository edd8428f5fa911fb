//! Browser-side navigation relay.
//!
//! A [`Relay`] joins the three relay components over one [`Channel`]:
//!
//! | Component | Direction | Description |
//! |-----------|-----------|-------------|
//! | [`EventListener`] | browser -> peer | Forwards request start/end events |
//! | [`CommandDispatcher`] | peer -> browser | Validates and routes commands |
//! | [`NavigationActuator`] | browser | Loads URLs in the active tab |
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start()--> Listening --peer closes / shutdown()--> Disconnected
//! ```
//!
//! `Disconnected` is terminal. Request listeners stay registered, but every
//! event they produce is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::browser::{RequestEvents, Tabs, UrlPattern};
use crate::error::{Error, Result};
use crate::transport::Channel;

// ============================================================================
// Submodules
// ============================================================================

/// Active tab navigation.
pub mod actuator;

/// Builder pattern for relay configuration.
pub mod builder;

/// Inbound command dispatch.
pub mod dispatcher;

/// Request lifecycle listener.
pub mod listener;

// ============================================================================
// Re-exports
// ============================================================================

pub use actuator::NavigationActuator;
pub use builder::RelayBuilder;
pub use dispatcher::{CommandDispatcher, DispatchOutcome, encode_uri};
pub use listener::{Clock, EventListener};

// ============================================================================
// RelayState
// ============================================================================

/// Lifecycle state of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelayState {
    /// Created but not started.
    Idle,
    /// Forwarding events and handling commands.
    Listening,
    /// The channel is gone. Terminal.
    Disconnected,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Listening => f.write_str("listening"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

// ============================================================================
// Relay
// ============================================================================

/// Navigation relay between a browser and its native peer.
///
/// Cloning is cheap; clones share the channel and the lifecycle state.
#[derive(Clone)]
pub struct Relay {
    channel: Channel,
    listener: EventListener,
    dispatcher: CommandDispatcher,
    filter: UrlPattern,
    state: Arc<Mutex<RelayState>>,
}

impl Relay {
    /// Creates a relay builder.
    #[inline]
    #[must_use]
    pub fn builder() -> RelayBuilder {
        RelayBuilder::new()
    }

    /// Wires a relay over an existing channel.
    ///
    /// Requests on every URL are forwarded unless a filter is set with
    /// [`Relay::with_filter`].
    #[must_use]
    pub fn new(channel: Channel, tabs: Arc<dyn Tabs>) -> Self {
        let listener = EventListener::new(channel.clone(), Clock::start());
        let dispatcher = CommandDispatcher::new(NavigationActuator::new(tabs));

        Self {
            channel,
            listener,
            dispatcher,
            filter: UrlPattern::any(),
            state: Arc::new(Mutex::new(RelayState::Idle)),
        }
    }

    /// Scopes forwarded requests to URLs matching `filter`.
    #[inline]
    #[must_use]
    pub fn with_filter(mut self, filter: UrlPattern) -> Self {
        self.filter = filter;
        self
    }

    /// Starts relaying.
    ///
    /// Registers the disconnect and command handlers on the channel, then
    /// the request listeners on `events`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the relay was already started.
    pub fn start(&self, events: &dyn RequestEvents) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != RelayState::Idle {
                return Err(Error::config(format!("relay cannot start while {}", *state)));
            }
            *state = RelayState::Listening;
        }

        let state = Arc::downgrade(&self.state);
        let peer = self.channel.peer().to_string();
        self.channel.on_disconnect(move |reason| {
            if let Some(state) = state.upgrade() {
                *state.lock() = RelayState::Disconnected;
            }
            info!(peer = %peer, ?reason, "Peer disconnected, relay stopped");
        });

        let dispatcher = self.dispatcher.clone();
        self.channel.on_message(move |record| {
            let dispatcher = dispatcher.clone();
            async move {
                let outcome = dispatcher.dispatch(record).await;
                debug!(?outcome, "Command handled");
            }
        });

        self.listener.register(events, &self.filter);

        info!(peer = %self.channel.peer(), filter = %self.filter, "Relay started");
        Ok(())
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RelayState {
        *self.state.lock()
    }

    /// Returns the channel to the peer.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Returns the event listener.
    #[inline]
    #[must_use]
    pub fn listener(&self) -> &EventListener {
        &self.listener
    }

    /// Returns the command dispatcher.
    #[inline]
    #[must_use]
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Closes the channel and stops relaying.
    pub fn shutdown(&self) {
        self.channel.disconnect();
        *self.state.lock() = RelayState::Disconnected;
        info!(peer = %self.channel.peer(), "Relay shut down");
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("peer", &self.channel.peer())
            .field("filter", &self.filter)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::{sleep, timeout};

    use crate::browser::{MemoryBrowser, Navigation, RequestPhase};
    use crate::peer::PeerEndpoint;
    use crate::protocol::{Command, NavEvent, NavEventKind};
    use crate::transport::DEFAULT_MAX_MESSAGE_BYTES;

    struct Harness {
        relay: Relay,
        browser: MemoryBrowser,
        peer: PeerEndpoint,
        events: mpsc::UnboundedReceiver<NavEvent>,
    }

    fn started() -> Harness {
        let (relay_side, peer_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let browser = MemoryBrowser::new();

        let relay = Relay::new(relay_side, Arc::new(browser.clone()));
        relay.start(&browser).expect("start");

        let peer = PeerEndpoint::new(peer_side);
        let events = peer.subscribe();

        Harness {
            relay,
            browser,
            peer,
            events,
        }
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<NavEvent>) -> NavEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("closed")
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        timeout(Duration::from_secs(5), async {
            while !condition() {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_request_lifecycle_reaches_peer() {
        let mut h = started();

        let request = h.browser.new_request("http://a.test/x");
        h.browser.dispatch(RequestPhase::BeforeRequest, &request);
        h.browser.dispatch(RequestPhase::Completed, &request);

        let start = next(&mut h.events).await;
        let end = next(&mut h.events).await;
        assert_eq!((start.kind, end.kind), (NavEventKind::Start, NavEventKind::End));
        assert_eq!(start.url, "http://a.test/x");
        assert!(start.timestamp_millis <= end.timestamp_millis);
    }

    #[tokio::test]
    async fn test_peer_navigate_updates_active_tab() {
        let h = started();
        let tab = h.browser.open_window("about:blank");

        h.peer.navigate("http://b.test/%20y").expect("send");

        wait_until(|| !h.browser.navigations().is_empty()).await;
        assert_eq!(
            h.browser.navigations(),
            vec![Navigation {
                tab_id: tab,
                url: "http://b.test/%2520y".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_channel_open() {
        let mut h = started();
        let tab = h.browser.open_window("about:blank");

        h.peer
            .send_command(&Command::new("unknown_cmd"))
            .expect("send");
        h.peer.navigate("http://b.test/").expect("send");

        wait_until(|| !h.browser.navigations().is_empty()).await;
        assert_eq!(h.browser.navigations()[0].tab_id, tab);
        assert_eq!(h.relay.state(), RelayState::Listening);

        h.browser
            .fire_request(RequestPhase::BeforeRequest, "http://a.test/after");
        assert_eq!(next(&mut h.events).await.url, "http://a.test/after");
    }

    #[tokio::test]
    async fn test_peer_close_disconnects_relay() {
        let h = started();

        h.peer.channel().disconnect();

        wait_until(|| h.relay.state() == RelayState::Disconnected).await;
        assert!(!h.relay.channel().is_connected());

        // Listener stays registered; its events are dropped
        h.browser
            .fire_request(RequestPhase::BeforeRequest, "http://a.test/x");
        assert!(h.relay.listener().emit(NavEventKind::Start, "http://a.test/x").is_err());
    }

    #[tokio::test]
    async fn test_no_events_reach_peer_after_shutdown() {
        let mut h = started();

        h.relay.shutdown();
        for i in 0..3 {
            let request = h.browser.new_request(format!("http://a.test/{i}"));
            h.browser.dispatch(RequestPhase::BeforeRequest, &request);
            h.browser.dispatch(RequestPhase::Completed, &request);
        }

        // Everything written before the close is delivered before the peer sees it
        wait_until(|| !h.peer.channel().is_connected()).await;
        assert!(matches!(
            h.events.try_recv(),
            Err(mpsc::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_debug_shows_peer_and_state() {
        let (relay_side, _peer_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let relay = Relay::new(relay_side, Arc::new(MemoryBrowser::new()));

        let debug = format!("{relay:?}");
        assert!(debug.contains("pair-left"));
        assert!(debug.contains("Idle"));
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let h = started();
        let err = h.relay.start(&h.browser).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(h.browser.listener_count(), 2);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let (relay_side, _peer_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let browser = MemoryBrowser::new();
        let relay = Relay::new(relay_side, Arc::new(browser.clone()));

        assert_eq!(relay.state(), RelayState::Idle);
        relay.start(&browser).expect("start");
        assert_eq!(relay.state(), RelayState::Listening);

        relay.shutdown();
        assert_eq!(relay.state(), RelayState::Disconnected);
        assert!(relay.start(&browser).is_err());
    }

    #[tokio::test]
    async fn test_filter_applies_to_forwarded_requests() {
        let (relay_side, peer_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let browser = MemoryBrowser::new();
        let filter = UrlPattern::parse("*://*.example.com/*").expect("pattern");

        let relay = Relay::new(relay_side, Arc::new(browser.clone())).with_filter(filter);
        relay.start(&browser).expect("start");
        let mut events = PeerEndpoint::new(peer_side).subscribe();

        browser.fire_request(RequestPhase::BeforeRequest, "http://other.test/");
        browser.fire_request(RequestPhase::BeforeRequest, "https://www.example.com/");

        assert_eq!(next(&mut events).await.url, "https://www.example.com/");
    }
}
