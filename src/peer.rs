//! Native side of the relay channel.
//!
//! A [`PeerEndpoint`] sends commands to the browser relay and receives its
//! navigation events. A native host uses [`PeerEndpoint::stdio`]; tests use
//! one half of a [`Channel::pair`].
//!
//! # Example
//!
//! ```ignore
//! let peer = PeerEndpoint::stdio(DEFAULT_MAX_MESSAGE_BYTES);
//! let mut events = peer.subscribe();
//!
//! peer.navigate("https://www.example.com/")?;
//! while let Some(event) = events.recv().await {
//!     println!("{} {}", event.kind, event.url);
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::Result;
use crate::protocol::{Command, NavEvent};
use crate::transport::Channel;

// ============================================================================
// Constants
// ============================================================================

/// Name the native side gives the browser end of the channel.
const BROWSER_PEER: &str = "browser";

// ============================================================================
// PeerEndpoint
// ============================================================================

/// Native endpoint of a relay channel.
#[derive(Clone)]
pub struct PeerEndpoint {
    channel: Channel,
}

impl PeerEndpoint {
    /// Wraps an existing channel.
    #[inline]
    #[must_use]
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }

    /// Talks to the browser over this process's stdin/stdout.
    #[must_use]
    pub fn stdio(max_message_bytes: usize) -> Self {
        Self::new(Channel::stdio(BROWSER_PEER, max_message_bytes))
    }

    /// Returns the underlying channel.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Asks the browser to load `url` in its active tab.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the channel is disconnected
    /// - [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if the command exceeds the limit
    pub fn navigate(&self, url: impl Into<String>) -> Result<()> {
        self.send_command(&Command::navigate(url))
    }

    /// Sends an arbitrary command.
    ///
    /// # Errors
    ///
    /// Same as [`PeerEndpoint::navigate`].
    pub fn send_command(&self, command: &Command) -> Result<()> {
        self.channel.send(command)
    }

    /// Starts receiving navigation events.
    ///
    /// Records that are not navigation events are logged and skipped.
    /// Subscribing again replaces the previous subscription. The receiver
    /// keeps yielding events after the endpoint is dropped, until the
    /// browser closes the channel.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<NavEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.channel.on_message(move |record| {
            let tx = tx.clone();
            async move {
                match serde_json::from_value::<NavEvent>(record) {
                    Ok(event) => {
                        let _ = tx.send(event);
                    }
                    Err(e) => warn!(error = %e, "Skipping malformed navigation event"),
                }
            }
        });

        rx
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use serde_json::json;
    use tokio::time::timeout;

    use crate::protocol::NavEventKind;
    use crate::transport::DEFAULT_MAX_MESSAGE_BYTES;

    #[tokio::test]
    async fn test_navigate_sends_command() {
        let (browser_side, native_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let (tx, mut rx) = mpsc::unbounded_channel();
        browser_side.on_message(move |record| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(record);
            }
        });

        PeerEndpoint::new(native_side)
            .navigate("http://b.test/")
            .expect("send");

        let record = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("closed");
        assert_eq!(record, json!({ "type": "navigate", "url": "http://b.test/" }));
    }

    #[tokio::test]
    async fn test_subscribe_skips_malformed_records() {
        let (browser_side, native_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let peer = PeerEndpoint::new(native_side);
        let mut events = peer.subscribe();

        browser_side.send(&json!({ "type": "bogus" })).expect("send");
        browser_side
            .send(&NavEvent::start("http://a.test/x", 1.0))
            .expect("send");

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out")
            .expect("closed");
        assert_eq!(event.kind, NavEventKind::Start);
        assert_eq!(event.url, "http://a.test/x");
    }

    #[tokio::test]
    async fn test_subscription_survives_dropped_endpoint() {
        let (browser_side, native_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let mut events = PeerEndpoint::new(native_side).subscribe();

        browser_side
            .send(&NavEvent::end("http://a.test/x", 2.0))
            .expect("send");

        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out")
            .expect("closed");
        assert_eq!(event.kind, NavEventKind::End);
    }

    #[tokio::test]
    async fn test_send_after_disconnect_fails() {
        let (_browser_side, native_side) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let peer = PeerEndpoint::new(native_side);

        peer.channel().disconnect();
        assert!(peer.navigate("http://b.test/").is_err());
    }
}
