//! Request lifecycle listener.
//!
//! Turns request-start and request-complete notifications into
//! [`NavEvent`]s and sends them to the peer. Nothing is buffered: an event
//! that cannot be sent is logged and dropped.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::browser::{RequestDetails, RequestEvents, RequestPhase, UrlPattern};
use crate::error::{Error, Result};
use crate::protocol::{NavEvent, NavEventKind};
use crate::transport::Channel;

// ============================================================================
// Clock
// ============================================================================

/// Millisecond clock measured from relay start.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    origin: Instant,
}

impl Clock {
    /// Starts a clock at zero.
    #[inline]
    #[must_use]
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Returns milliseconds elapsed since the clock started.
    #[inline]
    #[must_use]
    pub fn now_millis(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::start()
    }
}

// ============================================================================
// EventListener
// ============================================================================

/// Forwards request lifecycle notifications to the peer.
#[derive(Clone)]
pub struct EventListener {
    channel: Channel,
    clock: Clock,
}

impl EventListener {
    /// Creates a listener sending on `channel`.
    #[inline]
    #[must_use]
    pub fn new(channel: Channel, clock: Clock) -> Self {
        Self { channel, clock }
    }

    /// Registers the start and complete listeners on `source`.
    ///
    /// The listeners stay registered for the lifetime of the source.
    pub fn register(&self, source: &dyn RequestEvents, filter: &UrlPattern) {
        for (phase, kind) in [
            (RequestPhase::BeforeRequest, NavEventKind::Start),
            (RequestPhase::Completed, NavEventKind::End),
        ] {
            let listener = self.clone();
            source.add_listener(
                phase,
                filter.clone(),
                Arc::new(move |details: &RequestDetails| {
                    // Failures are already logged
                    let _ = listener.emit(kind, &details.url);
                }),
            );
        }

        debug!(filter = %filter, "Request listeners registered");
    }

    /// Builds an event for `url` and sends it to the peer.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel is disconnected
    /// - [`Error::MessageTooLarge`] if the encoded event exceeds the limit
    pub fn emit(&self, kind: NavEventKind, url: &str) -> Result<NavEvent> {
        let event = NavEvent::new(kind, url, self.clock.now_millis());

        match self.channel.send(&event) {
            Ok(()) => {
                trace!(kind = %kind, url = %url, "Navigation event sent");
                Ok(event)
            }
            Err(Error::ConnectionClosed) => {
                debug!(kind = %kind, url = %url, "Channel disconnected, dropping navigation event");
                Err(Error::ConnectionClosed)
            }
            Err(e) => {
                warn!(kind = %kind, url = %url, error = %e, "Failed to send navigation event");
                Err(e)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
