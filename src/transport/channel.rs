//! Native messaging channel and event loop.
//!
//! A [`Channel`] connects this process to exactly one peer over a pair of
//! byte streams (the peer's stdin/stdout, or an in-memory pipe).
//!
//! # Event Loop
//!
//! Each channel spawns a tokio task that handles:
//!
//! - Inbound frames, decoded and passed to the message handler one at a time
//! - Outbound frames, written in the order [`Channel::send`] queued them
//! - Disconnect detection and the one-shot disconnect handlers
//!
//! The handler for one inbound message finishes before the next frame is
//! read, so handlers never run concurrently with each other.

// ============================================================================
// Imports
// ============================================================================

use std::future::Future;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Child;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};

use super::codec::{decode_message, encode_message, reader, writer};
use super::process::PeerConfig;

// ============================================================================
// Constants
// ============================================================================

/// Buffer size of each direction of an in-memory channel pair.
const PAIR_BUFFER_BYTES: usize = 64 * 1024;

// ============================================================================
// Types
// ============================================================================

/// Inbound message handler.
///
/// Called once per inbound record, in receive order. The returned future is
/// awaited before the next record is read.
pub type MessageHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, ()> + Send + Sync>;

/// Disconnect handler, invoked at most once.
pub type DisconnectHandler = Box<dyn FnOnce(DisconnectReason) + Send>;

// ============================================================================
// ChannelState
// ============================================================================

/// Whether a channel can still carry messages.
///
/// `Disconnected` is terminal: a channel never reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    /// Messages can be sent and received.
    Connected,
    /// The channel is closed; every send fails.
    Disconnected,
}

// ============================================================================
// DisconnectReason
// ============================================================================

/// Why the peer side of a channel went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Peer closed its end of the stream.
    PeerClosed,
    /// Reading or writing failed.
    Transport {
        /// Description of the failure.
        message: String,
    },
}

impl DisconnectReason {
    /// Creates a transport failure reason.
    #[inline]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

// ============================================================================
// Internal Types
// ============================================================================

/// Internal commands for the event loop.
enum ChannelCommand {
    /// Write an encoded message.
    Send(Bytes),
    /// Close the write side and stop the loop.
    Shutdown,
}

/// How the event loop ended.
enum LoopExit {
    /// Local disconnect or every handle dropped.
    Local,
    /// Peer closed or transport failed.
    Peer(DisconnectReason),
}

/// Disconnect handlers and whether they already ran.
enum DisconnectSlot {
    Pending(Vec<DisconnectHandler>),
    Fired(DisconnectReason),
}

/// State shared between channel handles and the event loop.
struct Shared {
    /// Peer identifier, for logs.
    peer: String,
    /// Maximum encoded message size.
    max_message_bytes: usize,
    /// Cleared once, when the channel disconnects.
    connected: AtomicBool,
    /// Current message handler.
    message_handler: Mutex<Option<MessageHandler>>,
    /// Disconnect handlers.
    disconnect: Mutex<DisconnectSlot>,
    /// Opens the inbound side once a message handler exists.
    inbound_gate: Notify,
}

// ============================================================================
// Channel
// ============================================================================

/// Bidirectional message channel to a native peer.
///
/// Cloning a channel yields another handle to the same connection.
#[derive(Clone)]
pub struct Channel {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ChannelCommand>,
    /// State shared with the event loop.
    shared: Arc<Shared>,
}

impl Channel {
    /// Launches the native peer process and connects to its stdin/stdout.
    ///
    /// The peer's stderr is inherited. The process is killed when the
    /// channel shuts down.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::PeerNotFound`] if the config is invalid
    /// - [`Error::ProcessLaunchFailed`] if the process cannot be started
    /// - [`Error::Connection`] if its standard streams cannot be captured
    pub fn connect(config: &PeerConfig, max_message_bytes: usize) -> Result<Self> {
        config.validate()?;

        let mut child = tokio::process::Command::new(&config.program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(Error::process_launch_failed)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::connection("peer stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::connection("peer stdout was not captured"))?;

        info!(peer = %config.name, pid = ?child.id(), "Native peer launched");

        Ok(Self::start(
            config.name.clone(),
            stdout,
            stdin,
            max_message_bytes,
            Some(child),
        ))
    }

    /// Connects over this process's own stdin/stdout.
    ///
    /// This is the native host's side of a channel.
    pub fn stdio(peer: impl Into<String>, max_message_bytes: usize) -> Self {
        Self::from_io(
            peer,
            tokio::io::stdin(),
            tokio::io::stdout(),
            max_message_bytes,
        )
    }

    /// Connects over an arbitrary pair of byte streams.
    pub fn from_io<R, W>(
        peer: impl Into<String>,
        input: R,
        output: W,
        max_message_bytes: usize,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        Self::start(peer.into(), input, output, max_message_bytes, None)
    }

    /// Creates two channels connected to each other in memory.
    pub fn pair(max_message_bytes: usize) -> (Self, Self) {
        let (left, right) = tokio::io::duplex(PAIR_BUFFER_BYTES);
        let (left_read, left_write) = tokio::io::split(left);
        let (right_read, right_write) = tokio::io::split(right);

        (
            Self::from_io("pair-left", left_read, left_write, max_message_bytes),
            Self::from_io("pair-right", right_read, right_write, max_message_bytes),
        )
    }

    /// Spawns the event loop task.
    fn start<R, W>(
        peer: String,
        input: R,
        output: W,
        max_message_bytes: usize,
        child: Option<Child>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            peer,
            max_message_bytes,
            connected: AtomicBool::new(true),
            message_handler: Mutex::new(None),
            disconnect: Mutex::new(DisconnectSlot::Pending(Vec::new())),
            inbound_gate: Notify::new(),
        });

        tokio::spawn(Self::run_event_loop(
            input,
            output,
            command_rx,
            Arc::clone(&shared),
            child,
        ));

        debug!(peer = %shared.peer, "Channel connected");

        Self { command_tx, shared }
    }

    /// Returns the peer identifier.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    /// Returns the maximum encoded message size.
    #[inline]
    #[must_use]
    pub fn max_message_bytes(&self) -> usize {
        self.shared.max_message_bytes
    }

    /// Returns the current channel state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ChannelState {
        if self.is_connected() {
            ChannelState::Connected
        } else {
            ChannelState::Disconnected
        }
    }

    /// Returns `true` while the channel is connected.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Queues a message for the peer.
    ///
    /// Messages are written in the order they were queued. A message that
    /// is accepted here but still queued when the channel drops is lost.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel is disconnected
    /// - [`Error::MessageTooLarge`] if the encoded message exceeds the limit
    /// - [`Error::Json`] if the message cannot be serialized
    pub fn send<T: Serialize + ?Sized>(&self, message: &T) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::ConnectionClosed);
        }

        let body = encode_message(message, self.shared.max_message_bytes)?;
        let len = body.len();

        self.command_tx
            .send(ChannelCommand::Send(body))
            .map_err(|_| Error::ConnectionClosed)?;

        trace!(peer = %self.shared.peer, len, "Message queued");
        Ok(())
    }

    /// Sets the inbound message handler.
    ///
    /// Inbound frames are not read until a handler is set, so nothing the
    /// peer sends before this call is lost. Setting a new handler replaces
    /// the previous one.
    ///
    /// Once a handler is set, dropping every handle does not stop delivery:
    /// inbound messages keep reaching the handler until the peer closes.
    pub fn on_message<F, Fut>(&self, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: MessageHandler = Arc::new(move |record| handler(record).boxed());
        *self.shared.message_handler.lock() = Some(handler);
        self.shared.inbound_gate.notify_one();
    }

    /// Adds a disconnect handler.
    ///
    /// The handler runs exactly once when the peer closes the channel or the
    /// transport fails. If that already happened, it runs immediately.
    /// Handlers never run for a local [`Channel::disconnect`].
    ///
    /// A peer close is noticed by the reader, which only runs once a
    /// message handler is set.
    pub fn on_disconnect<F>(&self, handler: F)
    where
        F: FnOnce(DisconnectReason) + Send + 'static,
    {
        let mut slot = self.shared.disconnect.lock();
        match &mut *slot {
            DisconnectSlot::Pending(handlers) => handlers.push(Box::new(handler)),
            DisconnectSlot::Fired(reason) => {
                let reason = reason.clone();
                drop(slot);
                handler(reason);
            }
        }
    }

    /// Closes the channel from this side.
    ///
    /// Subsequent sends fail with [`Error::ConnectionClosed`]. Disconnect
    /// handlers are not invoked.
    pub fn disconnect(&self) {
        if self.shared.connected.swap(false, Ordering::AcqRel) {
            debug!(peer = %self.shared.peer, "Disconnecting channel");
        }
        let _ = self.command_tx.send(ChannelCommand::Shutdown);
    }

    /// Event loop that handles stream I/O.
    async fn run_event_loop<R, W>(
        input: R,
        output: W,
        mut command_rx: mpsc::UnboundedReceiver<ChannelCommand>,
        shared: Arc<Shared>,
        child: Option<Child>,
    ) where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut frames_in = reader(input, shared.max_message_bytes);
        let mut frames_out = writer(output, shared.max_message_bytes);
        let mut inbound_open = false;
        let mut handles_open = true;

        let exit = loop {
            tokio::select! {
                // Wait for a message handler before reading
                _ = shared.inbound_gate.notified(), if !inbound_open => {
                    inbound_open = true;
                }

                // Incoming frames from peer
                frame = frames_in.next(), if inbound_open => {
                    match frame {
                        Some(Ok(body)) => Self::handle_incoming_frame(&body, &shared).await,

                        Some(Err(e)) => {
                            warn!(peer = %shared.peer, error = %e, "Channel read failed");
                            break LoopExit::Peer(DisconnectReason::transport(e.to_string()));
                        }

                        None => {
                            debug!(peer = %shared.peer, "Peer closed the channel");
                            break LoopExit::Peer(DisconnectReason::PeerClosed);
                        }
                    }
                }

                // Commands from channel handles
                command = command_rx.recv(), if handles_open => {
                    match command {
                        Some(ChannelCommand::Send(body)) => {
                            if let Err(e) = frames_out.send(body).await {
                                warn!(peer = %shared.peer, error = %e, "Channel write failed");
                                break LoopExit::Peer(DisconnectReason::transport(e.to_string()));
                            }
                        }

                        Some(ChannelCommand::Shutdown) => {
                            let _ = SinkExt::<Bytes>::close(&mut frames_out).await;
                            break LoopExit::Local;
                        }

                        // Keep delivering to an installed handler until the peer closes
                        None if shared.message_handler.lock().is_some() => {
                            debug!(peer = %shared.peer, "All channel handles dropped, draining inbound");
                            handles_open = false;
                            inbound_open = true;
                        }

                        None => {
                            debug!(peer = %shared.peer, "All channel handles dropped");
                            break LoopExit::Local;
                        }
                    }
                }
            }
        };

        shared.connected.store(false, Ordering::Release);

        if let Some(child) = child {
            Self::reap_child(&shared.peer, child).await;
        }

        match exit {
            LoopExit::Peer(reason) => {
                info!(peer = %shared.peer, ?reason, "Disconnected");
                Self::fire_disconnect(&shared, reason);
            }
            LoopExit::Local => debug!(peer = %shared.peer, "Event loop terminated"),
        }
    }

    /// Decodes an inbound frame and hands it to the message handler.
    async fn handle_incoming_frame(body: &[u8], shared: &Shared) {
        let record = match decode_message(body) {
            Ok(record) => record,
            Err(e) => {
                warn!(peer = %shared.peer, error = %e, "Dropping undecodable message");
                return;
            }
        };

        let handler = shared.message_handler.lock().clone();
        match handler {
            Some(handler) => handler(record).await,
            None => warn!(peer = %shared.peer, "No message handler, dropping message"),
        }
    }

    /// Runs each pending disconnect handler once.
    fn fire_disconnect(shared: &Shared, reason: DisconnectReason) {
        let handlers = {
            let mut slot = shared.disconnect.lock();
            match std::mem::replace(&mut *slot, DisconnectSlot::Fired(reason.clone())) {
                DisconnectSlot::Pending(handlers) => handlers,
                DisconnectSlot::Fired(previous) => {
                    *slot = DisconnectSlot::Fired(previous);
                    Vec::new()
                }
            }
        };

        for handler in handlers {
            handler(reason.clone());
        }
    }

    /// Stops the peer process and waits for it to exit.
    async fn reap_child(peer: &str, mut child: Child) {
        if let Err(e) = child.start_kill() {
            trace!(peer = %peer, error = %e, "Peer process already exited");
        }

        match child.wait().await {
            Ok(status) => debug!(peer = %peer, %status, "Native peer exited"),
            Err(e) => warn!(peer = %peer, error = %e, "Failed to wait for native peer"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use serde_json::json;
    use tokio::io::AsyncWriteExt;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use crate::transport::codec::{DEFAULT_MAX_MESSAGE_BYTES, encode_frame};

    const WAIT: Duration = Duration::from_secs(5);

    fn collect(channel: &Channel) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        channel.on_message(move |record| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(record);
            }
        });
        rx
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<Value>) -> Value {
        timeout(WAIT, rx.recv())
            .await
            .expect("timed out waiting for message")
            .expect("receiver closed")
    }

    fn disconnect_signal(channel: &Channel) -> oneshot::Receiver<DisconnectReason> {
        let (tx, rx) = oneshot::channel();
        channel.on_disconnect(move |reason| {
            let _ = tx.send(reason);
        });
        rx
    }

    #[tokio::test]
    async fn test_messages_arrive_in_send_order() {
        let (left, right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let mut inbox = collect(&right);

        for i in 0..50 {
            left.send(&json!({ "type": "seq", "n": i })).expect("send");
        }

        for i in 0..50 {
            assert_eq!(next(&mut inbox).await["n"], i);
        }
    }

    #[tokio::test]
    async fn test_messages_sent_before_handler_are_delivered() {
        let (left, right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        left.send(&json!({ "type": "early" })).expect("send");
        tokio::task::yield_now().await;

        let mut inbox = collect(&right);
        assert_eq!(next(&mut inbox).await["type"], "early");
    }

    #[tokio::test]
    async fn test_handler_outlives_dropped_handles() {
        let (left, right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let mut inbox = collect(&right);
        drop(right);

        left.send(&json!({ "type": "after-drop" })).expect("send");
        assert_eq!(next(&mut inbox).await["type"], "after-drop");
        assert!(left.is_connected());
    }

    #[tokio::test]
    async fn test_dropped_handles_without_handler_close_channel() {
        let (left, right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let _inbox = collect(&left);
        let signal = disconnect_signal(&left);

        drop(right);

        let reason = timeout(WAIT, signal).await.expect("timed out").expect("fired");
        assert_eq!(reason, DisconnectReason::PeerClosed);
    }

    #[tokio::test]
    async fn test_send_after_local_disconnect_fails() {
        let (left, _right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        left.disconnect();

        assert_eq!(left.state(), ChannelState::Disconnected);
        assert!(matches!(
            left.send(&json!({ "type": "late" })),
            Err(Error::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_peer_close_fires_disconnect_once() {
        let (left, right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let _inbox = collect(&left);

        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        left.on_disconnect(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let signal = disconnect_signal(&left);

        let local_fired = Arc::new(AtomicUsize::new(0));
        let local_counter = Arc::clone(&local_fired);
        right.on_disconnect(move |_| {
            local_counter.fetch_add(1, Ordering::SeqCst);
        });

        right.disconnect();

        let reason = timeout(WAIT, signal).await.expect("timed out").expect("fired");
        assert_eq!(reason, DisconnectReason::PeerClosed);
        assert_eq!(left.state(), ChannelState::Disconnected);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(local_fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_late_disconnect_handler_runs_immediately() {
        let (left, right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let _inbox = collect(&left);
        let signal = disconnect_signal(&left);

        right.disconnect();
        timeout(WAIT, signal).await.expect("timed out").expect("fired");

        let (tx, rx) = oneshot::channel();
        left.on_disconnect(move |reason| {
            let _ = tx.send(reason);
        });
        assert_eq!(rx.await.expect("ran"), DisconnectReason::PeerClosed);
    }

    #[tokio::test]
    async fn test_oversized_message_keeps_channel_open() {
        let (left, right) = Channel::pair(128);
        let mut inbox = collect(&right);

        let err = left
            .send(&json!({ "type": "start", "url": "x".repeat(256) }))
            .unwrap_err();
        assert!(matches!(err, Error::MessageTooLarge { max: 128, .. }));
        assert!(left.is_connected());

        left.send(&json!({ "type": "small" })).expect("send");
        assert_eq!(next(&mut inbox).await["type"], "small");
    }

    #[tokio::test]
    async fn test_undecodable_frame_is_skipped() {
        let (near, far) = tokio::io::duplex(4096);
        let (near_read, near_write) = tokio::io::split(near);
        let channel = Channel::from_io("raw", near_read, near_write, DEFAULT_MAX_MESSAGE_BYTES);
        let mut inbox = collect(&channel);

        let (_far_read, mut far_write) = tokio::io::split(far);
        let mut garbage = (5u32).to_ne_bytes().to_vec();
        garbage.extend_from_slice(b"{oops");
        far_write.write_all(&garbage).await.expect("write");
        let frame = encode_frame(&json!({ "type": "ok" }), DEFAULT_MAX_MESSAGE_BYTES)
            .expect("encode");
        far_write.write_all(&frame).await.expect("write");

        assert_eq!(next(&mut inbox).await["type"], "ok");
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn test_handlers_run_one_at_a_time() {
        let (left, right) = Channel::pair(DEFAULT_MAX_MESSAGE_BYTES);
        let active = Arc::new(AtomicUsize::new(0));
        let (tx, mut done) = mpsc::unbounded_channel();

        let gauge = Arc::clone(&active);
        right.on_message(move |record| {
            let gauge = Arc::clone(&gauge);
            let tx = tx.clone();
            async move {
                assert_eq!(gauge.fetch_add(1, Ordering::SeqCst), 0);
                tokio::time::sleep(Duration::from_millis(5)).await;
                gauge.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(record);
            }
        });

        for i in 0..5 {
            left.send(&json!({ "type": "slow", "n": i })).expect("send");
        }
        for i in 0..5 {
            assert_eq!(next(&mut done).await["n"], i);
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_connect_to_echo_process() {
        let config = PeerConfig::new("echo-peer", "cat");
        let channel = Channel::connect(&config, DEFAULT_MAX_MESSAGE_BYTES).expect("launch cat");
        let mut inbox = collect(&channel);

        channel
            .send(&json!({ "type": "start", "url": "http://a.test/x", "time": 1.5 }))
            .expect("send");

        let echoed = next(&mut inbox).await;
        assert_eq!(echoed["url"], "http://a.test/x");
        assert_eq!(echoed["time"], 1.5);

        channel.disconnect();
        assert!(channel.send(&json!({ "type": "end" })).is_err());
    }

    #[test]
    fn test_missing_peer_program_rejected() {
        let config = PeerConfig::new("ghost", "/nonexistent/nav-relay-peer");
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");

        let result = runtime.block_on(async { Channel::connect(&config, DEFAULT_MAX_MESSAGE_BYTES) });
        assert!(matches!(result, Err(Error::PeerNotFound { .. })));
    }
}
