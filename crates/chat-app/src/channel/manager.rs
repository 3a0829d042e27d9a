use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use snafu::ensure;
use tokio::sync::{mpsc, oneshot, watch};

use super::error::{ChannelResult, EmptyMessageSnafu, NotConnectedSnafu};
use super::events::ChannelEvents;
use super::state::{ChannelEvent, CloseReason, ConnectionState, ConnectionTransition};
use super::transport::{Connection, Connector, Frame};
use super::wire::{
    OutboundMessage, current_unix_timestamp_millis, decode_inbound, encode_outbound,
};
use crate::auth::Identity;

/// Owns one connection to the chat relay for a signed-in identity.
///
/// A manager is single-use. It starts in `Connecting`, [`open`](Self::open) performs
/// the handshake exactly once, and after `Closed` it never reconnects; build a new
/// manager to retry. Events come out of the [`ChannelEvents`] handed back by
/// [`new`](Self::new).
pub struct ChannelManager {
    endpoint: String,
    identity: Arc<Identity>,
    connector: Arc<dyn Connector>,
    shared: Arc<ChannelShared>,
    outbound_tx: Option<mpsc::UnboundedSender<String>>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

struct ChannelShared {
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl ChannelShared {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn transition(&self, transition: ConnectionTransition) -> bool {
        self.state.send_if_modified(|state| match state.apply(transition) {
            Ok(next) if next != *state => {
                *state = next;
                true
            }
            Ok(_) => false,
            Err(rejection) => {
                tracing::debug!(?rejection, "connection transition rejected");
                false
            }
        })
    }

    fn mark_open(&self) -> bool {
        if !self.transition(ConnectionTransition::HandshakeSucceeded) {
            return false;
        }
        let _ = self.events.send(ChannelEvent::ConnectionOpened);
        true
    }

    /// Moves to `Closed` and emits the final event, once.
    fn mark_closed(&self, reason: CloseReason) {
        if !self.transition(ConnectionTransition::Close) {
            return;
        }
        tracing::info!(?reason, "relay connection closed");
        let _ = self.events.send(ChannelEvent::ConnectionClosed(reason));
    }

    fn deliver(&self, frame: &str) {
        if !self.state().is_open() {
            return;
        }
        match decode_inbound(frame) {
            Ok(message) => {
                let _ = self.events.send(ChannelEvent::MessageReceived(message));
            }
            Err(error) => tracing::debug!(error = %error, "discarding inbound frame"),
        }
    }
}

impl ChannelManager {
    pub fn new(
        endpoint: impl Into<String>,
        identity: Arc<Identity>,
        connector: Arc<dyn Connector>,
    ) -> (Self, ChannelEvents) {
        let (state, _) = watch::channel(ConnectionState::Connecting);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            endpoint: endpoint.into(),
            identity,
            connector,
            shared: Arc::new(ChannelShared {
                state,
                events: events_tx,
            }),
            outbound_tx: None,
            cancel_tx: None,
        };
        (manager, ChannelEvents::new(events_rx))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Performs the handshake and starts the connection task.
    ///
    /// Returns the resulting state: `Open`, or `Closed` when the handshake failed.
    /// Calling it again, or after `close`, changes nothing.
    pub async fn open(&mut self) -> ConnectionState {
        let state = self.state();
        if state != ConnectionState::Connecting || self.cancel_tx.is_some() {
            tracing::warn!(?state, "open ignored; relay channels are single-use");
            return state;
        }

        tracing::info!(
            endpoint = %self.endpoint,
            user = %self.identity.display_name(),
            "connecting to relay"
        );
        let connection = match self.connector.connect(&self.endpoint).await {
            Ok(connection) => connection,
            Err(error) => {
                tracing::warn!(
                    endpoint = %self.endpoint,
                    error = %error,
                    "relay handshake failed"
                );
                self.shared
                    .mark_closed(CloseReason::HandshakeFailed(error.to_string()));
                return self.state();
            }
        };

        if !self.shared.mark_open() {
            return self.state();
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.outbound_tx = Some(outbound_tx);
        self.cancel_tx = Some(cancel_tx);
        tokio::spawn(run_connection(
            Arc::clone(&self.shared),
            connection,
            outbound_rx,
            cancel_rx,
        ));
        ConnectionState::Open
    }

    /// Sends `text` as the session identity, stamped with the current time.
    pub fn send(&self, text: &str) -> ChannelResult<OutboundMessage> {
        self.send_at(text, current_unix_timestamp_millis())
    }

    /// Sends `text` with an explicit timestamp in Unix milliseconds.
    ///
    /// Nothing is transmitted unless the channel is `Open`. The text goes out as
    /// typed; only text that is blank after trimming is refused.
    pub fn send_at(&self, text: &str, timestamp: i64) -> ChannelResult<OutboundMessage> {
        let state = self.state();
        let outbound_tx = match &self.outbound_tx {
            Some(outbound_tx) if state.is_open() => outbound_tx,
            _ => {
                return NotConnectedSnafu {
                    stage: "send-message",
                    state,
                }
                .fail();
            }
        };
        ensure!(
            !text.trim().is_empty(),
            EmptyMessageSnafu {
                stage: "send-message"
            }
        );

        let message = OutboundMessage::new(&self.identity, text, timestamp);
        let frame = encode_outbound(&message)?;
        if outbound_tx.send(frame).is_err() {
            return NotConnectedSnafu {
                stage: "enqueue-outbound-frame",
                state: self.state(),
            }
            .fail();
        }
        tracing::debug!(timestamp, "queued outbound message");
        Ok(message)
    }

    /// Closes the connection. Safe to call in any state and any number of times.
    pub fn close(&mut self) {
        self.outbound_tx = None;
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
        self.shared.mark_closed(CloseReason::LocalClose);
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_connection(
    shared: Arc<ChannelShared>,
    connection: Connection,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    mut cancel_rx: oneshot::Receiver<()>,
) {
    let Connection {
        mut sink,
        mut frames,
    } = connection;

    // Frames queued before a local close are still flushed.
    loop {
        tokio::select! {
            biased;

            outbound = outbound_rx.recv() => {
                let Some(frame) = outbound else {
                    let _ = sink.close().await;
                    break;
                };
                if let Err(error) = sink.send(frame).await {
                    tracing::warn!(error = %error, "relay send failed");
                    shared.mark_closed(CloseReason::TransportFailed(error.to_string()));
                    break;
                }
            }
            _ = &mut cancel_rx => {
                if let Err(error) = sink.close().await {
                    tracing::debug!(error = %error, "closing relay connection failed");
                }
                break;
            }
            inbound = frames.next() => match inbound {
                Some(Ok(Frame::Text(text))) => shared.deliver(&text),
                Some(Ok(Frame::Close { code, reason })) => {
                    shared.mark_closed(CloseReason::RemoteClosed { code, reason });
                    break;
                }
                Some(Err(error)) => {
                    tracing::warn!(error = %error, "relay receive failed");
                    shared.mark_closed(CloseReason::TransportFailed(error.to_string()));
                    break;
                }
                None => {
                    shared.mark_closed(CloseReason::RemoteClosed {
                        code: None,
                        reason: String::new(),
                    });
                    break;
                }
            },
        }
    }
}
