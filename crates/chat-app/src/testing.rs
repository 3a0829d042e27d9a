//! In-memory doubles for the identity service and the relay transport.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::channel::mpsc as frame_channel;
use futures::{SinkExt, StreamExt};
use skychat_identity::{
    AuthResult, BoxFuture, IdentityClient, SessionTokens, SignInOutcome, UserAttribute,
    UserProfile,
};
use tokio::sync::Notify;

use crate::channel::{Connection, Connector, Frame, TransportError, TransportResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum IdentityCall {
    Login {
        username: String,
    },
    Register {
        username: String,
        attributes: Vec<UserAttribute>,
    },
    ConfirmRegistration {
        username: String,
        code: String,
    },
    ResendConfirmationCode {
        username: String,
    },
    RefreshSession {
        refresh_token: String,
    },
    CurrentUser {
        access_token: String,
    },
    SignOut {
        had_tokens: bool,
    },
}

/// Identity client answering from queued results.
///
/// Logins, refreshes and user lookups answer from their own queues; every other
/// operation pops the shared unit queue. Empty queues answer `Ok`. A gated client
/// holds each request until [`release`](Self::release) is called.
#[derive(Default)]
pub(crate) struct ScriptedIdentityClient {
    logins: Mutex<VecDeque<AuthResult<SignInOutcome>>>,
    refreshes: Mutex<VecDeque<AuthResult<SessionTokens>>>,
    profiles: Mutex<VecDeque<AuthResult<UserProfile>>>,
    units: Mutex<VecDeque<AuthResult<()>>>,
    calls: Mutex<Vec<IdentityCall>>,
    gate: Option<Notify>,
}

impl ScriptedIdentityClient {
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Notify::new()),
            ..Self::default()
        }
    }

    pub(crate) fn push_login(&self, result: AuthResult<SignInOutcome>) {
        self.logins.lock().expect("logins lock").push_back(result);
    }

    pub(crate) fn push_refresh(&self, result: AuthResult<SessionTokens>) {
        self.refreshes.lock().expect("refreshes lock").push_back(result);
    }

    pub(crate) fn push_profile(&self, result: AuthResult<UserProfile>) {
        self.profiles.lock().expect("profiles lock").push_back(result);
    }

    pub(crate) fn push_unit(&self, result: AuthResult<()>) {
        self.units.lock().expect("units lock").push_back(result);
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub(crate) fn calls(&self) -> Vec<IdentityCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn record(&self, call: IdentityCall) {
        self.calls.lock().expect("calls lock").push(call);
    }

    async fn wait_for_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
    }

    fn next_unit(&self) -> AuthResult<()> {
        self.units
            .lock()
            .expect("units lock")
            .pop_front()
            .unwrap_or(Ok(()))
    }
}

impl IdentityClient for ScriptedIdentityClient {
    fn login<'a>(
        &'a self,
        username: &'a str,
        _password: &'a str,
    ) -> BoxFuture<'a, AuthResult<SignInOutcome>> {
        Box::pin(async move {
            self.record(IdentityCall::Login {
                username: username.to_string(),
            });
            self.wait_for_gate().await;
            self.logins
                .lock()
                .expect("logins lock")
                .pop_front()
                .unwrap_or_else(|| Ok(SignInOutcome::signed_in(None)))
        })
    }

    fn register<'a>(
        &'a self,
        username: &'a str,
        _password: &'a str,
        attributes: &'a [UserAttribute],
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            self.record(IdentityCall::Register {
                username: username.to_string(),
                attributes: attributes.to_vec(),
            });
            self.wait_for_gate().await;
            self.next_unit()
        })
    }

    fn confirm_registration<'a>(
        &'a self,
        username: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            self.record(IdentityCall::ConfirmRegistration {
                username: username.to_string(),
                code: code.to_string(),
            });
            self.wait_for_gate().await;
            self.next_unit()
        })
    }

    fn resend_confirmation_code<'a>(&'a self, username: &'a str)
    -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            self.record(IdentityCall::ResendConfirmationCode {
                username: username.to_string(),
            });
            self.wait_for_gate().await;
            self.next_unit()
        })
    }

    fn refresh_session<'a>(&'a self, refresh_token: &'a str)
    -> BoxFuture<'a, AuthResult<SessionTokens>> {
        Box::pin(async move {
            self.record(IdentityCall::RefreshSession {
                refresh_token: refresh_token.to_string(),
            });
            self.wait_for_gate().await;
            self.refreshes
                .lock()
                .expect("refreshes lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(SessionTokens {
                        access_token: "refreshed-access".to_string(),
                        id_token: None,
                        refresh_token: Some(refresh_token.to_string()),
                        expires_in_seconds: Some(3600),
                    })
                })
        })
    }

    fn current_user<'a>(
        &'a self,
        tokens: &'a SessionTokens,
    ) -> BoxFuture<'a, AuthResult<UserProfile>> {
        Box::pin(async move {
            self.record(IdentityCall::CurrentUser {
                access_token: tokens.access_token.clone(),
            });
            self.profiles
                .lock()
                .expect("profiles lock")
                .pop_front()
                .unwrap_or_else(|| {
                    Ok(UserProfile {
                        username: "user-1".to_string(),
                        email: None,
                    })
                })
        })
    }

    fn sign_out<'a>(&'a self, tokens: Option<&'a SessionTokens>)
    -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            self.record(IdentityCall::SignOut {
                had_tokens: tokens.is_some(),
            });
            self.next_unit()
        })
    }
}

/// Connector handing out a single in-memory connection.
pub(crate) struct MemoryConnector {
    connection: Mutex<Option<Connection>>,
    connect_calls: AtomicUsize,
}

/// Relay side of a [`MemoryConnector`] connection.
pub(crate) struct MemoryRelay {
    inbound: frame_channel::UnboundedSender<TransportResult<Frame>>,
    outbound: frame_channel::UnboundedReceiver<String>,
}

impl MemoryConnector {
    pub(crate) fn new() -> (Arc<Self>, MemoryRelay) {
        let (outbound_tx, outbound_rx) = frame_channel::unbounded::<String>();
        let (inbound_tx, inbound_rx) = frame_channel::unbounded::<TransportResult<Frame>>();
        let sink = outbound_tx.sink_map_err(|_| TransportError::PeerGone {
            stage: "memory-relay-send",
        });
        let connection = Connection {
            sink: Box::pin(sink),
            frames: Box::pin(inbound_rx),
        };
        let connector = Arc::new(Self {
            connection: Mutex::new(Some(connection)),
            connect_calls: AtomicUsize::new(0),
        });
        let relay = MemoryRelay {
            inbound: inbound_tx,
            outbound: outbound_rx,
        };
        (connector, relay)
    }

    /// Connector whose handshake always fails.
    pub(crate) fn refusing() -> Arc<Self> {
        Arc::new(Self {
            connection: Mutex::new(None),
            connect_calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    fn connect<'a>(&'a self, _endpoint: &'a str) -> BoxFuture<'a, TransportResult<Connection>> {
        Box::pin(async move {
            self.connect_calls.fetch_add(1, Ordering::SeqCst);
            self.connection
                .lock()
                .expect("connection lock")
                .take()
                .ok_or(TransportError::PeerGone {
                    stage: "memory-relay-handshake",
                })
        })
    }
}

impl MemoryRelay {
    pub(crate) fn push_text(&self, text: &str) {
        let _ = self.inbound.unbounded_send(Ok(Frame::Text(text.to_string())));
    }

    pub(crate) fn push_close(&self, code: u16, reason: &str) {
        let _ = self.inbound.unbounded_send(Ok(Frame::Close {
            code: Some(code),
            reason: reason.to_string(),
        }));
    }

    pub(crate) async fn next_outbound(&mut self) -> Option<String> {
        self.outbound.next().await
    }

    pub(crate) fn try_next_outbound(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }
}

/// Relay broadcast frame carrying one chat message.
pub(crate) fn inbound_frame(user: &str, text: &str, timestamp: i64) -> String {
    serde_json::json!({
        "data": { "user": user, "text": text, "timestamp": timestamp }
    })
    .to_string()
}
