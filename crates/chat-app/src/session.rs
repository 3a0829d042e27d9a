use std::sync::Arc;

use tokio::sync::watch;

use crate::auth::{AuthFlow, AuthInput, AuthState, Identity};
use crate::channel::{
    ChannelEvent, ChannelEvents, ChannelManager, ChannelResult, ConnectionState, Connector,
    InboundMessage, OutboundMessage,
};
use crate::conversation::ConversationStore;
use crate::settings::{SavedSession, SessionFile};

/// Chat state for one signed-in identity: the relay channel and what it received.
pub struct ChatSession {
    identity: Arc<Identity>,
    endpoint: String,
    connector: Arc<dyn Connector>,
    channel: ChannelManager,
    events: ChannelEvents,
    conversation: ConversationStore,
}

impl ChatSession {
    pub fn new(
        endpoint: impl Into<String>,
        identity: Arc<Identity>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let endpoint = endpoint.into();
        let (channel, events) =
            ChannelManager::new(endpoint.clone(), Arc::clone(&identity), Arc::clone(&connector));
        Self {
            identity,
            endpoint,
            connector,
            channel,
            events,
            conversation: ConversationStore::new(),
        }
    }

    pub async fn open(&mut self) -> ConnectionState {
        self.channel.open().await
    }

    /// Replaces a closed channel with a fresh one and opens it. The conversation
    /// is kept. Does nothing unless the current channel is closed.
    pub async fn reconnect(&mut self) -> ConnectionState {
        let state = self.channel.state();
        if !state.is_closed() {
            tracing::debug!(?state, "reconnect skipped; channel not closed");
            return state;
        }

        let (channel, events) = ChannelManager::new(
            self.endpoint.clone(),
            Arc::clone(&self.identity),
            Arc::clone(&self.connector),
        );
        self.channel = channel;
        self.events = events;
        self.channel.open().await
    }

    pub fn identity(&self) -> &Arc<Identity> {
        &self.identity
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.channel.state()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.channel.watch_state()
    }

    pub fn conversation(&self) -> &ConversationStore {
        &self.conversation
    }

    pub fn send(&self, text: &str) -> ChannelResult<OutboundMessage> {
        self.channel.send(text)
    }

    /// Waits for the next channel event, recording received messages in the
    /// conversation. `None` once the channel has closed and its events are drained.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        let event = self.events.recv().await?;
        self.record(&event);
        Some(event)
    }

    /// Whether `message` was sent under this session's display name.
    pub fn is_own(&self, message: &InboundMessage) -> bool {
        message.user == self.identity.display_name()
    }

    pub fn close(&mut self) {
        self.channel.close();
    }

    fn record(&mut self, event: &ChannelEvent) {
        if let ChannelEvent::MessageReceived(message) = event {
            self.conversation.append(message.clone());
        }
    }
}

/// Auth flow plus the chat session it unlocks.
///
/// A session is started the moment the flow reaches `Authenticated` and torn down
/// before the flow signs out. With a [`SessionFile`] attached, the refresh token of
/// each sign-in is saved so the next run can skip the login screen.
pub struct ChatClient {
    auth: AuthFlow,
    connector: Arc<dyn Connector>,
    relay_endpoint: String,
    session: Option<ChatSession>,
    session_file: Option<SessionFile>,
}

impl ChatClient {
    pub fn new(
        auth: AuthFlow,
        connector: Arc<dyn Connector>,
        relay_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            connector,
            relay_endpoint: relay_endpoint.into(),
            session: None,
            session_file: None,
        }
    }

    pub fn with_session_file(mut self, session_file: SessionFile) -> Self {
        self.session_file = Some(session_file);
        self
    }

    pub fn relay_endpoint(&self) -> &str {
        &self.relay_endpoint
    }

    /// Relay used by sessions started from now on; a live session keeps its own.
    pub fn set_relay_endpoint(&mut self, endpoint: impl Into<String>) {
        self.relay_endpoint = endpoint.into();
    }

    /// Signs in with the saved session, if there is one, and starts chatting.
    ///
    /// A saved session the identity service no longer accepts is deleted.
    pub async fn restore_saved_session(&mut self) -> &AuthState {
        let saved = self.session_file.as_ref().and_then(SessionFile::load);
        let Some(saved) = saved else {
            return self.auth.state();
        };

        self.auth.restore_session(&saved.refresh_token).await;
        if self.auth.state().is_authenticated() {
            self.remember_session();
            self.ensure_session().await;
        } else {
            self.forget_session();
        }
        self.auth.state()
    }

    pub fn auth_state(&self) -> &AuthState {
        self.auth.state()
    }

    pub fn subscribe_auth(&self) -> watch::Receiver<AuthState> {
        self.auth.subscribe()
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ChatSession> {
        self.session.as_mut()
    }

    pub async fn handle(&mut self, input: AuthInput) -> &AuthState {
        if matches!(input, AuthInput::SignOut) {
            return self.sign_out().await;
        }

        self.auth.dispatch(input).await;
        if self.session.is_none() && self.auth.state().is_authenticated() {
            self.remember_session();
            self.ensure_session().await;
        }
        self.auth.state()
    }

    /// Closes the chat channel, forgets the saved session, then signs out of the
    /// identity service.
    pub async fn sign_out(&mut self) -> &AuthState {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        if self.auth.state().is_authenticated() {
            self.forget_session();
        }
        self.auth.sign_out().await
    }

    /// Disconnects from the relay but stays signed in, so a saved session
    /// survives to the next run.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    fn remember_session(&self) {
        let Some(file) = &self.session_file else {
            return;
        };
        let Some(refresh_token) = self
            .auth
            .session_tokens()
            .and_then(|tokens| tokens.refresh_token.clone())
        else {
            return;
        };

        if let Err(error) = file.save(&SavedSession { refresh_token }) {
            tracing::warn!(error = %error, "could not save session");
        }
    }

    fn forget_session(&self) {
        let Some(file) = &self.session_file else {
            return;
        };
        if let Err(error) = file.clear() {
            tracing::warn!(error = %error, "could not delete saved session");
        }
    }

    async fn ensure_session(&mut self) {
        if self.session.is_some() {
            return;
        }
        let Some(identity) = self.auth.identity() else {
            return;
        };

        let mut session =
            ChatSession::new(self.relay_endpoint.clone(), identity, Arc::clone(&self.connector));
        let state = session.open().await;
        tracing::info!(?state, user = %session.identity().display_name(), "chat session started");
        self.session = Some(session);
    }
}

#[cfg(test)]
mod tests {
    use skychat_identity::{
        AuthError, AuthErrorKind, IdentityClient, SessionTokens, SignInOutcome, UserProfile,
    };

    use super::*;
    use crate::auth::AuthScreen;
    use crate::channel::CloseReason;
    use crate::testing::{IdentityCall, MemoryConnector, ScriptedIdentityClient, inbound_frame};

    fn login(email: &str) -> AuthInput {
        AuthInput::SubmitLogin {
            email: email.to_string(),
            password: "password1".to_string(),
        }
    }

    fn client_with(
        identity: &Arc<ScriptedIdentityClient>,
        connector: Arc<MemoryConnector>,
    ) -> ChatClient {
        let auth = AuthFlow::new(Arc::clone(identity) as Arc<dyn IdentityClient>);
        ChatClient::new(auth, connector, "wss://relay.test/prod/")
    }

    #[tokio::test]
    async fn login_opens_a_session_and_records_messages() {
        let identity = Arc::new(ScriptedIdentityClient::default());
        let (connector, relay) = MemoryConnector::new();
        let mut client = client_with(&identity, connector);

        assert!(client.handle(login("a@b.com")).await.is_authenticated());
        let session = client.session_mut().expect("session after login");
        assert_eq!(session.connection_state(), ConnectionState::Open);

        relay.push_text(&inbound_frame("u1", "M1", 1));
        relay.push_text(&inbound_frame("a@b.com", "M2", 2));
        relay.push_text(r#"{"foo":1}"#);

        assert_eq!(
            session.next_event().await,
            Some(ChannelEvent::ConnectionOpened)
        );
        session.next_event().await;
        session.next_event().await;

        let texts: Vec<_> = session
            .conversation()
            .iter()
            .map(|message| message.text.as_str())
            .collect();
        assert_eq!(texts, ["M1", "M2"]);
        let own: Vec<_> = session
            .conversation()
            .iter()
            .map(|message| session.is_own(message))
            .collect();
        assert_eq!(own, [false, true]);
    }

    #[tokio::test]
    async fn messages_without_a_timestamp_still_reach_the_conversation() {
        let identity = Arc::new(ScriptedIdentityClient::default());
        let (connector, relay) = MemoryConnector::new();
        let mut client = client_with(&identity, connector);
        client.handle(login("a@b.com")).await;
        let session = client.session_mut().expect("session after login");

        relay.push_text(r#"{"data":{"user":"u","text":"t"}}"#);
        session.next_event().await;
        session.next_event().await;

        let messages = session.conversation().all();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].user, "u");
        assert_eq!(messages[0].text, "t");
        assert_eq!(messages[0].timestamp, None);
    }

    #[tokio::test]
    async fn sign_in_is_remembered_until_sign_out() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = SessionFile::in_dir(dir.path());
        let identity = Arc::new(ScriptedIdentityClient::default());
        identity.push_login(Ok(SignInOutcome::signed_in(Some(SessionTokens {
            access_token: "access".to_string(),
            id_token: None,
            refresh_token: Some("refresh-9".to_string()),
            expires_in_seconds: Some(3600),
        }))));
        let (connector, _relay) = MemoryConnector::new();
        let mut client = client_with(&identity, connector).with_session_file(file.clone());

        client.handle(login("a@b.com")).await;
        assert_eq!(
            file.load().map(|saved| saved.refresh_token).as_deref(),
            Some("refresh-9")
        );

        client.close();
        assert!(client.auth_state().is_authenticated());
        assert!(file.load().is_some());

        client.sign_out().await;
        assert_eq!(file.load(), None);
    }

    #[tokio::test]
    async fn saved_session_skips_the_login_screen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = SessionFile::in_dir(dir.path());
        file.save(&SavedSession {
            refresh_token: "refresh-1".to_string(),
        })
        .expect("save session");
        let identity = Arc::new(ScriptedIdentityClient::default());
        identity.push_profile(Ok(UserProfile {
            username: "8d1f-4c2a".to_string(),
            email: Some("a@b.com".to_string()),
        }));
        let (connector, _relay) = MemoryConnector::new();
        let mut client = client_with(&identity, connector).with_session_file(file.clone());

        assert!(client.restore_saved_session().await.is_authenticated());

        let session = client.session().expect("session after restore");
        assert_eq!(session.identity().display_name(), "a@b.com");
        assert_eq!(session.connection_state(), ConnectionState::Open);
        assert_eq!(
            file.load().map(|saved| saved.refresh_token).as_deref(),
            Some("refresh-1")
        );
    }

    #[tokio::test]
    async fn rejected_saved_session_is_deleted() {
        let dir = tempfile::tempdir().expect("temp dir");
        let file = SessionFile::in_dir(dir.path());
        file.save(&SavedSession {
            refresh_token: "revoked".to_string(),
        })
        .expect("save session");
        let identity = Arc::new(ScriptedIdentityClient::default());
        identity.push_refresh(Err(AuthError::service(
            AuthErrorKind::NotAuthorized,
            "Refresh Token has been revoked",
        )));
        let (connector, _relay) = MemoryConnector::new();
        let mut client =
            client_with(&identity, Arc::clone(&connector)).with_session_file(file.clone());

        let state = client.restore_saved_session().await;

        assert_eq!(state, &AuthState::default());
        assert!(client.session().is_none());
        assert_eq!(connector.connect_calls(), 0);
        assert_eq!(file.load(), None);
    }

    #[tokio::test]
    async fn nothing_is_restored_without_a_saved_session() {
        let dir = tempfile::tempdir().expect("temp dir");
        let identity = Arc::new(ScriptedIdentityClient::default());
        let (connector, _relay) = MemoryConnector::new();
        let mut client =
            client_with(&identity, connector).with_session_file(SessionFile::in_dir(dir.path()));

        assert_eq!(client.restore_saved_session().await, &AuthState::default());
        assert!(identity.calls().is_empty());
    }

    #[tokio::test]
    async fn new_relay_endpoint_applies_to_the_next_session() {
        let identity = Arc::new(ScriptedIdentityClient::default());
        let (connector, _relay) = MemoryConnector::new();
        let mut client = client_with(&identity, connector);

        client.set_relay_endpoint("ws://127.0.0.1:9000");
        client.handle(login("a@b.com")).await;

        assert_eq!(client.relay_endpoint(), "ws://127.0.0.1:9000");
        assert_eq!(
            client.session().expect("session after login").endpoint(),
            "ws://127.0.0.1:9000"
        );
    }

    #[tokio::test]
    async fn failed_login_starts_no_session() {
        let identity = Arc::new(ScriptedIdentityClient::default());
        identity.push_login(Err(AuthError::service(
            AuthErrorKind::NotAuthorized,
            "Incorrect username or password",
        )));
        let (connector, _relay) = MemoryConnector::new();
        let mut client = client_with(&identity, Arc::clone(&connector));

        let state = client.handle(login("a@b.com")).await;

        assert_eq!(state.screen(), Some(AuthScreen::Login));
        assert!(client.session().is_none());
        assert_eq!(connector.connect_calls(), 0);
    }

    #[tokio::test]
    async fn sign_out_closes_the_channel_before_resetting_auth() {
        let identity = Arc::new(ScriptedIdentityClient::default());
        let (connector, mut relay) = MemoryConnector::new();
        let mut client = client_with(&identity, connector);
        client.handle(login("a@b.com")).await;
        let mut connection_state = client
            .session()
            .expect("session after login")
            .watch_connection_state();

        let state = client.handle(AuthInput::SignOut).await;

        assert_eq!(state, &AuthState::default());
        assert!(client.session().is_none());
        assert_eq!(
            *connection_state.borrow_and_update(),
            ConnectionState::Closed
        );
        assert_eq!(relay.next_outbound().await, None);
        assert_eq!(
            identity.calls().last(),
            Some(&IdentityCall::SignOut { had_tokens: false })
        );
    }

    #[tokio::test]
    async fn unreachable_relay_closes_the_session_channel() {
        let identity = Arc::new(ScriptedIdentityClient::default());
        let mut client = client_with(&identity, MemoryConnector::refusing());

        client.handle(login("a@b.com")).await;

        let session = client.session_mut().expect("session after login");
        assert_eq!(session.connection_state(), ConnectionState::Closed);
        assert!(matches!(
            session.next_event().await,
            Some(ChannelEvent::ConnectionClosed(CloseReason::HandshakeFailed(_)))
        ));
        assert!(session.send("hello").is_err());
    }

    #[tokio::test]
    async fn reconnect_replaces_only_a_closed_channel() {
        let identity = Arc::new(ScriptedIdentityClient::default());
        let (connector, relay) = MemoryConnector::new();
        let mut client = client_with(&identity, Arc::clone(&connector));
        client.handle(login("a@b.com")).await;
        let session = client.session_mut().expect("session after login");

        assert_eq!(session.reconnect().await, ConnectionState::Open);
        assert_eq!(connector.connect_calls(), 1);

        relay.push_text(&inbound_frame("u1", "M1", 1));
        relay.push_close(1001, "going away");
        while session.next_event().await.is_some() {}
        assert_eq!(session.connection_state(), ConnectionState::Closed);

        assert_eq!(session.reconnect().await, ConnectionState::Closed);
        assert_eq!(connector.connect_calls(), 2);
        assert_eq!(session.conversation().len(), 1);
    }
}
