use super::wire::InboundMessage;

/// Lifecycle of one relay connection.
///
/// Progress is one-way: `Connecting -> Open -> Closed`, or straight from
/// `Connecting` to `Closed` when the handshake fails. A closed channel stays closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTransition {
    HandshakeSucceeded,
    Close,
}

/// Rejection reason for illegal connection transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionTransitionRejection {
    AlreadyOpen,
    AlreadyClosed,
}

pub type ConnectionTransitionResult = Result<ConnectionState, ConnectionTransitionRejection>;

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }

    pub fn is_closed(self) -> bool {
        self == Self::Closed
    }

    /// Applies one transition without side effects. Closing twice is allowed and
    /// leaves the state unchanged.
    pub fn apply(self, transition: ConnectionTransition) -> ConnectionTransitionResult {
        match (self, transition) {
            (Self::Connecting, ConnectionTransition::HandshakeSucceeded) => Ok(Self::Open),
            (Self::Open, ConnectionTransition::HandshakeSucceeded) => {
                Err(ConnectionTransitionRejection::AlreadyOpen)
            }
            (Self::Closed, ConnectionTransition::HandshakeSucceeded) => {
                Err(ConnectionTransitionRejection::AlreadyClosed)
            }
            (_, ConnectionTransition::Close) => Ok(Self::Closed),
        }
    }
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    LocalClose,
    HandshakeFailed(String),
    RemoteClosed { code: Option<u16>, reason: String },
    TransportFailed(String),
}

/// Observable channel activity, delivered in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    ConnectionOpened,
    MessageReceived(InboundMessage),
    /// Always the last event a channel emits.
    ConnectionClosed(CloseReason),
}
