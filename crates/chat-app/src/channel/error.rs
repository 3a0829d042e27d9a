use snafu::Snafu;

use super::state::ConnectionState;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChannelError {
    #[snafu(display("Not connected to server!"))]
    NotConnected {
        stage: &'static str,
        state: ConnectionState,
    },
    #[snafu(display("cannot send an empty message"))]
    EmptyMessage { stage: &'static str },
    #[snafu(display("failed to encode outbound frame on `{stage}`: {source}"))]
    EncodeFrame {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("websocket handshake with {endpoint} failed: {source}"))]
    Handshake {
        stage: &'static str,
        endpoint: String,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[snafu(display("websocket send failed on `{stage}`: {source}"))]
    Send {
        stage: &'static str,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[snafu(display("websocket receive failed on `{stage}`: {source}"))]
    Receive {
        stage: &'static str,
        source: tokio_tungstenite::tungstenite::Error,
    },
    #[snafu(display("connection peer went away on `{stage}`"))]
    PeerGone { stage: &'static str },
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Why an inbound frame could not be turned into a message.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FrameError {
    #[snafu(display("inbound frame is not a valid message envelope: {source}"))]
    Malformed {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("inbound frame has no `data` payload"))]
    MissingData { stage: &'static str },
}

pub type FrameResult<T> = Result<T, FrameError>;
