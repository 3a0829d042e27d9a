use std::pin::Pin;

use futures::{Sink, SinkExt, Stream, StreamExt, future};
use skychat_identity::BoxFuture;
use snafu::{IntoError, ResultExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use super::error::{HandshakeSnafu, ReceiveSnafu, SendSnafu, TransportError, TransportResult};

/// Frame read from a relay connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Close { code: Option<u16>, reason: String },
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;
pub type FrameStream = Pin<Box<dyn Stream<Item = TransportResult<Frame>> + Send>>;

/// An established full-duplex connection: text frames out, frames in.
pub struct Connection {
    pub sink: FrameSink,
    pub frames: FrameStream,
}

/// Opens connections to a relay endpoint.
pub trait Connector: Send + Sync {
    fn connect<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, TransportResult<Connection>>;
}

/// [`Connector`] over WebSocket (TLS via rustls for `wss://`).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    fn connect<'a>(&'a self, endpoint: &'a str) -> BoxFuture<'a, TransportResult<Connection>> {
        Box::pin(async move {
            let (socket, response) = connect_async(endpoint).await.context(HandshakeSnafu {
                stage: "websocket-handshake",
                endpoint: endpoint.to_string(),
            })?;
            tracing::debug!(
                endpoint,
                status = %response.status(),
                "websocket handshake completed"
            );

            let (write, read) = socket.split();
            let sink = write
                .sink_map_err(|source| {
                    SendSnafu {
                        stage: "websocket-send",
                    }
                    .into_error(source)
                })
                .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text))));
            let frames = read.filter_map(|message| future::ready(read_frame(message)));

            Ok(Connection {
                sink: Box::pin(sink),
                frames: Box::pin(frames),
            })
        })
    }
}

/// Maps one WebSocket message to a frame; control and binary messages yield `None`.
fn read_frame(message: Result<Message, tungstenite::Error>) -> Option<TransportResult<Frame>> {
    let message = match message.context(ReceiveSnafu {
        stage: "websocket-receive",
    }) {
        Ok(message) => message,
        Err(error) => return Some(Err(error)),
    };

    match message {
        Message::Text(text) => Some(Ok(Frame::Text(text))),
        Message::Close(frame) => Some(Ok(match frame {
            Some(frame) => Frame::Close {
                code: Some(u16::from(frame.code)),
                reason: frame.reason.into_owned(),
            },
            None => Frame::Close {
                code: None,
                reason: String::new(),
            },
        })),
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}
