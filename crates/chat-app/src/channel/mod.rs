pub mod error;
pub mod events;
pub mod manager;
pub mod state;
pub mod transport;
pub mod wire;

pub use error::{ChannelError, ChannelResult, FrameError, TransportError, TransportResult};
pub use events::ChannelEvents;
pub use manager::ChannelManager;
pub use state::{
    ChannelEvent, CloseReason, ConnectionState, ConnectionTransition,
    ConnectionTransitionRejection,
};
pub use transport::{Connection, Connector, Frame, WebSocketConnector};
pub use wire::{
    DEFAULT_ROOM_ID, InboundMessage, OutboundMessage, SEND_MESSAGE_ACTION, decode_inbound,
    encode_outbound,
};
