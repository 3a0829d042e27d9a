#![deny(unsafe_code)]

//! Core of a single-room chat client: identity sign-in, a relay channel and the
//! conversation it fills.

pub mod auth;
pub mod channel;
pub mod command;
pub mod conversation;
pub mod session;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthFlow, AuthInput, AuthScreen, AuthState, Identity};
pub use channel::{ChannelEvent, ChannelManager, ConnectionState, WebSocketConnector};
pub use conversation::ConversationStore;
pub use session::{ChatClient, ChatSession};
