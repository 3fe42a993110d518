//! # Chatwire
//!
//! Real-time connection and event-sync layer for chat clients.
//!
//! Chatwire owns one long-lived connection to a chat server and keeps it
//! alive: it reconnects with bounded exponential backoff, paces outbound
//! messages, routes inbound events to handlers and subscribers, tracks who
//! is typing and who is online, and moves the session between
//! conversations without tearing the connection down.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chatwire::prelude::*;
//!
//! # async fn run() -> Result<(), ChatwireError> {
//! let client = ChatClient::builder()
//!     .url("wss://chat.example.com/ws")
//!     .username("alice")
//!     .token("secret")
//!     .conversation("general")
//!     .build(WebSocketConnector, OpenMembership)
//!     .await?;
//!
//! let mut updates = client.subscribe(EventFilter::all()).await?;
//! client.send("hello", None).await?;
//! while let Some(update) = updates.recv().await {
//!     println!("{update:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! ```text
//! ChatClient (this crate)   <- handle, builder, connection manager task
//!     |
//! chatwire-dispatch         <- decode, route, subscriptions
//! chatwire-session          <- typing, presence, membership
//! chatwire-throttle         <- send queue, typing throttle, backoff
//! chatwire-protocol         <- frames, events, codec
//! chatwire-transport        <- connector traits, WebSocket
//! ```

mod client;
mod config;
mod error;
mod manager;
mod status;

pub use client::{ChatClient, ChatClientBuilder};
pub use config::ClientConfig;
pub use error::ChatwireError;
pub use status::{ClientSnapshot, ConnectionState, ConnectionStatus, Fault};

pub use chatwire_dispatch as dispatch;
pub use chatwire_protocol as protocol;
pub use chatwire_session as session;
pub use chatwire_throttle as throttle;
pub use chatwire_transport as transport;

pub mod prelude {
    //! The types most applications need.

    pub use crate::{
        ChatClient, ChatClientBuilder, ChatwireError, ClientConfig, ClientSnapshot,
        ConnectionState, ConnectionStatus, Fault,
    };
    pub use chatwire_dispatch::{EventFilter, EventHandler, Subscription, Update};
    pub use chatwire_protocol::{ChannelId, EventKind, InboundEvent, MessageId, Username};
    pub use chatwire_session::{Membership, OpenMembership, SessionError};
    pub use chatwire_throttle::ReconnectConfig;
    pub use chatwire_transport::{CloseCode, Connector};
    #[cfg(feature = "websocket")]
    pub use chatwire_transport::WebSocketConnector;
}
