//! Wire protocol for Chatwire.
//!
//! This crate defines the "language" the chat client and server speak:
//!
//! - **Identity types** ([`Username`], [`ChannelId`], [`MessageId`]).
//! - **Outbound** ([`OutboundIntent`], [`OutboundFrame`]): what the
//!   client asks for and the exact frame that carries it.
//! - **Inbound** ([`InboundEvent`], [`EventKind`], [`decode_event`]):
//!   what the server pushes, decoded with a forward-compatible tag check.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how frames become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer is stateless. It sits between the transport (raw
//! frames) and the connection manager:
//!
//! ```text
//! Transport (bytes) ⇄ Protocol (frames/events) ⇄ Connection manager
//! ```

mod codec;
mod error;
mod event;
mod intent;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use event::{Decoded, EventKind, InboundEvent, decode_event};
pub use intent::{FrameContext, OutboundFrame, OutboundIntent};
pub use types::{ChannelId, MessageId, Username, timestamp_millis};
