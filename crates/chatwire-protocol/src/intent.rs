//! Outbound direction: what the client wants to do, and the frame that
//! carries it.
//!
//! An [`OutboundIntent`] is the application-level request ("send this
//! message", "I'm typing"). It knows nothing about who is sending or to
//! which channel; [`OutboundIntent::into_frame`] fills that in from a
//! [`FrameContext`] and produces the exact [`OutboundFrame`] the server
//! expects.

use serde::{Deserialize, Serialize};

use crate::{ChannelId, MessageId, Username};

/// A write the client wants to perform. Consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundIntent {
    /// Handshake: route this connection to `conversation`.
    Join { conversation: ChannelId },
    /// Post a chat message. `id` is generated locally so the caller can
    /// match the server's echo.
    Send {
        id: MessageId,
        body: String,
        reply_to: Option<MessageId>,
    },
    /// The local user started typing.
    Typing,
    /// The local user stopped typing.
    StopTyping,
    /// Move this connection's routing to another conversation.
    SwitchConversation { new_id: ChannelId },
    /// Replace the body of an existing message.
    EditMessage { id: MessageId, body: String },
    /// Delete an existing message.
    DeleteMessage { id: MessageId },
}

impl OutboundIntent {
    /// Builds a `Send` intent with a fresh message id.
    pub fn send(body: impl Into<String>, reply_to: Option<MessageId>) -> Self {
        Self::Send {
            id: MessageId::generate(),
            body: body.into(),
            reply_to,
        }
    }

    /// Only user content is rate limited; everything else is control
    /// traffic and goes straight out.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Send { .. })
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Send { .. } => "send",
            Self::Typing => "typing",
            Self::StopTyping => "stop_typing",
            Self::SwitchConversation { .. } => "switch_conversation",
            Self::EditMessage { .. } => "edit_message",
            Self::DeleteMessage { .. } => "delete_message",
        }
    }

    /// Turns the intent into its wire frame.
    pub fn into_frame(self, ctx: &FrameContext) -> OutboundFrame {
        match self {
            Self::Join { conversation } => OutboundFrame::Join {
                username: ctx.username.clone(),
                channel: conversation,
                timestamp: ctx.timestamp,
            },
            Self::Send { id, body, reply_to } => OutboundFrame::Message {
                username: ctx.username.clone(),
                content: body,
                channel: ctx.channel.clone(),
                timestamp: ctx.timestamp,
                id,
                reply_to,
            },
            Self::Typing => OutboundFrame::Typing {
                username: ctx.username.clone(),
                channel: ctx.channel.clone(),
            },
            Self::StopTyping => OutboundFrame::StopTyping {
                username: ctx.username.clone(),
                channel: ctx.channel.clone(),
            },
            Self::SwitchConversation { new_id } => OutboundFrame::SwitchChannel {
                username: ctx.username.clone(),
                channel: new_id,
            },
            Self::EditMessage { id, body } => OutboundFrame::EditMessage {
                id,
                content: body,
                channel: ctx.channel.clone(),
            },
            Self::DeleteMessage { id } => OutboundFrame::DeleteMessage {
                id,
                channel: ctx.channel.clone(),
            },
        }
    }
}

/// Who is sending, where, and when. Supplied by the connection manager.
#[derive(Debug, Clone)]
pub struct FrameContext {
    pub username: Username,
    pub channel: ChannelId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// A frame as it travels from client to server.
///
/// `#[serde(tag = "type", rename_all = "snake_case")]` produces the
/// internally tagged shape the server reads, e.g.
/// `{"type":"stop_typing","username":"alice","channel":"general"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    Join {
        username: Username,
        channel: ChannelId,
        timestamp: u64,
    },
    Message {
        username: Username,
        content: String,
        channel: ChannelId,
        timestamp: u64,
        id: MessageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reply_to: Option<MessageId>,
    },
    Typing {
        username: Username,
        channel: ChannelId,
    },
    StopTyping {
        username: Username,
        channel: ChannelId,
    },
    SwitchChannel {
        username: Username,
        channel: ChannelId,
    },
    EditMessage {
        id: MessageId,
        content: String,
        channel: ChannelId,
    },
    DeleteMessage {
        id: MessageId,
        channel: ChannelId,
    },
}
