//! Inbound direction: events pushed by the server.
//!
//! Decoding is two-step. First only the `type` tag is read; a tag this
//! client does not know yields [`Decoded::Unknown`] instead of an error so
//! newer servers can add event kinds without breaking older clients. Only
//! a known tag is decoded into a full [`InboundEvent`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ChannelId, Codec, MessageId, ProtocolError, Username};

/// An event received from the server.
///
/// Channel and timestamp are optional on the lighter events because the
/// server omits them when they are implied by the connection's routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundEvent {
    #[serde(rename = "message")]
    MessagePosted {
        id: MessageId,
        username: Username,
        content: String,
        channel: Option<ChannelId>,
        timestamp: Option<u64>,
        reply_to: Option<MessageId>,
    },
    #[serde(rename = "message_edited")]
    MessageEdited {
        id: MessageId,
        content: String,
        channel: Option<ChannelId>,
        timestamp: Option<u64>,
    },
    #[serde(rename = "message_deleted")]
    MessageDeleted {
        id: MessageId,
        channel: Option<ChannelId>,
        timestamp: Option<u64>,
    },
    #[serde(rename = "user_joined")]
    UserJoined {
        username: Username,
        channel: Option<ChannelId>,
        timestamp: Option<u64>,
    },
    #[serde(rename = "user_left")]
    UserLeft {
        username: Username,
        channel: Option<ChannelId>,
        timestamp: Option<u64>,
    },
    #[serde(rename = "user_list")]
    UserListSnapshot {
        users: Vec<Username>,
        channel: Option<ChannelId>,
    },
    #[serde(rename = "typing")]
    TypingStarted {
        username: Username,
        channel: Option<ChannelId>,
    },
    #[serde(rename = "stop_typing")]
    TypingStopped {
        username: Username,
        channel: Option<ChannelId>,
    },
    #[serde(rename = "friend_request")]
    FriendRequestReceived { sender_username: Username },
    #[serde(rename = "friend_request_accepted")]
    FriendRequestAccepted { accepter_username: Username },
}

impl InboundEvent {
    /// The tag this event was routed by.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessagePosted { .. } => EventKind::MessagePosted,
            Self::MessageEdited { .. } => EventKind::MessageEdited,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::UserJoined { .. } => EventKind::UserJoined,
            Self::UserLeft { .. } => EventKind::UserLeft,
            Self::UserListSnapshot { .. } => EventKind::UserListSnapshot,
            Self::TypingStarted { .. } => EventKind::TypingStarted,
            Self::TypingStopped { .. } => EventKind::TypingStopped,
            Self::FriendRequestReceived { .. } => {
                EventKind::FriendRequestReceived
            }
            Self::FriendRequestAccepted { .. } => {
                EventKind::FriendRequestAccepted
            }
        }
    }

    /// The conversation this event is scoped to, if the server said.
    pub fn channel(&self) -> Option<&ChannelId> {
        match self {
            Self::MessagePosted { channel, .. }
            | Self::MessageEdited { channel, .. }
            | Self::MessageDeleted { channel, .. }
            | Self::UserJoined { channel, .. }
            | Self::UserLeft { channel, .. }
            | Self::UserListSnapshot { channel, .. }
            | Self::TypingStarted { channel, .. }
            | Self::TypingStopped { channel, .. } => channel.as_ref(),
            Self::FriendRequestReceived { .. }
            | Self::FriendRequestAccepted { .. } => None,
        }
    }

    /// Server timestamp in milliseconds, where the event carries one.
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Self::MessagePosted { timestamp, .. }
            | Self::MessageEdited { timestamp, .. }
            | Self::MessageDeleted { timestamp, .. }
            | Self::UserJoined { timestamp, .. }
            | Self::UserLeft { timestamp, .. } => *timestamp,
            _ => None,
        }
    }
}

/// The tag of an [`InboundEvent`], used as the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MessagePosted,
    MessageEdited,
    MessageDeleted,
    UserJoined,
    UserLeft,
    UserListSnapshot,
    TypingStarted,
    TypingStopped,
    FriendRequestReceived,
    FriendRequestAccepted,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 10] = [
        Self::MessagePosted,
        Self::MessageEdited,
        Self::MessageDeleted,
        Self::UserJoined,
        Self::UserLeft,
        Self::UserListSnapshot,
        Self::TypingStarted,
        Self::TypingStopped,
        Self::FriendRequestReceived,
        Self::FriendRequestAccepted,
    ];

    /// The wire value of the `type` field.
    pub fn tag(self) -> &'static str {
        match self {
            Self::MessagePosted => "message",
            Self::MessageEdited => "message_edited",
            Self::MessageDeleted => "message_deleted",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::UserListSnapshot => "user_list",
            Self::TypingStarted => "typing",
            Self::TypingStopped => "stop_typing",
            Self::FriendRequestReceived => "friend_request",
            Self::FriendRequestAccepted => "friend_request_accepted",
        }
    }

    /// Looks up a kind by its wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A frame with a known tag.
    Event(InboundEvent),
    /// A well-formed frame whose tag this client does not handle.
    Unknown { tag: String },
}

#[derive(Deserialize)]
struct TagProbe {
    #[serde(rename = "type")]
    tag: Option<String>,
}

/// Decodes one inbound frame.
///
/// # Errors
/// `ProtocolError::Decode` for malformed bytes or a known tag with a bad
/// payload; `ProtocolError::InvalidMessage` when the `type` field is
/// missing.
pub fn decode_event<C: Codec>(
    codec: &C,
    data: &[u8],
) -> Result<Decoded, ProtocolError> {
    let probe: TagProbe = codec.decode(data)?;
    let Some(tag) = probe.tag else {
        return Err(ProtocolError::InvalidMessage(
            "frame has no type tag".into(),
        ));
    };
    if EventKind::from_tag(&tag).is_none() {
        return Ok(Decoded::Unknown { tag });
    }
    codec.decode(data).map(Decoded::Event)
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::JsonCodec;

    fn decode(json: &str) -> Result<Decoded, ProtocolError> {
        decode_event(&JsonCodec, json.as_bytes())
    }

    fn event(json: &str) -> InboundEvent {
        match decode(json).expect("should decode") {
            Decoded::Event(event) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_message_posted() {
        let ev = event(
            r#"{"type":"message","id":"m-1","username":"bob","content":"hi",
                "channel":"general","timestamp":42,"reply_to":"m-0"}"#,
        );
        assert_eq!(
            ev,
            InboundEvent::MessagePosted {
                id: MessageId::new("m-1"),
                username: Username::new("bob"),
                content: "hi".into(),
                channel: Some(ChannelId::new("general")),
                timestamp: Some(42),
                reply_to: Some(MessageId::new("m-0")),
            }
        );
        assert_eq!(ev.kind(), EventKind::MessagePosted);
        assert_eq!(ev.timestamp(), Some(42));
    }

    #[test]
    fn test_decode_user_list_snapshot() {
        let ev = event(r#"{"type":"user_list","users":["alice","bob"]}"#);
        assert_eq!(
            ev,
            InboundEvent::UserListSnapshot {
                users: vec![Username::new("alice"), Username::new("bob")],
                channel: None,
            }
        );
    }

    #[test]
    fn test_decode_typing_events_without_channel() {
        let ev = event(r#"{"type":"typing","username":"bob"}"#);
        assert_eq!(ev.kind(), EventKind::TypingStarted);
        assert_eq!(ev.channel(), None);

        let ev = event(r#"{"type":"stop_typing","username":"bob","channel":"general"}"#);
        assert_eq!(ev.kind(), EventKind::TypingStopped);
        assert_eq!(ev.channel(), Some(&ChannelId::new("general")));
    }

    #[test]
    fn test_decode_friend_request_events() {
        assert_eq!(
            event(r#"{"type":"friend_request","sender_username":"carol"}"#),
            InboundEvent::FriendRequestReceived {
                sender_username: Username::new("carol")
            }
        );
        assert_eq!(
            event(r#"{"type":"friend_request_accepted","accepter_username":"dave"}"#),
            InboundEvent::FriendRequestAccepted {
                accepter_username: Username::new("dave")
            }
        );
    }

    #[test]
    fn test_decode_edit_and_delete() {
        let ev = event(r#"{"type":"message_edited","id":"m-1","content":"new"}"#);
        assert_eq!(ev.kind(), EventKind::MessageEdited);
        let ev = event(r#"{"type":"message_deleted","id":"m-1","channel":"general"}"#);
        assert_eq!(ev.kind(), EventKind::MessageDeleted);
    }

    #[test]
    fn test_decode_unknown_tag_is_not_an_error() {
        let result = decode(r#"{"type":"reaction_added","emoji":"+1"}"#);
        assert_eq!(
            result.unwrap(),
            Decoded::Unknown {
                tag: "reaction_added".into()
            }
        );
    }

    #[test]
    fn test_decode_missing_tag_is_invalid_message() {
        let result = decode(r#"{"username":"bob"}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidMessage(_))));
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        assert!(matches!(
            decode("not json at all"),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_known_tag_with_bad_payload_returns_error() {
        // `message` requires id, username and content.
        assert!(matches!(
            decode(r#"{"type":"message","content":"hi"}"#),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_event_kind_tags_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(EventKind::from_tag("nope"), None);
    }
}
