//! Typed inbound conversation events.
//!
//! The transport delivers `(name, payload)` pairs. Instead of registering
//! per-name callbacks on the connection object, every named event decodes
//! into one [`ChatEvent`] variant and flows through a single channel that
//! the session coordinator consumes sequentially. This gives one point of
//! serialization for all real-time updates.
//!
//! Full-record events (`new_message`, `message_sent`, `message_updated`)
//! carry an entire [`Message`]; the rest are deltas that patch an existing
//! record.

use serde::{Deserialize, Serialize};

use crate::error::EventError;
use crate::message::{ConversationId, DeliveryStatus, Message, MessageId, ReactionMap};

/// Delta payload for `message_deleted`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDeleted {
    /// Conversation the deleted message belongs to.
    pub conversation_id: ConversationId,
    /// Server id of the deleted message.
    pub message_id: MessageId,
}

/// Delta payload for `message_status_changed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStatusChanged {
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Server id of the affected message.
    pub message_id: MessageId,
    /// Status reported by the server.
    pub status: DeliveryStatus,
}

/// Delta payload for `reaction_updated`.
///
/// Carries the complete reaction map, not a diff: the coordinator replaces
/// the message's reactions wholesale, which is what makes optimistic local
/// toggles safe against their own server echo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionUpdated {
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Server id of the affected message.
    pub message_id: MessageId,
    /// Authoritative reaction state.
    pub reactions: ReactionMap,
}

/// One inbound real-time event, decoded from its wire name and payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A message from the other participant.
    NewMessage(Message),
    /// Server acknowledgement of a sent message (including echoes of our
    /// own transport-path sends).
    MessageSent(Message),
    /// Full record of an edited message.
    MessageUpdated(Message),
    /// A message was deleted.
    MessageDeleted(MessageDeleted),
    /// Delivery status changed.
    StatusChanged(MessageStatusChanged),
    /// Reaction state changed.
    ReactionUpdated(ReactionUpdated),
}

impl ChatEvent {
    /// Wire name for [`ChatEvent::NewMessage`].
    pub const NEW_MESSAGE: &'static str = "new_message";
    /// Wire name for [`ChatEvent::MessageSent`].
    pub const MESSAGE_SENT: &'static str = "message_sent";
    /// Wire name for [`ChatEvent::MessageUpdated`].
    pub const MESSAGE_UPDATED: &'static str = "message_updated";
    /// Wire name for [`ChatEvent::MessageDeleted`].
    pub const MESSAGE_DELETED: &'static str = "message_deleted";
    /// Wire name for [`ChatEvent::StatusChanged`].
    pub const MESSAGE_STATUS_CHANGED: &'static str = "message_status_changed";
    /// Wire name for [`ChatEvent::ReactionUpdated`].
    pub const REACTION_UPDATED: &'static str = "reaction_updated";

    /// Decode a named transport event.
    ///
    /// # Errors
    ///
    /// [`EventError::UnknownEvent`] for names outside the protocol,
    /// [`EventError::MalformedPayload`] when the payload does not match
    /// the event's schema. Neither corrupts any state; the caller drops
    /// the event.
    pub fn decode(name: &str, payload: serde_json::Value) -> Result<Self, EventError> {
        match name {
            Self::NEW_MESSAGE => decode_as(Self::NEW_MESSAGE, payload).map(Self::NewMessage),
            Self::MESSAGE_SENT => decode_as(Self::MESSAGE_SENT, payload).map(Self::MessageSent),
            Self::MESSAGE_UPDATED => {
                decode_as(Self::MESSAGE_UPDATED, payload).map(Self::MessageUpdated)
            },
            Self::MESSAGE_DELETED => {
                decode_as(Self::MESSAGE_DELETED, payload).map(Self::MessageDeleted)
            },
            Self::MESSAGE_STATUS_CHANGED => {
                decode_as(Self::MESSAGE_STATUS_CHANGED, payload).map(Self::StatusChanged)
            },
            Self::REACTION_UPDATED => {
                decode_as(Self::REACTION_UPDATED, payload).map(Self::ReactionUpdated)
            },
            other => Err(EventError::UnknownEvent { name: other.to_string() }),
        }
    }

    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewMessage(_) => Self::NEW_MESSAGE,
            Self::MessageSent(_) => Self::MESSAGE_SENT,
            Self::MessageUpdated(_) => Self::MESSAGE_UPDATED,
            Self::MessageDeleted(_) => Self::MESSAGE_DELETED,
            Self::StatusChanged(_) => Self::MESSAGE_STATUS_CHANGED,
            Self::ReactionUpdated(_) => Self::REACTION_UPDATED,
        }
    }

    /// Conversation this event targets.
    ///
    /// Used by the coordinator to drop events for conversations other
    /// than the open session.
    pub fn conversation_id(&self) -> &str {
        match self {
            Self::NewMessage(m) | Self::MessageSent(m) | Self::MessageUpdated(m) => {
                &m.conversation_id
            },
            Self::MessageDeleted(p) => &p.conversation_id,
            Self::StatusChanged(p) => &p.conversation_id,
            Self::ReactionUpdated(p) => &p.conversation_id,
        }
    }
}

fn decode_as<T: serde::de::DeserializeOwned>(
    name: &'static str,
    payload: serde_json::Value,
) -> Result<T, EventError> {
    serde_json::from_value(payload)
        .map_err(|e| EventError::MalformedPayload { name, reason: e.to_string() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_new_message() {
        let payload = json!({
            "id": "m1",
            "conversation_id": "c1",
            "sender_id": "u1",
            "receiver_id": "u2",
            "content": "hello",
            "status": "sent",
            "created_at": "2024-03-01T10:00:00Z",
            "updated_at": "2024-03-01T10:00:00Z",
        });

        let event = ChatEvent::decode(ChatEvent::NEW_MESSAGE, payload).unwrap();
        match event {
            ChatEvent::NewMessage(m) => {
                assert_eq!(m.id.as_deref(), Some("m1"));
                assert_eq!(m.conversation_id, "c1");
                assert!(m.attachments.is_empty());
            },
            other => panic!("expected NewMessage, got {other:?}"),
        }
    }

    #[test]
    fn decodes_status_delta() {
        let payload = json!({
            "conversation_id": "c1",
            "message_id": "m1",
            "status": "read",
        });

        let event = ChatEvent::decode(ChatEvent::MESSAGE_STATUS_CHANGED, payload).unwrap();
        assert_eq!(event.conversation_id(), "c1");
        assert!(matches!(
            event,
            ChatEvent::StatusChanged(MessageStatusChanged {
                status: crate::message::DeliveryStatus::Read,
                ..
            })
        ));
    }

    #[test]
    fn decodes_reaction_replacement() {
        let payload = json!({
            "conversation_id": "c1",
            "message_id": "m1",
            "reactions": { "❤️": ["u1"] },
        });

        let event = ChatEvent::decode(ChatEvent::REACTION_UPDATED, payload).unwrap();
        match event {
            ChatEvent::ReactionUpdated(p) => assert!(p.reactions["❤️"].contains("u1")),
            other => panic!("expected ReactionUpdated, got {other:?}"),
        }
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let err = ChatEvent::decode("typing_indicator", json!({})).unwrap_err();
        assert!(matches!(err, EventError::UnknownEvent { name } if name == "typing_indicator"));
    }

    #[test]
    fn malformed_payload_is_rejected() {
        let err = ChatEvent::decode(ChatEvent::NEW_MESSAGE, json!({"id": 42})).unwrap_err();
        assert!(matches!(err, EventError::MalformedPayload { name, .. }
            if name == ChatEvent::NEW_MESSAGE));
    }

    #[test]
    fn event_name_roundtrips() {
        let payload = json!({
            "conversation_id": "c1",
            "message_id": "m1",
        });
        let event = ChatEvent::decode(ChatEvent::MESSAGE_DELETED, payload).unwrap();
        assert_eq!(event.name(), ChatEvent::MESSAGE_DELETED);
    }
}
