//! Chat message records.
//!
//! A [`Message`] is created either as a local optimistic placeholder when
//! the user hits send, or directly from a server payload (inbound event or
//! history fetch). Server-visible fields carry serde derives; local-only
//! bookkeeping (`local_key`, `send_state`) is skipped during
//! (de)serialization so server payloads can never set it.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-assigned message identifier.
pub type MessageId = String;

/// Identifier grouping messages into one conversation.
pub type ConversationId = String;

/// Participant identifier.
pub type UserId = String;

/// Reaction symbol mapped to the set of users who placed it.
///
/// A (symbol, reactor) pair is either present or absent; there are no
/// duplicate increments. Symbols with no remaining reactors are removed
/// from the map entirely.
pub type ReactionMap = BTreeMap<String, BTreeSet<UserId>>;

/// Placeholder content substituted once a message is deleted.
///
/// Deleted messages are retained for ordering and history; only their
/// content is replaced.
pub const TOMBSTONE: &str = "message deleted";

/// Server-side delivery status of a message.
///
/// The derived ordering is the escalation order: a message never moves
/// backwards through it, regardless of event arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Accepted from the sender.
    Sent,
    /// Delivered to the recipient's device.
    Delivered,
    /// Read by the recipient.
    Read,
}

/// Local send lifecycle of a message.
///
/// Only optimistic placeholders ever leave `Confirmed`. A `Failed`
/// placeholder is terminal: it stays visible so the sender can see the
/// failure and retry, rather than silently disappearing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SendState {
    /// Acknowledged by the server (or server-originated in the first place).
    #[default]
    Confirmed,
    /// Sent optimistically, awaiting server acknowledgement.
    Pending,
    /// Delivery attempt failed.
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
}

/// Opaque reference to an uploaded media object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Location of the media object.
    pub url: String,
}

/// One chat message within a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id. `None` for optimistic placeholders that have
    /// not been acknowledged yet.
    #[serde(default)]
    pub id: Option<MessageId>,

    /// Correlation key for optimistic placeholders, assigned by the
    /// session. Never leaves this process.
    #[serde(skip)]
    pub local_key: Option<u64>,

    /// Conversation this message belongs to.
    pub conversation_id: ConversationId,

    /// Author of the message.
    pub sender_id: UserId,

    /// Recipient of the message.
    pub receiver_id: UserId,

    /// Message text. May be absent for attachment-only messages.
    #[serde(default)]
    pub content: Option<String>,

    /// Attached media, independent of `content`.
    #[serde(default)]
    pub attachments: Vec<Attachment>,

    /// Delivery status, monotonically non-decreasing.
    pub status: DeliveryStatus,

    /// Whether the message has been deleted (tombstoned).
    #[serde(default)]
    pub deleted: bool,

    /// Reactions placed on this message.
    #[serde(default)]
    pub reactions: ReactionMap,

    /// Creation timestamp; the ordering key within a conversation.
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,

    /// Local send lifecycle; `Confirmed` for anything server-originated.
    #[serde(skip)]
    pub send_state: SendState,
}

impl Message {
    /// Build an optimistic placeholder for a user-initiated send.
    ///
    /// The placeholder has no server id and is correlated with the later
    /// server record through `local_key`.
    pub fn optimistic(
        local_key: u64,
        conversation_id: ConversationId,
        sender_id: UserId,
        receiver_id: UserId,
        content: Option<String>,
        attachments: Vec<Attachment>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            local_key: Some(local_key),
            conversation_id,
            sender_id,
            receiver_id,
            content,
            attachments,
            status: DeliveryStatus::Sent,
            deleted: false,
            reactions: ReactionMap::new(),
            created_at: now,
            updated_at: now,
            send_state: SendState::Pending,
        }
    }

    /// Whether the server has acknowledged this message.
    pub fn is_acknowledged(&self) -> bool {
        self.id.is_some()
    }

    /// Raise the delivery status, ignoring regressions.
    ///
    /// Returns `true` when the status actually changed. Event delivery
    /// order across the transport and request paths is not guaranteed, so
    /// a stale `delivered` after `read` must not move the message back.
    pub fn escalate_status(&mut self, status: DeliveryStatus, now: DateTime<Utc>) -> bool {
        if status <= self.status {
            return false;
        }
        self.status = status;
        self.updated_at = now;
        true
    }

    /// Tombstone this message: flag it deleted and replace the content.
    ///
    /// Returns `true` on the first call; a tombstoned message is immutable
    /// afterwards and repeated deletions are no-ops.
    pub fn mark_deleted(&mut self, now: DateTime<Utc>) -> bool {
        if self.deleted {
            return false;
        }
        self.deleted = true;
        self.content = Some(TOMBSTONE.to_string());
        self.updated_at = now;
        true
    }

    /// Toggle a (symbol, reactor) reaction pair.
    ///
    /// Adds the reactor if absent, removes it if present. Symbols left
    /// without reactors are dropped from the map.
    pub fn toggle_reaction(&mut self, symbol: &str, reactor: &str) {
        if let Some(reactors) = self.reactions.get_mut(symbol) {
            if !reactors.remove(reactor) {
                reactors.insert(reactor.to_string());
            }
            if reactors.is_empty() {
                self.reactions.remove(symbol);
            }
        } else {
            self.reactions
                .entry(symbol.to_string())
                .or_default()
                .insert(reactor.to_string());
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn message(now: DateTime<Utc>) -> Message {
        Message::optimistic(
            1,
            "c1".into(),
            "u1".into(),
            "u2".into(),
            Some("hello".into()),
            Vec::new(),
            now,
        )
    }

    #[test]
    fn status_ordering_matches_escalation() {
        assert!(DeliveryStatus::Sent < DeliveryStatus::Delivered);
        assert!(DeliveryStatus::Delivered < DeliveryStatus::Read);
    }

    #[test]
    fn escalate_ignores_regressions() {
        let now = DateTime::UNIX_EPOCH;
        let mut msg = message(now);

        assert!(msg.escalate_status(DeliveryStatus::Read, now));
        assert!(!msg.escalate_status(DeliveryStatus::Delivered, now));
        assert_eq!(msg.status, DeliveryStatus::Read);
    }

    #[test]
    fn escalate_is_idempotent() {
        let now = DateTime::UNIX_EPOCH;
        let mut msg = message(now);

        assert!(msg.escalate_status(DeliveryStatus::Delivered, now));
        assert!(!msg.escalate_status(DeliveryStatus::Delivered, now));
    }

    #[test]
    fn mark_deleted_tombstones_content() {
        let now = DateTime::UNIX_EPOCH;
        let mut msg = message(now);
        let later = now + TimeDelta::seconds(5);

        assert!(msg.mark_deleted(later));
        assert!(msg.deleted);
        assert_eq!(msg.content.as_deref(), Some(TOMBSTONE));
        assert_eq!(msg.updated_at, later);

        // Second deletion is a no-op
        assert!(!msg.mark_deleted(later + TimeDelta::seconds(1)));
        assert_eq!(msg.updated_at, later);
    }

    #[test]
    fn toggle_reaction_roundtrip() {
        let now = DateTime::UNIX_EPOCH;
        let mut msg = message(now);

        msg.toggle_reaction("👍", "u2");
        assert!(msg.reactions["👍"].contains("u2"));

        msg.toggle_reaction("👍", "u2");
        assert!(!msg.reactions.contains_key("👍"));
    }

    #[test]
    fn toggle_reaction_keeps_other_reactors() {
        let now = DateTime::UNIX_EPOCH;
        let mut msg = message(now);

        msg.toggle_reaction("❤️", "u1");
        msg.toggle_reaction("❤️", "u2");
        msg.toggle_reaction("❤️", "u1");

        let reactors = &msg.reactions["❤️"];
        assert_eq!(reactors.len(), 1);
        assert!(reactors.contains("u2"));
    }

    #[test]
    fn local_fields_survive_serde_roundtrip_as_defaults() {
        let now = DateTime::UNIX_EPOCH;
        let mut msg = message(now);
        msg.id = Some("m1".into());

        let json = serde_json::to_string(&msg).unwrap();
        let decoded: Message = serde_json::from_str(&json).unwrap();

        // Local bookkeeping never crosses a serialization boundary
        assert_eq!(decoded.local_key, None);
        assert_eq!(decoded.send_state, SendState::Confirmed);
        assert_eq!(decoded.id.as_deref(), Some("m1"));
    }
}
