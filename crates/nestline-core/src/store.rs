//! Ordered, deduplicated message collection for one conversation.
//!
//! The store holds every message for the lifetime of a conversation view
//! and exposes pure mutation operations. It is single-writer by design:
//! the session coordinator applies all mutations from one sequential
//! context, so no locking happens here.
//!
//! Ordering invariant: messages are sorted by `created_at`, ties broken by
//! arrival order into the store (all sorts are stable). Acknowledged ids
//! are unique; operations that could introduce a duplicate replace the
//! existing record instead, because server data is authoritative.

use chrono::TimeDelta;

use crate::message::{ConversationId, Message, SendState};

/// In-memory message collection for a single conversation.
#[derive(Debug, Clone)]
pub struct MessageStore {
    conversation_id: ConversationId,
    messages: Vec<Message>,
}

impl MessageStore {
    /// Create an empty store for a conversation.
    pub fn new(conversation_id: ConversationId) -> Self {
        Self { conversation_id, messages: Vec::new() }
    }

    /// Conversation this store belongs to.
    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the store holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Look up an acknowledged message by server id.
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id.as_deref() == Some(id))
    }

    /// Insert or replace a message.
    ///
    /// If an acknowledged message with the same id exists it is replaced
    /// entirely; otherwise the message is appended. Either way the store
    /// is re-sorted by `created_at` (stable, so equal timestamps keep
    /// their arrival order).
    pub fn upsert(&mut self, message: Message) {
        let existing = message
            .id
            .as_deref()
            .and_then(|id| self.position_by_id(id));

        match existing {
            Some(idx) => self.messages[idx] = message,
            None => self.messages.push(message),
        }
        self.sort();
    }

    /// Replace an optimistic placeholder with the confirmed server record.
    ///
    /// The placeholder is matched by its correlation key, not by server
    /// id. If the server record's id already exists elsewhere (the inbound
    /// echo won the race), the placeholder is dropped and the existing
    /// record replaced, so acknowledged ids stay unique.
    ///
    /// Returns `false` if no placeholder with that key exists (already
    /// reconciled, or never created); the caller should `upsert` instead.
    pub fn reconcile_optimistic(&mut self, local_key: u64, server: Message) -> bool {
        let Some(idx) = self.position_by_key(local_key) else {
            return false;
        };

        let duplicate = server
            .id
            .as_deref()
            .and_then(|id| self.position_by_id(id))
            .filter(|&other| other != idx);

        if let Some(other) = duplicate {
            self.messages.remove(idx);
            let other = if other > idx { other - 1 } else { other };
            self.messages[other] = server;
        } else {
            self.messages[idx] = server;
        }
        self.sort();
        true
    }

    /// Apply a partial update to the message with the given server id.
    ///
    /// Returns `false` (and applies nothing) if the message is absent.
    /// An update may arrive before the message itself in pathological
    /// races, and such patches are dropped by the caller.
    pub fn patch<F>(&mut self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut Message),
    {
        let Some(idx) = self.position_by_id(id) else {
            return false;
        };
        mutate(&mut self.messages[idx]);
        self.sort();
        true
    }

    /// Toggle a (symbol, reactor) pair on the message with the given id.
    ///
    /// Silent no-op if the message does not exist yet.
    pub fn toggle_reaction(&mut self, id: &str, symbol: &str, reactor: &str) -> bool {
        self.patch(id, |m| m.toggle_reaction(symbol, reactor))
    }

    /// Mark an optimistic placeholder as terminally failed.
    ///
    /// The placeholder stays in the store so the failure is visible to
    /// the sender. Returns `false` if no placeholder with that key exists.
    pub fn fail_optimistic(&mut self, local_key: u64, reason: String) -> bool {
        let Some(idx) = self.position_by_key(local_key) else {
            return false;
        };
        self.messages[idx].send_state = SendState::Failed { reason };
        true
    }

    /// Find a pending placeholder matching an inbound server record.
    ///
    /// Correlation key for echoes of our own sends: same sender, same
    /// content and attachments, created within `window` of each other.
    /// Returns the placeholder's local key.
    pub fn match_optimistic(&self, candidate: &Message, window: TimeDelta) -> Option<u64> {
        self.messages
            .iter()
            .filter(|m| m.send_state == SendState::Pending)
            .filter(|m| m.sender_id == candidate.sender_id)
            .filter(|m| m.content == candidate.content)
            .filter(|m| m.attachments == candidate.attachments)
            .find(|m| (m.created_at - candidate.created_at).abs() <= window)
            .and_then(|m| m.local_key)
    }

    fn position_by_id(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id.as_deref() == Some(id))
    }

    fn position_by_key(&self, local_key: u64) -> Option<usize> {
        self.messages.iter().position(|m| m.local_key == Some(local_key))
    }

    fn sort(&mut self) {
        self.messages.sort_by_key(|m| m.created_at);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{DateTime, Utc};

    use super::*;
    use crate::message::DeliveryStatus;

    fn epoch() -> DateTime<Utc> {
        DateTime::UNIX_EPOCH
    }

    fn server_message(id: &str, offset_secs: i64) -> Message {
        Message {
            id: Some(id.to_string()),
            local_key: None,
            conversation_id: "c1".into(),
            sender_id: "u1".into(),
            receiver_id: "u2".into(),
            content: Some(format!("message {id}")),
            attachments: Vec::new(),
            status: DeliveryStatus::Sent,
            deleted: false,
            reactions: crate::message::ReactionMap::new(),
            created_at: epoch() + TimeDelta::seconds(offset_secs),
            updated_at: epoch() + TimeDelta::seconds(offset_secs),
            send_state: SendState::Confirmed,
        }
    }

    #[test]
    fn upsert_keeps_created_at_order() {
        let mut store = MessageStore::new("c1".into());
        store.upsert(server_message("m2", 20));
        store.upsert(server_message("m1", 10));
        store.upsert(server_message("m3", 30));

        let ids: Vec<_> = store.messages().iter().map(|m| m.id.clone().unwrap()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
    }

    #[test]
    fn upsert_same_id_replaces() {
        let mut store = MessageStore::new("c1".into());
        store.upsert(server_message("m1", 10));

        let mut edited = server_message("m1", 10);
        edited.content = Some("edited".into());
        store.upsert(edited);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("m1").unwrap().content.as_deref(), Some("edited"));
    }

    #[test]
    fn upsert_identical_message_is_idempotent() {
        let mut store = MessageStore::new("c1".into());
        store.upsert(server_message("m1", 10));
        let snapshot = store.messages().to_vec();

        store.upsert(server_message("m1", 10));
        assert_eq!(store.messages(), snapshot.as_slice());
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let mut store = MessageStore::new("c1".into());
        store.upsert(server_message("m1", 10));
        store.upsert(server_message("m2", 10));
        store.upsert(server_message("m3", 10));

        let ids: Vec<_> = store.messages().iter().map(|m| m.id.clone().unwrap()).collect();
        assert_eq!(ids, ["m1", "m2", "m3"]);
    }

    #[test]
    fn reconcile_replaces_placeholder() {
        let mut store = MessageStore::new("c1".into());
        let placeholder = Message::optimistic(
            7,
            "c1".into(),
            "u1".into(),
            "u2".into(),
            Some("hello".into()),
            Vec::new(),
            epoch() + TimeDelta::seconds(10),
        );
        store.upsert(placeholder);

        let mut confirmed = server_message("m42", 10);
        confirmed.content = Some("hello".into());
        assert!(store.reconcile_optimistic(7, confirmed));

        assert_eq!(store.len(), 1);
        let msg = store.get("m42").unwrap();
        assert_eq!(msg.conversation_id, "c1");
        assert_eq!(msg.send_state, SendState::Confirmed);
    }

    #[test]
    fn reconcile_unknown_key_is_rejected() {
        let mut store = MessageStore::new("c1".into());
        assert!(!store.reconcile_optimistic(99, server_message("m1", 10)));
        assert!(store.is_empty());
    }

    #[test]
    fn reconcile_deduplicates_against_echoed_record() {
        let mut store = MessageStore::new("c1".into());
        let placeholder = Message::optimistic(
            7,
            "c1".into(),
            "u1".into(),
            "u2".into(),
            Some("hello".into()),
            Vec::new(),
            epoch() + TimeDelta::seconds(10),
        );
        store.upsert(placeholder);

        // Inbound echo got applied as a fresh record first
        store.upsert(server_message("m42", 11));
        assert_eq!(store.len(), 2);

        // Late request-path resolution must not produce a second m42
        assert!(store.reconcile_optimistic(7, server_message("m42", 11)));
        assert_eq!(store.len(), 1);
        assert!(store.get("m42").is_some());
    }

    #[test]
    fn patch_unknown_id_is_noop() {
        let mut store = MessageStore::new("c1".into());
        assert!(!store.patch("m1", |m| m.deleted = true));
    }

    #[test]
    fn toggle_reaction_twice_restores_original() {
        let mut store = MessageStore::new("c1".into());
        store.upsert(server_message("m1", 10));

        assert!(store.toggle_reaction("m1", "👍", "u1"));
        assert!(store.get("m1").unwrap().reactions["👍"].contains("u1"));

        assert!(store.toggle_reaction("m1", "👍", "u1"));
        assert!(store.get("m1").unwrap().reactions.is_empty());
    }

    #[test]
    fn toggle_reaction_on_unknown_message_is_noop() {
        let mut store = MessageStore::new("c1".into());
        assert!(!store.toggle_reaction("m1", "👍", "u1"));
    }

    #[test]
    fn fail_optimistic_marks_placeholder_terminal() {
        let mut store = MessageStore::new("c1".into());
        let placeholder = Message::optimistic(
            3,
            "c1".into(),
            "u1".into(),
            "u2".into(),
            Some("hello".into()),
            Vec::new(),
            epoch(),
        );
        store.upsert(placeholder);

        assert!(store.fail_optimistic(3, "timeout".into()));
        let msg = &store.messages()[0];
        assert_eq!(msg.send_state, SendState::Failed { reason: "timeout".into() });
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn match_optimistic_respects_window() {
        let mut store = MessageStore::new("c1".into());
        let placeholder = Message::optimistic(
            5,
            "c1".into(),
            "u1".into(),
            "u2".into(),
            Some("hello".into()),
            Vec::new(),
            epoch() + TimeDelta::seconds(100),
        );
        store.upsert(placeholder);

        let mut near = server_message("m42", 105);
        near.content = Some("hello".into());
        assert_eq!(store.match_optimistic(&near, TimeDelta::seconds(10)), Some(5));

        let mut far = server_message("m43", 200);
        far.content = Some("hello".into());
        assert_eq!(store.match_optimistic(&far, TimeDelta::seconds(10)), None);

        let mut other_sender = near.clone();
        other_sender.sender_id = "u9".into();
        assert_eq!(store.match_optimistic(&other_sender, TimeDelta::seconds(10)), None);
    }
}
