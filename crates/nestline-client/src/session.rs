//! Conversation session state machine.
//!
//! The `Session` reconciles three concurrent update sources (the
//! real-time event stream, the pull-based history fetch, and user
//! intents with their optimistic local effects) into one consistent
//! ordered message store.
//!
//! It is sans-IO: `handle` consumes a [`SessionEvent`], mutates the
//! store, and returns [`SessionAction`]s for the runtime to execute.
//! Correctness does not depend on cross-source delivery order; every
//! applied operation is idempotent or commutative per message id
//! (replace-by-id upserts, monotonic status escalation, wholesale
//! reaction replacement).

use chrono::TimeDelta;
use nestline_core::{
    Attachment, ChatEvent, Clock, ConversationId, DeliveryStatus, Message, MessageStore, UserId,
    event::{MessageDeleted, MessageStatusChanged, ReactionUpdated},
};

use crate::{
    error::SessionError,
    event::{OutboundMessage, ReactionIntent, SessionAction, SessionEvent},
};

/// Window for correlating an inbound echo with a pending placeholder.
///
/// An echo of our own send carries the server's timestamp, which may
/// differ from the placeholder's local one by clock skew plus delivery
/// latency.
const ECHO_WINDOW_SECS: i64 = 10;

/// Transport lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport subscription active.
    Disconnected,
    /// Subscription requested, awaiting confirmation.
    Connecting,
    /// Transport active; events are being applied.
    Connected,
    /// Subscription released, user intents rejected. Terminal.
    Closed,
}

/// History fetch lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryState {
    NotLoaded,
    Loading,
    Loaded,
    Failed,
}

/// Coordinator for one open conversation.
pub struct Session<C: Clock> {
    clock: C,
    self_id: UserId,
    peer_id: UserId,
    state: SessionState,
    store: MessageStore,
    history: HistoryState,
    error: Option<String>,
    next_local_key: u64,
}

impl<C: Clock> Session<C> {
    /// Create a session for a conversation between `self_id` and
    /// `peer_id`. No I/O happens until [`SessionEvent::Open`] is handled.
    pub fn new(
        clock: C,
        conversation_id: ConversationId,
        self_id: UserId,
        peer_id: UserId,
    ) -> Self {
        Self {
            clock,
            self_id,
            peer_id,
            state: SessionState::Disconnected,
            store: MessageStore::new(conversation_id),
            history: HistoryState::NotLoaded,
            error: None,
            next_local_key: 0,
        }
    }

    /// Conversation this session is bound to.
    pub fn conversation_id(&self) -> &str {
        self.store.conversation_id()
    }

    /// Current transport lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Messages in display order.
    pub fn messages(&self) -> &[Message] {
        self.store.messages()
    }

    /// Whether the initial history load is still in flight.
    pub fn is_loading(&self) -> bool {
        self.history == HistoryState::Loading
    }

    /// Session-level error flag (transport drop or history failure).
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and return resulting actions.
    ///
    /// # Errors
    ///
    /// User intents on a closed session return
    /// [`SessionError::Closed`]; a send carrying neither text nor
    /// attachments returns [`SessionError::EmptyMessage`]. Async
    /// completions never error; late or irrelevant ones are discarded.
    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<SessionAction>, SessionError> {
        if self.state == SessionState::Closed {
            return self.handle_after_close(&event);
        }

        match event {
            SessionEvent::Open => Ok(self.handle_open()),
            SessionEvent::TransportConnected => Ok(self.handle_transport_connected()),
            SessionEvent::TransportDisconnected { reason } => {
                Ok(self.handle_transport_disconnected(reason))
            },
            SessionEvent::EventReceived(chat_event) => Ok(self.handle_chat_event(chat_event)),
            SessionEvent::HistoryLoaded(messages) => Ok(self.handle_history_loaded(messages)),
            SessionEvent::HistoryFailed { reason } => Ok(self.handle_history_failed(reason)),
            SessionEvent::RetryHistory => Ok(self.handle_retry_history()),
            SessionEvent::Send { content, attachments } => self.handle_send(content, attachments),
            SessionEvent::SendResolved { local_key, message } => {
                Ok(self.handle_send_resolved(local_key, message))
            },
            SessionEvent::SendFailed { local_key, reason } => {
                Ok(self.handle_send_failed(local_key, reason))
            },
            SessionEvent::ToggleReaction { message_id, symbol } => {
                Ok(self.handle_toggle_reaction(&message_id, symbol))
            },
            SessionEvent::MarkRead { message_id } => Ok(self.handle_mark_read(message_id)),
            SessionEvent::ReadConfirmed { message } => Ok(self.handle_read_confirmed(message)),
            SessionEvent::Close => Ok(self.handle_close()),
        }
    }

    /// Closed is terminal: user intents are rejected loudly, while async
    /// completions that raced the teardown are discarded so nothing can
    /// mutate a torn-down store.
    fn handle_after_close(
        &self,
        event: &SessionEvent,
    ) -> Result<Vec<SessionAction>, SessionError> {
        match event {
            SessionEvent::Open
            | SessionEvent::Send { .. }
            | SessionEvent::ToggleReaction { .. }
            | SessionEvent::MarkRead { .. }
            | SessionEvent::RetryHistory => Err(SessionError::Closed {
                conversation_id: self.conversation_id().to_string(),
            }),
            _ => {
                tracing::debug!(
                    conversation = self.conversation_id(),
                    "discarding completion after close"
                );
                Ok(Vec::new())
            },
        }
    }

    fn handle_open(&mut self) -> Vec<SessionAction> {
        // Re-subscription while Connecting/Connected is a no-op.
        if self.state != SessionState::Disconnected {
            return Vec::new();
        }

        self.state = SessionState::Connecting;
        let conversation_id = self.conversation_id().to_string();
        let mut actions = vec![SessionAction::Subscribe { conversation_id: conversation_id.clone() }];

        // History must not wait on the socket.
        if self.history != HistoryState::Loaded {
            self.history = HistoryState::Loading;
            actions.push(SessionAction::FetchHistory { conversation_id });
        }

        actions.push(SessionAction::StoreChanged);
        actions
    }

    fn handle_transport_connected(&mut self) -> Vec<SessionAction> {
        self.state = SessionState::Connected;
        self.error = None;
        vec![SessionAction::StoreChanged]
    }

    /// A transport drop degrades the session to an offline view: the
    /// store and its messages are retained, only the error flag is set.
    fn handle_transport_disconnected(&mut self, reason: String) -> Vec<SessionAction> {
        self.state = SessionState::Disconnected;
        self.error = Some(reason);
        vec![SessionAction::StoreChanged]
    }

    fn handle_history_loaded(&mut self, messages: Vec<Message>) -> Vec<SessionAction> {
        self.history = HistoryState::Loaded;
        self.error = None;
        for message in messages {
            if message.conversation_id == self.conversation_id() {
                self.apply_full_record(message);
            }
        }
        vec![SessionAction::StoreChanged]
    }

    fn handle_history_failed(&mut self, reason: String) -> Vec<SessionAction> {
        self.history = HistoryState::Failed;
        self.error = Some(reason);
        vec![SessionAction::StoreChanged]
    }

    fn handle_retry_history(&mut self) -> Vec<SessionAction> {
        if matches!(self.history, HistoryState::Loaded | HistoryState::Loading) {
            return Vec::new();
        }
        self.history = HistoryState::Loading;
        vec![
            SessionAction::FetchHistory { conversation_id: self.conversation_id().to_string() },
            SessionAction::StoreChanged,
        ]
    }

    fn handle_chat_event(&mut self, event: ChatEvent) -> Vec<SessionAction> {
        if event.conversation_id() != self.conversation_id() {
            tracing::debug!(
                event = event.name(),
                conversation = event.conversation_id(),
                "dropping event for another conversation"
            );
            return Vec::new();
        }

        match event {
            ChatEvent::NewMessage(message) | ChatEvent::MessageSent(message) => {
                self.apply_full_record(message);
                vec![SessionAction::StoreChanged]
            },
            ChatEvent::MessageUpdated(message) => self.apply_update(message),
            ChatEvent::MessageDeleted(delta) => self.apply_deletion(&delta),
            ChatEvent::StatusChanged(delta) => self.apply_status(&delta),
            ChatEvent::ReactionUpdated(delta) => self.apply_reactions(delta),
        }
    }

    /// Apply a full server record: reconcile it into a matching pending
    /// placeholder when it is the echo of our own send, otherwise upsert.
    fn apply_full_record(&mut self, message: Message) {
        if message.is_acknowledged()
            && message.sender_id == self.self_id
            && let Some(local_key) =
                self.store.match_optimistic(&message, TimeDelta::seconds(ECHO_WINDOW_SECS))
        {
            self.store.reconcile_optimistic(local_key, message);
        } else {
            self.store.upsert(message);
        }
    }

    /// Edits to a tombstoned message are dropped: deletion is final.
    fn apply_update(&mut self, message: Message) -> Vec<SessionAction> {
        if let Some(id) = message.id.as_deref()
            && self.store.get(id).is_some_and(|existing| existing.deleted)
        {
            tracing::debug!(message_id = id, "dropping edit for deleted message");
            return Vec::new();
        }
        self.apply_full_record(message);
        vec![SessionAction::StoreChanged]
    }

    fn apply_deletion(&mut self, delta: &MessageDeleted) -> Vec<SessionAction> {
        let now = self.clock.now();
        let mut changed = false;
        let found = self.store.patch(&delta.message_id, |m| {
            changed = m.mark_deleted(now);
        });
        if !found {
            tracing::debug!(message_id = %delta.message_id, "dropping deletion for unknown message");
        }
        if changed { vec![SessionAction::StoreChanged] } else { Vec::new() }
    }

    /// Status escalation is monotonic; regressions from delayed events
    /// are clamped rather than applied.
    fn apply_status(&mut self, delta: &MessageStatusChanged) -> Vec<SessionAction> {
        let now = self.clock.now();
        let mut changed = false;
        let found = self.store.patch(&delta.message_id, |m| {
            changed = m.escalate_status(delta.status, now);
        });
        if !found {
            tracing::debug!(message_id = %delta.message_id, "dropping status for unknown message");
        }
        if changed { vec![SessionAction::StoreChanged] } else { Vec::new() }
    }

    /// Server reaction state replaces the local map wholesale. Echoes of
    /// our own optimistic toggle therefore converge instead of toggling
    /// a second time.
    fn apply_reactions(&mut self, delta: ReactionUpdated) -> Vec<SessionAction> {
        let now = self.clock.now();
        let reactions = delta.reactions;
        let found = self.store.patch(&delta.message_id, |m| {
            m.reactions = reactions;
            m.updated_at = now;
        });
        if !found {
            tracing::debug!(message_id = %delta.message_id, "dropping reactions for unknown message");
            return Vec::new();
        }
        vec![SessionAction::StoreChanged]
    }

    fn handle_send(
        &mut self,
        content: Option<String>,
        attachments: Vec<Attachment>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        if content.as_deref().is_none_or(str::is_empty) && attachments.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let local_key = self.next_local_key;
        self.next_local_key += 1;

        let outbound = OutboundMessage {
            conversation_id: self.conversation_id().to_string(),
            receiver_id: self.peer_id.clone(),
            content: content.clone(),
            attachments: attachments.clone(),
        };

        // Optimistic: the placeholder is visible before any delivery
        // attempt starts.
        let placeholder = Message::optimistic(
            local_key,
            self.conversation_id().to_string(),
            self.self_id.clone(),
            self.peer_id.clone(),
            content,
            attachments,
            self.clock.now(),
        );
        self.store.upsert(placeholder);

        // The transport is text-only; attachments always take the
        // request path, as does everything while disconnected.
        let delivery = if self.state == SessionState::Connected && outbound.attachments.is_empty() {
            SessionAction::SendViaTransport { local_key, outbound }
        } else {
            SessionAction::SendViaRequest { local_key, outbound }
        };

        Ok(vec![delivery, SessionAction::StoreChanged])
    }

    fn handle_send_resolved(&mut self, local_key: u64, message: Message) -> Vec<SessionAction> {
        if !self.store.reconcile_optimistic(local_key, message.clone()) {
            // The inbound echo already reconciled the placeholder;
            // replace-by-id keeps this idempotent.
            self.store.upsert(message);
        }
        vec![SessionAction::StoreChanged]
    }

    /// A failed send is terminal for the placeholder but not for the
    /// session: the message stays visible in its failed state so the
    /// sender can retry.
    fn handle_send_failed(&mut self, local_key: u64, reason: String) -> Vec<SessionAction> {
        if !self.store.fail_optimistic(local_key, reason) {
            tracing::debug!(local_key, "send failure for unknown placeholder");
            return Vec::new();
        }
        vec![SessionAction::StoreChanged]
    }

    /// Reaction toggles are optimistic-then-confirm: apply locally once,
    /// notify the transport, and let the server echo replace the map.
    fn handle_toggle_reaction(&mut self, message_id: &str, symbol: String) -> Vec<SessionAction> {
        if !self.store.toggle_reaction(message_id, &symbol, &self.self_id) {
            tracing::debug!(message_id, "ignoring reaction toggle for unknown message");
            return Vec::new();
        }

        vec![
            SessionAction::EmitReaction(ReactionIntent {
                conversation_id: self.conversation_id().to_string(),
                message_id: message_id.to_string(),
                symbol,
            }),
            SessionAction::StoreChanged,
        ]
    }

    fn handle_mark_read(&mut self, message_id: String) -> Vec<SessionAction> {
        let now = self.clock.now();
        let mut changed = false;
        let found = self.store.patch(&message_id, |m| {
            changed = m.escalate_status(DeliveryStatus::Read, now);
        });
        if !found || !changed {
            return Vec::new();
        }
        vec![SessionAction::RequestMarkRead { message_id }, SessionAction::StoreChanged]
    }

    fn handle_read_confirmed(&mut self, message: Message) -> Vec<SessionAction> {
        if message.conversation_id != self.conversation_id() {
            return Vec::new();
        }
        self.apply_full_record(message);
        vec![SessionAction::StoreChanged]
    }

    fn handle_close(&mut self) -> Vec<SessionAction> {
        self.state = SessionState::Closed;
        vec![
            SessionAction::Unsubscribe { conversation_id: self.conversation_id().to_string() },
            SessionAction::StoreChanged,
        ]
    }
}
