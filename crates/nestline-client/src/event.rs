//! Session events and actions.
//!
//! [`SessionEvent`] is everything the runtime feeds into the coordinator:
//! user intents, transport lifecycle transitions, decoded real-time
//! events, and completions of asynchronous requests. [`SessionAction`] is
//! everything the coordinator asks the runtime to do in return.

use nestline_core::{Attachment, ChatEvent, ConversationId, Message, MessageId, UserId};
use serde::Serialize;

/// Events the runtime feeds into the session.
///
/// The runtime is responsible for:
/// - Receiving transport signals and decoding named events
/// - Executing requests and feeding their completions back
/// - Forwarding user intents (send, toggle reaction, mark read)
///
/// All variants are applied from one sequential context, in completion
/// order; cross-source ordering is deliberately unconstrained.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Open the session: subscribe to the transport and load history.
    Open,

    /// Transport subscription is live.
    TransportConnected,

    /// Transport dropped (or the subscription failed).
    TransportDisconnected {
        /// Failure description for the session error flag.
        reason: String,
    },

    /// A decoded real-time event arrived.
    EventReceived(ChatEvent),

    /// The history fetch resolved.
    HistoryLoaded(Vec<Message>),

    /// The history fetch failed.
    HistoryFailed {
        /// Failure description for the session error flag.
        reason: String,
    },

    /// User asked to retry a failed history fetch.
    RetryHistory,

    /// User wants to send a message.
    Send {
        /// Message text, if any.
        content: Option<String>,
        /// Attached media, if any.
        attachments: Vec<Attachment>,
    },

    /// A request-path send resolved with the confirmed record.
    SendResolved {
        /// Correlation key of the optimistic placeholder.
        local_key: u64,
        /// Server-confirmed record.
        message: Message,
    },

    /// A send attempt failed terminally.
    SendFailed {
        /// Correlation key of the optimistic placeholder.
        local_key: u64,
        /// Failure description shown on the placeholder.
        reason: String,
    },

    /// User toggled a reaction on a message.
    ToggleReaction {
        /// Target message.
        message_id: MessageId,
        /// Reaction symbol.
        symbol: String,
    },

    /// User read a message.
    MarkRead {
        /// Message that was read.
        message_id: MessageId,
    },

    /// A mark-read request resolved with the updated record.
    ReadConfirmed {
        /// Server record after the status change.
        message: Message,
    },

    /// Tear the session down.
    Close,
}

/// Actions the session produces for the runtime to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    /// Subscribe to the conversation's event stream.
    Subscribe {
        /// Conversation to subscribe to.
        conversation_id: ConversationId,
    },

    /// Release the transport subscription.
    Unsubscribe {
        /// Conversation to unsubscribe from.
        conversation_id: ConversationId,
    },

    /// Fetch the conversation history over the request path.
    FetchHistory {
        /// Conversation to fetch.
        conversation_id: ConversationId,
    },

    /// Deliver a message over the transport.
    ///
    /// Chosen only while connected and attachment-free; the transport is
    /// text-only. Failures come back as `SessionEvent::SendFailed`.
    SendViaTransport {
        /// Correlation key of the optimistic placeholder.
        local_key: u64,
        /// Payload to deliver.
        outbound: OutboundMessage,
    },

    /// Deliver a message over the request path.
    SendViaRequest {
        /// Correlation key of the optimistic placeholder.
        local_key: u64,
        /// Payload to deliver.
        outbound: OutboundMessage,
    },

    /// Notify the transport of a reaction toggle intent.
    ///
    /// The local toggle is already applied; the server's own
    /// `reaction_updated` echo will replace it wholesale.
    EmitReaction(ReactionIntent),

    /// Mark a message read over the request path.
    RequestMarkRead {
        /// Message that was read.
        message_id: MessageId,
    },

    /// The observable state changed; re-publish the projection.
    StoreChanged,
}

/// Payload for an outbound send, shared by both delivery paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    /// Target conversation.
    pub conversation_id: ConversationId,
    /// Recipient of the message.
    pub receiver_id: UserId,
    /// Message text, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attached media, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Payload for a reaction toggle emitted over the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionIntent {
    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,
    /// Target message.
    pub message_id: MessageId,
    /// Reaction symbol being toggled.
    pub symbol: String,
}
