//! Real-time transport contract.
//!
//! The transport is a persistent, bidirectional named-event channel. This
//! module only defines the seam: outbound operations as an async trait,
//! inbound traffic as [`TransportSignal`] values the implementation pushes
//! into the runtime's channel. Reconnection policy (bounded retries,
//! backoff) belongs to the implementation; the session only ever sees the
//! resulting connect/disconnect transitions.

use async_trait::async_trait;
use thiserror::Error;

/// Wire name for an outbound message delivery.
pub const SEND_MESSAGE: &str = "send_message";

/// Wire name for an outbound reaction toggle intent.
pub const TOGGLE_REACTION: &str = "toggle_reaction";

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Subscribing to a conversation failed.
    #[error("subscription failed: {0}")]
    Subscribe(String),

    /// An outbound emit failed.
    #[error("emit failed: {0}")]
    Emit(String),

    /// The connection itself is gone.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Inbound traffic from the transport.
///
/// The implementation pushes these into a channel owned by the runtime,
/// which serializes them with the other update sources.
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// The subscription is live.
    Connected,

    /// The connection dropped; the implementation keeps retrying.
    Disconnected {
        /// Failure description.
        reason: String,
    },

    /// A named event arrived.
    Event {
        /// Wire name of the event.
        name: String,
        /// Undecoded payload.
        payload: serde_json::Value,
    },
}

/// Outbound operations on the real-time channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Subscribe to a conversation's event stream.
    async fn subscribe(&self, conversation_id: &str) -> Result<(), TransportError>;

    /// Release a conversation subscription.
    async fn unsubscribe(&self, conversation_id: &str) -> Result<(), TransportError>;

    /// Emit a named event with a JSON payload.
    async fn emit(&self, event: &str, payload: serde_json::Value) -> Result<(), TransportError>;
}
