//! Request-path API contract.
//!
//! The request path covers everything the transport cannot: the initial
//! history load, sends that carry attachments (or happen while
//! disconnected), and read receipts. Implementations wrap the backend's
//! HTTP API; the runtime bounds every call with a timeout.

use std::time::Duration;

use async_trait::async_trait;
use nestline_core::Message;
use thiserror::Error;

use crate::event::OutboundMessage;

/// Request-path failures.
///
/// All of these are per-operation: a failed send marks one placeholder, a
/// failed history fetch flags the session, and neither tears the session
/// down.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request did not complete within its bound.
    #[error("request timed out after {elapsed:?}")]
    Timeout {
        /// How long we waited.
        elapsed: Duration,
    },

    /// The server rejected the request.
    #[error("server returned status {code}: {message}")]
    Status {
        /// HTTP status code.
        code: u16,
        /// Server-provided description.
        message: String,
    },

    /// The request never reached the server.
    #[error("network error: {0}")]
    Network(String),

    /// The response body did not match the expected schema.
    #[error("response decode failed: {0}")]
    Decode(String),
}

/// Request/response API for a conversation backend.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Fetch the full message list for a conversation.
    async fn fetch_history(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError>;

    /// Deliver a message over the request path.
    ///
    /// Returns the server-confirmed record, used to reconcile the
    /// optimistic placeholder.
    async fn send(&self, outbound: &OutboundMessage) -> Result<Message, ApiError>;

    /// Mark a message as read.
    ///
    /// Returns the updated record.
    async fn mark_read(&self, message_id: &str) -> Result<Message, ApiError>;
}
