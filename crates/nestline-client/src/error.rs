//! Session coordinator errors.

use nestline_core::ConversationId;
use thiserror::Error;

/// Errors surfaced to the caller for rejected user intents.
///
/// Background reconciliation never produces these: malformed events,
/// out-of-order patches, and late async completions are logged and
/// dropped instead, because there is no caller to hand them to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session was closed; no further intents are accepted.
    #[error("session for conversation {conversation_id} is closed")]
    Closed {
        /// Conversation the closed session belonged to.
        conversation_id: ConversationId,
    },

    /// A message must carry text, attachments, or both.
    #[error("message must carry text or attachments")]
    EmptyMessage,
}
