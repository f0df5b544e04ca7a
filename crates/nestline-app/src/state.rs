//! Observable session state.

use nestline_client::SessionState;
use nestline_core::{DeliveryStatus, Message};

/// Snapshot of a session, published after every store change.
///
/// The view is a value, not a handle: the runtime clones the store into
/// it so renderers never share mutable state with the event loop.
#[derive(Debug, Clone)]
pub struct SessionView {
    /// Transport lifecycle state.
    pub connection: SessionState,
    /// Messages in display order.
    pub messages: Vec<Message>,
    /// Whether the initial history load is still in flight.
    pub loading: bool,
    /// Most recent session-level failure, if any.
    pub error: Option<String>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            connection: SessionState::Disconnected,
            messages: Vec::new(),
            loading: false,
            error: None,
        }
    }
}

impl SessionView {
    /// Messages from the other party that `self_id` has not read yet.
    pub fn unread_count(&self, self_id: &str) -> usize {
        self.messages
            .iter()
            .filter(|m| {
                m.sender_id != self_id && !m.deleted && m.status < DeliveryStatus::Read
            })
            .count()
    }
}
