//! Core domain types for the nestline chat client.
//!
//! This crate holds the pure, I/O-free building blocks of a conversation
//! session: the [`Message`] record, the ordered [`MessageStore`], and the
//! typed [`ChatEvent`] sum that replaces named-callback event dispatch.
//!
//! Everything here is deterministic and side-effect free. Time is injected
//! through the [`clock::Clock`] trait so ordering and echo-correlation logic
//! can be tested with a virtual clock.

pub mod clock;
pub mod error;
pub mod event;
pub mod message;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use error::EventError;
pub use event::ChatEvent;
pub use message::{
    Attachment, ConversationId, DeliveryStatus, Message, MessageId, ReactionMap, SendState, UserId,
};
pub use store::MessageStore;
