//! Session coordinator for nestline conversations.
//!
//! The [`Session`] is a sans-IO state machine: it consumes
//! [`SessionEvent`] inputs from all three concurrent update sources (the
//! transport event stream, the history fetch, and user intents) and
//! produces [`SessionAction`] instructions for a runtime to execute. All
//! store mutations happen inside `Session::handle`, so feeding events from
//! one sequential context is the only synchronization the design needs.
//!
//! The I/O seams are the [`Transport`] and [`ChatApi`] traits; production
//! implementations live with the embedding application, test doubles with
//! the tests.

mod api;
mod error;
mod event;
mod session;
mod transport;

pub use api::{ApiError, ChatApi};
pub use error::SessionError;
pub use event::{OutboundMessage, ReactionIntent, SessionAction, SessionEvent};
pub use session::{Session, SessionState};
pub use transport::{SEND_MESSAGE, TOGGLE_REACTION, Transport, TransportError, TransportSignal};
