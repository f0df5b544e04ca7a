//! Error types for the nestline core.
//!
//! Store operations are pure and infallible; the only fallible boundary in
//! this crate is decoding named wire events into [`crate::ChatEvent`].

use thiserror::Error;

/// Failure to turn a named transport event into a typed [`crate::ChatEvent`].
///
/// These are always recoverable: the coordinator logs the error and drops
/// the single offending event without corrupting the store.
#[derive(Debug, Error)]
pub enum EventError {
    /// The event name is not part of the conversation protocol.
    #[error("unknown event name: {name}")]
    UnknownEvent {
        /// Name as received from the transport.
        name: String,
    },

    /// The payload did not match the schema for the named event.
    #[error("malformed {name} payload: {reason}")]
    MalformedPayload {
        /// Which event the payload claimed to be.
        name: &'static str,
        /// Decoder error description.
        reason: String,
    },
}
