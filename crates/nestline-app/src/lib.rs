//! Tokio runtime for nestline conversation sessions.
//!
//! The [`runtime`] module owns the single-writer event loop: it feeds
//! transport signals, request completions, and user commands into a
//! [`nestline_client::Session`] from one task, executes the resulting
//! actions, and publishes [`SessionView`] snapshots over a watch channel
//! for a UI to render.

pub mod runtime;
pub mod state;

pub use runtime::{SessionCommand, SessionGone, SessionHandle, spawn_session};
pub use state::SessionView;
