//! Fuzz target for real-time event decoding
//!
//! # Strategy
//!
//! - Known names: valid event names with arbitrary JSON payloads
//! - Unknown names: arbitrary strings that must be rejected cleanly
//! - Malformed payloads: JSON that parses but violates the event schema
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - Unknown names and schema mismatches return errors, not garbage

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use nestline_core::ChatEvent;

#[derive(Debug, Arbitrary)]
enum EventName {
    Known(u8),
    Raw(String),
}

#[derive(Debug, Arbitrary)]
struct Input {
    name: EventName,
    payload: Vec<u8>,
}

const KNOWN_NAMES: [&str; 6] = [
    ChatEvent::NEW_MESSAGE,
    ChatEvent::MESSAGE_SENT,
    ChatEvent::MESSAGE_UPDATED,
    ChatEvent::MESSAGE_DELETED,
    ChatEvent::MESSAGE_STATUS_CHANGED,
    ChatEvent::REACTION_UPDATED,
];

fuzz_target!(|input: Input| {
    let Ok(payload) = serde_json::from_slice::<serde_json::Value>(&input.payload) else {
        return;
    };

    let name = match &input.name {
        EventName::Known(index) => KNOWN_NAMES[*index as usize % KNOWN_NAMES.len()],
        EventName::Raw(raw) => raw.as_str(),
    };

    if let Ok(event) = ChatEvent::decode(name, payload) {
        // Decoded events expose a consistent name and conversation.
        assert!(KNOWN_NAMES.contains(&event.name()));
        let _ = event.conversation_id();
    }
});
