//! Fuzz target for session event interleavings
//!
//! # Strategy
//!
//! - Arbitrary sequences of user intents, transport transitions, and
//!   request completions, including orderings no real runtime produces
//! - Correlation keys and message ids drawn from small pools to force
//!   collisions, stale completions, and echo races
//!
//! # Invariants
//!
//! - Handling an event NEVER panics
//! - Acknowledged message ids stay unique
//! - The store stays ordered by creation time

#![no_main]

use arbitrary::Arbitrary;
use chrono::{DateTime, TimeDelta};
use libfuzzer_sys::fuzz_target;
use nestline_client::{Session, SessionEvent};
use nestline_core::{
    ChatEvent, DeliveryStatus, Message, ReactionMap, SendState,
    clock::test_utils::MockClock,
    event::{MessageDeleted, MessageStatusChanged, ReactionUpdated},
};

#[derive(Debug, Arbitrary)]
enum Op {
    Open,
    Connected,
    Disconnected,
    NewMessage { id: u8, own: bool, offset_secs: u16 },
    Updated { id: u8, own: bool, offset_secs: u16 },
    Deleted { id: u8 },
    Status { id: u8, status: u8 },
    Reactions { id: u8, symbol: u8, empty: bool },
    Send { text: u8 },
    SendResolved { key: u8, id: u8, offset_secs: u16 },
    SendFailed { key: u8 },
    Toggle { id: u8, symbol: u8 },
    MarkRead { id: u8 },
    HistoryLoaded { ids: Vec<(u8, bool, u16)> },
    HistoryFailed,
    RetryHistory,
    Close,
}

fn server_message(id: u8, own: bool, offset_secs: u16) -> Message {
    let (sender, receiver) = if own { ("me", "peer") } else { ("peer", "me") };
    let at = DateTime::UNIX_EPOCH + TimeDelta::seconds(i64::from(offset_secs));
    Message {
        id: Some(format!("m{id}")),
        local_key: None,
        conversation_id: "c1".into(),
        sender_id: sender.into(),
        receiver_id: receiver.into(),
        content: Some(format!("content {id}")),
        attachments: Vec::new(),
        status: DeliveryStatus::Sent,
        deleted: false,
        reactions: ReactionMap::new(),
        created_at: at,
        updated_at: at,
        send_state: SendState::Confirmed,
    }
}

fn event(op: Op) -> SessionEvent {
    match op {
        Op::Open => SessionEvent::Open,
        Op::Connected => SessionEvent::TransportConnected,
        Op::Disconnected => SessionEvent::TransportDisconnected { reason: "dropped".into() },
        Op::NewMessage { id, own, offset_secs } => {
            SessionEvent::EventReceived(ChatEvent::NewMessage(server_message(id, own, offset_secs)))
        }
        Op::Updated { id, own, offset_secs } => SessionEvent::EventReceived(
            ChatEvent::MessageUpdated(server_message(id, own, offset_secs)),
        ),
        Op::Deleted { id } => SessionEvent::EventReceived(ChatEvent::MessageDeleted(
            MessageDeleted { conversation_id: "c1".into(), message_id: format!("m{id}") },
        )),
        Op::Status { id, status } => {
            let status = match status % 3 {
                0 => DeliveryStatus::Sent,
                1 => DeliveryStatus::Delivered,
                _ => DeliveryStatus::Read,
            };
            SessionEvent::EventReceived(ChatEvent::StatusChanged(MessageStatusChanged {
                conversation_id: "c1".into(),
                message_id: format!("m{id}"),
                status,
            }))
        }
        Op::Reactions { id, symbol, empty } => {
            let mut reactions = ReactionMap::new();
            if !empty {
                reactions.entry(format!("s{symbol}")).or_default().insert("peer".into());
            }
            SessionEvent::EventReceived(ChatEvent::ReactionUpdated(ReactionUpdated {
                conversation_id: "c1".into(),
                message_id: format!("m{id}"),
                reactions,
            }))
        }
        Op::Send { text } => {
            SessionEvent::Send { content: Some(format!("draft {text}")), attachments: Vec::new() }
        }
        Op::SendResolved { key, id, offset_secs } => SessionEvent::SendResolved {
            local_key: u64::from(key % 8),
            message: server_message(id, true, offset_secs),
        },
        Op::SendFailed { key } => SessionEvent::SendFailed {
            local_key: u64::from(key % 8),
            reason: "network error".into(),
        },
        Op::Toggle { id, symbol } => SessionEvent::ToggleReaction {
            message_id: format!("m{id}"),
            symbol: format!("s{symbol}"),
        },
        Op::MarkRead { id } => SessionEvent::MarkRead { message_id: format!("m{id}") },
        Op::HistoryLoaded { ids } => SessionEvent::HistoryLoaded(
            ids.into_iter().map(|(id, own, offset)| server_message(id, own, offset)).collect(),
        ),
        Op::HistoryFailed => SessionEvent::HistoryFailed { reason: "timeout".into() },
        Op::RetryHistory => SessionEvent::RetryHistory,
        Op::Close => SessionEvent::Close,
    }
}

fuzz_target!(|ops: Vec<Op>| {
    let mut session = Session::new(MockClock::default(), "c1".into(), "me".into(), "peer".into());

    for op in ops {
        let _ = session.handle(event(op));

        let mut ids: Vec<_> =
            session.messages().iter().filter_map(|m| m.id.as_deref()).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total, "duplicate acknowledged id");

        assert!(
            session.messages().windows(2).all(|pair| pair[0].created_at <= pair[1].created_at),
            "store not ordered by created_at"
        );
    }
});
