//! Session event loop.
//!
//! The runtime is the single mutation context the session requires: one
//! task owns the [`Session`] and selects over three channels (user
//! commands, transport signals, request completions). Every store
//! mutation happens inside that task, so the session itself needs no
//! locking.
//!
//! Request-path calls run as spawned tasks bounded by
//! [`REQUEST_TIMEOUT`]; their results come back through the completion
//! channel instead of being awaited inline, so a slow history fetch
//! never stalls inbound real-time events.

use std::{sync::Arc, time::Duration};

use nestline_client::{
    ChatApi, SEND_MESSAGE, Session, SessionAction, SessionEvent, TOGGLE_REACTION, Transport,
    TransportSignal,
};
use nestline_core::{Attachment, ChatEvent, Clock, ConversationId, MessageId, UserId};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::state::SessionView;

/// Upper bound on any single request-path call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const COMMAND_BUFFER: usize = 32;
const COMPLETION_BUFFER: usize = 64;

/// User commands accepted by a running session.
#[derive(Debug)]
pub enum SessionCommand {
    /// Send a message.
    Send {
        /// Message text, if any.
        content: Option<String>,
        /// Attached media, if any.
        attachments: Vec<Attachment>,
    },

    /// Toggle a reaction on a message.
    ToggleReaction {
        /// Target message.
        message_id: MessageId,
        /// Reaction symbol.
        symbol: String,
    },

    /// Mark a message as read.
    MarkRead {
        /// Message that was read.
        message_id: MessageId,
    },

    /// Retry a failed history load.
    RetryHistory,

    /// Tear the session down.
    Close,
}

/// The session task has shut down; no further commands are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session task has shut down")]
pub struct SessionGone;

/// Handle to a running session task.
///
/// Cheap to clone. Dropping the last handle closes the command channel,
/// which shuts the session down the same way [`SessionHandle::close`]
/// does.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    view: watch::Receiver<SessionView>,
}

impl SessionHandle {
    /// Subscribe to view snapshots.
    pub fn view(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Send a message.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGone`] if the session task has shut down.
    pub async fn send(
        &self,
        content: Option<String>,
        attachments: Vec<Attachment>,
    ) -> Result<(), SessionGone> {
        self.command(SessionCommand::Send { content, attachments }).await
    }

    /// Toggle a reaction on a message.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGone`] if the session task has shut down.
    pub async fn toggle_reaction(
        &self,
        message_id: MessageId,
        symbol: String,
    ) -> Result<(), SessionGone> {
        self.command(SessionCommand::ToggleReaction { message_id, symbol }).await
    }

    /// Mark a message as read.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGone`] if the session task has shut down.
    pub async fn mark_read(&self, message_id: MessageId) -> Result<(), SessionGone> {
        self.command(SessionCommand::MarkRead { message_id }).await
    }

    /// Retry a failed history load.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGone`] if the session task has shut down.
    pub async fn retry_history(&self) -> Result<(), SessionGone> {
        self.command(SessionCommand::RetryHistory).await
    }

    /// Close the session and release its transport subscription.
    ///
    /// # Errors
    ///
    /// Returns [`SessionGone`] if the session task has already shut down.
    pub async fn close(&self) -> Result<(), SessionGone> {
        self.command(SessionCommand::Close).await
    }

    async fn command(&self, command: SessionCommand) -> Result<(), SessionGone> {
        self.commands.send(command).await.map_err(|_| SessionGone)
    }
}

/// Spawn the event loop for one conversation.
///
/// `signals` is the inbound half of the transport: the transport
/// implementation pushes connection transitions and raw events into it.
/// The session is opened immediately; the returned handle's view starts
/// at [`SessionView::default`] and updates after every store change.
pub fn spawn_session<C: Clock>(
    clock: C,
    conversation_id: ConversationId,
    self_id: UserId,
    peer_id: UserId,
    transport: Arc<dyn Transport>,
    api: Arc<dyn ChatApi>,
    signals: mpsc::Receiver<TransportSignal>,
) -> SessionHandle {
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (completions_tx, completions_rx) = mpsc::channel(COMPLETION_BUFFER);
    let (view_tx, view_rx) = watch::channel(SessionView::default());

    let task = SessionTask {
        session: Session::new(clock, conversation_id, self_id, peer_id),
        transport,
        api,
        completions: completions_tx,
        view: view_tx,
    };
    tokio::spawn(task.run(commands_rx, signals, completions_rx));

    SessionHandle { commands: commands_tx, view: view_rx }
}

struct SessionTask<C: Clock> {
    session: Session<C>,
    transport: Arc<dyn Transport>,
    api: Arc<dyn ChatApi>,
    completions: mpsc::Sender<SessionEvent>,
    view: watch::Sender<SessionView>,
}

impl<C: Clock> SessionTask<C> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<SessionCommand>,
        mut signals: mpsc::Receiver<TransportSignal>,
        mut completions: mpsc::Receiver<SessionEvent>,
    ) {
        self.dispatch(SessionEvent::Open).await;

        // Once the signal channel closes we stop polling it; without the
        // guard a closed channel would win every select round.
        let mut signals_open = true;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Close) | None => {
                        self.dispatch(SessionEvent::Close).await;
                        break;
                    },
                    Some(command) => self.dispatch(command_event(command)).await,
                },
                signal = signals.recv(), if signals_open => match signal {
                    Some(signal) => self.handle_signal(signal).await,
                    None => {
                        signals_open = false;
                        self.dispatch(SessionEvent::TransportDisconnected {
                            reason: "transport signal channel closed".into(),
                        })
                        .await;
                    },
                },
                completion = completions.recv() => {
                    // Never yields None: we hold a sender for spawned requests.
                    if let Some(event) = completion {
                        self.dispatch(event).await;
                    }
                },
            }
        }
    }

    async fn handle_signal(&mut self, signal: TransportSignal) {
        match signal {
            TransportSignal::Connected => self.dispatch(SessionEvent::TransportConnected).await,
            TransportSignal::Disconnected { reason } => {
                self.dispatch(SessionEvent::TransportDisconnected { reason }).await;
            },
            TransportSignal::Event { name, payload } => match ChatEvent::decode(&name, payload) {
                Ok(event) => self.dispatch(SessionEvent::EventReceived(event)).await,
                Err(error) => {
                    tracing::warn!(event = %name, %error, "dropping undecodable event");
                },
            },
        }
    }

    async fn dispatch(&mut self, event: SessionEvent) {
        match self.session.handle(event) {
            Ok(actions) => {
                for action in actions {
                    self.execute(action).await;
                }
            },
            Err(error) => {
                tracing::warn!(%error, "session rejected event");
            },
        }
    }

    async fn execute(&mut self, action: SessionAction) {
        match action {
            SessionAction::Subscribe { conversation_id } => {
                if let Err(error) = self.transport.subscribe(&conversation_id).await {
                    // Routed through the completion channel so the
                    // session sees it as an ordinary transition.
                    self.complete(SessionEvent::TransportDisconnected {
                        reason: error.to_string(),
                    })
                    .await;
                }
            },
            SessionAction::Unsubscribe { conversation_id } => {
                if let Err(error) = self.transport.unsubscribe(&conversation_id).await {
                    tracing::warn!(conversation = %conversation_id, %error, "unsubscribe failed");
                }
            },
            SessionAction::FetchHistory { conversation_id } => {
                let api = Arc::clone(&self.api);
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    let event = match bounded(api.fetch_history(&conversation_id)).await {
                        Ok(messages) => SessionEvent::HistoryLoaded(messages),
                        Err(reason) => SessionEvent::HistoryFailed { reason },
                    };
                    let _ = completions.send(event).await;
                });
            },
            SessionAction::SendViaTransport { local_key, outbound } => {
                let result = match serde_json::to_value(&outbound) {
                    Ok(payload) => self.transport.emit(SEND_MESSAGE, payload).await,
                    Err(error) => {
                        self.complete(SessionEvent::SendFailed {
                            local_key,
                            reason: error.to_string(),
                        })
                        .await;
                        return;
                    },
                };
                if let Err(error) = result {
                    self.complete(SessionEvent::SendFailed { local_key, reason: error.to_string() })
                        .await;
                }
            },
            SessionAction::SendViaRequest { local_key, outbound } => {
                let api = Arc::clone(&self.api);
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    let event = match bounded(api.send(&outbound)).await {
                        Ok(message) => SessionEvent::SendResolved { local_key, message },
                        Err(reason) => SessionEvent::SendFailed { local_key, reason },
                    };
                    let _ = completions.send(event).await;
                });
            },
            SessionAction::EmitReaction(intent) => {
                let result = match serde_json::to_value(&intent) {
                    Ok(payload) => self.transport.emit(TOGGLE_REACTION, payload).await,
                    Err(error) => {
                        tracing::warn!(%error, "reaction intent did not serialize");
                        return;
                    },
                };
                // The local toggle stays applied either way; the server's
                // reaction_updated echo is the source of truth.
                if let Err(error) = result {
                    tracing::warn!(%error, "reaction emit failed");
                }
            },
            SessionAction::RequestMarkRead { message_id } => {
                let api = Arc::clone(&self.api);
                let completions = self.completions.clone();
                tokio::spawn(async move {
                    match bounded(api.mark_read(&message_id)).await {
                        Ok(message) => {
                            let _ = completions.send(SessionEvent::ReadConfirmed { message }).await;
                        },
                        Err(reason) => {
                            // Read state was already applied locally; the
                            // receipt just did not reach the server.
                            tracing::warn!(message_id = %message_id, reason = %reason, "mark-read request failed");
                        },
                    }
                });
            },
            SessionAction::StoreChanged => self.publish(),
        }
    }

    /// Feed a locally produced completion back through the channel the
    /// loop already selects on.
    async fn complete(&self, event: SessionEvent) {
        let _ = self.completions.send(event).await;
    }

    fn publish(&self) {
        self.view.send_replace(SessionView {
            connection: self.session.state(),
            messages: self.session.messages().to_vec(),
            loading: self.session.is_loading(),
            error: self.session.last_error().map(str::to_string),
        });
    }
}

/// Bound a request-path future by [`REQUEST_TIMEOUT`], flattening both
/// failure shapes into a display string for the session error flag.
async fn bounded<T, E, F>(request: F) -> Result<T, String>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(REQUEST_TIMEOUT, request).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error.to_string()),
        Err(_) => Err(format!("request timed out after {REQUEST_TIMEOUT:?}")),
    }
}

fn command_event(command: SessionCommand) -> SessionEvent {
    match command {
        SessionCommand::Send { content, attachments } => {
            SessionEvent::Send { content, attachments }
        },
        SessionCommand::ToggleReaction { message_id, symbol } => {
            SessionEvent::ToggleReaction { message_id, symbol }
        },
        SessionCommand::MarkRead { message_id } => SessionEvent::MarkRead { message_id },
        SessionCommand::RetryHistory => SessionEvent::RetryHistory,
        // Close is handled in the select arm so the loop can stop.
        SessionCommand::Close => SessionEvent::Close,
    }
}
