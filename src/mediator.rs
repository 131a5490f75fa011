//! # Conversation Mediator
//!
//! Process-wide routing table from correlation id to the live conversation.
//!
//! The mediator holds no business logic. [`ConversationMediator::dispatch`]
//! looks up the correlation id and pushes the message into that conversation's
//! inbox without waiting; the conversation task does the rest and deregisters
//! itself on reaching a terminal state.
//!
//! ```text
//! bus delivery ──▶ dispatch(msg) ──▶ conversations[msg.correlation_id].inbox ──▶ conversation task
//! ```
//!
//! Messages for unknown or finished conversations are logged and dropped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::bus::MessageListener;
use crate::conversation::{run_conversation, Conversation, ConversationInput};
use crate::message::{CorrelationId, Message, OperationType};

/// Inbox of one registered conversation.
#[derive(Debug, Clone)]
pub struct ConversationHandle {
    inbox: mpsc::UnboundedSender<ConversationInput>,
    pub operation: OperationType,
    pub started_at: DateTime<Utc>,
}

impl ConversationHandle {
    pub fn new(inbox: mpsc::UnboundedSender<ConversationInput>, operation: OperationType) -> Self {
        Self {
            inbox,
            operation,
            started_at: Utc::now(),
        }
    }

    fn send(&self, input: ConversationInput) -> bool {
        self.inbox.send(input).is_ok()
    }
}

#[derive(Clone, Default)]
pub struct ConversationMediator {
    conversations: Arc<DashMap<CorrelationId, ConversationHandle>>,
}

impl ConversationMediator {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, handle), level = "debug")]
    pub fn register(
        &self,
        correlation_id: &str,
        handle: ConversationHandle,
    ) -> MediatorResult<()> {
        match self.conversations.entry(correlation_id.to_string()) {
            Entry::Occupied(_) => Err(MediatorError::DuplicateConversation {
                correlation_id: correlation_id.to_string(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            }
        }
    }

    /// Removes the conversation. Returns false if it was not registered.
    #[instrument(skip(self), level = "debug")]
    pub fn deregister(&self, correlation_id: &str) -> bool {
        self.conversations.remove(correlation_id).is_some()
    }

    /// Routes `message` to its conversation without blocking.
    #[instrument(skip(self, message), level = "trace", fields(correlation_id = %message.correlation_id))]
    pub fn dispatch(&self, message: Message) {
        let Some(handle) = self
            .conversations
            .get(&message.correlation_id)
            .map(|entry| entry.value().clone())
        else {
            debug!(
                "No conversation for {}, dropping {} from {}",
                message.correlation_id,
                message.kind(),
                message.from
            );
            return;
        };
        let correlation_id = message.correlation_id.clone();
        if !handle.send(ConversationInput::Message(message)) {
            debug!("Conversation {} already finished", correlation_id);
        }
    }

    /// Registers `conversation` and spawns the task driving it.
    ///
    /// Returns as soon as the task is spawned; results surface through the
    /// conversation's event handler. Must be called within a Tokio runtime.
    #[instrument(skip(self, conversation), level = "debug", fields(correlation_id = %conversation.id()))]
    pub fn start(&self, conversation: Conversation) -> MediatorResult<()> {
        let correlation_id = conversation.id().clone();
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(
            &correlation_id,
            ConversationHandle::new(tx, conversation.operation()),
        )?;

        let registration = Registration {
            mediator: self.clone(),
            correlation_id,
        };
        tokio::spawn(async move {
            let _registration = registration;
            run_conversation(conversation, rx).await;
        });
        Ok(())
    }

    /// Fails every open conversation and empties the routing table.
    #[instrument(skip(self), level = "debug")]
    pub fn shutdown(&self) {
        let open = self.open_conversations();
        if !open.is_empty() {
            info!("Shutting down {} open conversation(s)", open.len());
        }
        for correlation_id in open {
            if let Some((_, handle)) = self.conversations.remove(&correlation_id) {
                if !handle.send(ConversationInput::Fail("Mediator shutting down".to_string())) {
                    warn!("Conversation {} could not be failed", correlation_id);
                }
            }
        }
    }

    pub fn open_conversations(&self) -> Vec<CorrelationId> {
        self.conversations
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn is_open(&self, correlation_id: &str) -> bool {
        self.conversations.contains_key(correlation_id)
    }
}

impl MessageListener for ConversationMediator {
    fn on_message(&self, message: Message) {
        self.dispatch(message);
    }
}

/// Deregisters its conversation when the conversation task ends.
struct Registration {
    mediator: ConversationMediator,
    correlation_id: CorrelationId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.mediator.deregister(&self.correlation_id) {
            debug!("Conversation {} deregistered", self.correlation_id);
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediatorError {
    #[error("Conversation already registered: {correlation_id}")]
    DuplicateConversation { correlation_id: CorrelationId },
}

pub type MediatorResult<T> = Result<T, MediatorError>;
