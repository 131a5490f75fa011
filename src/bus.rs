//! # Message Bus
//!
//! The send and receive capabilities the conversation engine consumes, plus an
//! in-process implementation built on Tokio broadcast channels.
//!
//! ## Capabilities
//!
//! - [`MessageSender`]: fire-and-forget `send_message`. At-least-once, no ordering
//!   across destinations.
//! - [`MessageListener`]: receives every message published to the destination it
//!   was registered for.
//!
//! ## LocalMessageBus
//!
//! One broadcast channel per destination, created lazily. Every listener gets a
//! dedicated delivery task, so listeners on different destinations run
//! concurrently and a slow listener only lags its own receiver.
//!
//! ```text
//! send_message(msg) ──▶ destinations[msg.to] ──▶ delivery task ──▶ listener.on_message()
//!                                           └──▶ delivery task ──▶ listener.on_message()
//! ```

use std::sync::Arc;

use dashmap::DashMap;
use mockall::automock;
use thiserror::Error;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, trace, warn};

use crate::message::{Destination, Message};

#[automock]
pub trait MessageSender: Send + Sync {
    fn send_message(&self, message: Message) -> BusResult<()>;
}

/// Receives messages delivered to one destination.
///
/// Called on a bus delivery task; implementations must return quickly.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: Message);
}

pub struct LocalMessageBus {
    destinations: DashMap<Destination, broadcast::Sender<Message>>,
    capacity: usize,
}

impl LocalMessageBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            destinations: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    fn channel(&self, destination: &str) -> broadcast::Sender<Message> {
        self.destinations
            .entry(destination.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    pub fn subscribe(&self, destination: &str) -> MessageReceiver {
        MessageReceiver::new(self.channel(destination).subscribe())
    }

    /// Spawns a delivery task feeding `listener` every message sent to `destination`.
    ///
    /// Abort the returned handle to remove the listener.
    pub fn add_listener(
        &self,
        destination: &str,
        listener: Arc<dyn MessageListener>,
    ) -> JoinHandle<()> {
        let mut receiver = self.subscribe(destination);
        let destination = destination.to_string();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(message) => listener.on_message(message),
                    Err(BusError::Lagged { count }) => {
                        warn!("Listener on {} lagged, {} messages skipped", destination, count);
                    }
                    Err(e) => {
                        debug!("Listener on {} stopped: {}", destination, e);
                        break;
                    }
                }
            }
        })
    }

    pub fn listener_count(&self, destination: &str) -> usize {
        self.destinations
            .get(destination)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl MessageSender for LocalMessageBus {
    fn send_message(&self, message: Message) -> BusResult<()> {
        trace!("Sending {} to {}: {:?}", message.kind(), message.to, message);
        let sender = self.channel(&message.to);
        if sender.receiver_count() == 0 {
            debug!(
                "No listeners on {}, dropping {} ({})",
                message.to,
                message.kind(),
                message.correlation_id
            );
            return Ok(());
        }
        sender.send(message).map_err(|e| BusError::SendFailed {
            message: e.to_string(),
        })?;
        Ok(())
    }
}

pub struct MessageReceiver {
    receiver: broadcast::Receiver<Message>,
}

impl MessageReceiver {
    fn new(receiver: broadcast::Receiver<Message>) -> Self {
        Self { receiver }
    }

    /// Receives the next message. On lag the receiver is resubscribed and the
    /// number of skipped messages is reported as an error.
    pub async fn recv(&mut self) -> BusResult<Message> {
        match self.receiver.recv().await {
            Ok(message) => Ok(message),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                self.receiver = self.receiver.resubscribe();
                Err(BusError::Lagged { count: n })
            }
            Err(e) => Err(BusError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BusError {
    #[error("Message send failed: {message}")]
    SendFailed { message: String },

    #[error("Message receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("Receiver lagged: {count}")]
    Lagged { count: u64 },
}

pub type BusResult<T> = Result<T, BusError>;
