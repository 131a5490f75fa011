//! # bitmag: Conversation Engine for Distributed Bit Repositories
//!
//! bitmag drives the client side of a bit repository: a collection of files is
//! replicated across independent contributors (pillars, services), and every
//! operation on it is a short-lived asynchronous conversation over a message bus.
//!
//! ## Conversation Model
//!
//! Each operation runs in two phases:
//!
//! ```text
//! start ─▶ Identifying ──(selection done)──▶ Performing ──(all final)──▶ Completed
//!              │                                  │
//!              └─────(no viable contributor)──────┴──(aggregation fails)─▶ Failed
//! ```
//!
//! 1. Identification: an identify request is broadcast to the collection, and a
//!    [`selection`] strategy decides which contributors perform the operation.
//! 2. Performing: operation requests go to the selected contributors; progress and
//!    final responses are aggregated into one outcome.
//!
//! ## Components
//!
//! - Messages and payloads ([`message`])
//! - Bus capabilities and the in-process bus ([`bus`])
//! - Contributor selection ([`selection`])
//! - Per-conversation state machine and actor ([`conversation`])
//! - Correlation-id routing ([`mediator`])
//! - Operation events and handlers ([`event`])
//! - Operation facades ([`client`])
//! - Settings ([`config`]) and errors ([`error`])
//! - An in-memory contributor for tests and demos ([`simulator`])
//!
//! ## Concurrency
//!
//! Each conversation is an actor: a Tokio task owning its state and reading one
//! inbox. The [`mediator::ConversationMediator`] only routes by correlation id, so
//! concurrent conversations never share mutable state and a slow event handler
//! delays only its own conversation.

pub mod bus;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod mediator;
pub mod message;
pub mod selection;
pub mod simulator;

// Re-exports
pub use config::ClientSettings;
pub use error::*;
pub use event::*;
pub use mediator::ConversationMediator;
