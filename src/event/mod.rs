//! # Operation Events
//!
//! Every conversation reports its lifecycle as a sequential stream of
//! [`OperationEvent`]s delivered to one [`EventHandler`].
//!
//! ```text
//! IDENTIFY_REQUEST_SENT
//!   └─ COMPONENT_IDENTIFIED* / COMPONENT_FAILED* / IDENTIFY_TIMEOUT?
//!        └─ IDENTIFICATION_COMPLETE
//!             └─ REQUEST_SENT
//!                  └─ PROGRESS* / COMPONENT_COMPLETE* / COMPONENT_FAILED* / WARNING*
//!                       └─ COMPLETE | FAILED
//! ```
//!
//! Handlers run on the conversation's task. A panicking handler is caught and
//! logged by [`deliver`]; it never reaches the conversation.
//!
//! [`BlockingEventHandler`] adapts the stream for callers that want one outcome:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use bitmag::event::BlockingEventHandler;
//! # async fn example(handler: Arc<BlockingEventHandler>) -> bitmag::ClientResult<()> {
//! let results = handler.await_results().await?;
//! for result in results {
//!     println!("{} delivered {:?}", result.contributor_id, result.result);
//! }
//! # Ok(())
//! # }
//! ```

mod blocking;
mod handler;
mod operation_event;

pub use blocking::BlockingEventHandler;
pub use handler::{deliver, EventHandler, MockEventHandler};
pub use operation_event::{
    ContributorResult, OperationEvent, OperationEventKind, OperationEventType,
};
