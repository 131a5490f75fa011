use std::panic::{catch_unwind, AssertUnwindSafe};

use mockall::automock;
use tracing::error;

use super::OperationEvent;

/// Receives the events of one conversation, sequentially and in delivery order.
///
/// Runs on the conversation's task; implementations must not block for long.
#[automock]
pub trait EventHandler: Send + Sync {
    fn handle_event(&self, event: &OperationEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&OperationEvent) + Send + Sync,
{
    fn handle_event(&self, event: &OperationEvent) {
        self(event)
    }
}

/// Delivers `event`, catching and logging a panicking handler.
///
/// Returns false if the handler panicked.
pub fn deliver(handler: &dyn EventHandler, event: &OperationEvent) -> bool {
    match catch_unwind(AssertUnwindSafe(|| handler.handle_event(event))) {
        Ok(()) => true,
        Err(panic) => {
            let info = if let Some(msg) = panic.downcast_ref::<&str>() {
                msg.to_string()
            } else if let Some(msg) = panic.downcast_ref::<String>() {
                msg.clone()
            } else {
                "unknown panic".to_string()
            };
            error!(
                "Event handler panicked on {} for {}: {}",
                event.event_type(),
                event.conversation_id,
                info
            );
            false
        }
    }
}
