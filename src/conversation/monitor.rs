use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::event::{deliver, EventHandler, OperationEvent, OperationEventKind, OperationEventType};
use crate::message::{CorrelationId, OperationType};

/// Logs every event of one conversation and forwards it to the caller's handler.
#[derive(Clone)]
pub struct EventMonitor {
    conversation_id: CorrelationId,
    operation: OperationType,
    handler: Option<Arc<dyn EventHandler>>,
}

impl EventMonitor {
    pub fn new(
        conversation_id: impl Into<CorrelationId>,
        operation: OperationType,
        handler: Option<Arc<dyn EventHandler>>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            operation,
            handler,
        }
    }

    pub fn emit(&self, kind: OperationEventKind, info: impl Into<String>) {
        let event = OperationEvent::new(self.conversation_id.clone(), self.operation, kind, info);
        match event.event_type() {
            OperationEventType::Failed
            | OperationEventType::ComponentFailed
            | OperationEventType::IdentifyTimeout
            | OperationEventType::Warning => warn!(
                "[{}] {} {}: {}",
                self.conversation_id,
                event.event_type(),
                event.contributor_id().unwrap_or("-"),
                event.info
            ),
            OperationEventType::Complete => info!(
                "[{}] {} finished: {}",
                self.conversation_id, self.operation, event.info
            ),
            _ => debug!(
                "[{}] {} {}: {}",
                self.conversation_id,
                event.event_type(),
                event.contributor_id().unwrap_or("-"),
                event.info
            ),
        }
        if let Some(handler) = &self.handler {
            deliver(handler.as_ref(), &event);
        }
    }

    pub fn warning(&self, contributor_id: Option<&str>, info: impl Into<String>) {
        self.emit(
            OperationEventKind::Warning {
                contributor_id: contributor_id.map(str::to_string),
            },
            info,
        );
    }
}
