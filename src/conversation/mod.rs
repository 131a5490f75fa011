//! # Conversations
//!
//! A conversation drives one operation through Identify, Perform and a terminal
//! Complete or Failed phase.
//!
//! ```text
//!  start()
//!    │  IdentifyRequest ─▶ collection destination
//!    ▼
//! ┌────────────┐ selector finished / timeout with partial ┌────────────┐
//! │Identifying │────────────────────────────────────────▶│ Performing │
//! └─────┬──────┘                                         └─────┬──────┘
//!       │ nothing selected, protocol error, timeout            │ ledger empty / timeout
//!       ▼                                                      ▼
//!    Failed ◀──────────────────── aggregation rule ───────▶ Completed
//! ```
//!
//! [`Conversation`] is the synchronous core; [`run_conversation`] is the task
//! that owns it and serializes messages, phase deadlines and the overall
//! timeout. Per-operation behavior comes from an [`OperationPolicy`].

mod actor;
mod context;
mod identifying;
mod machine;
mod monitor;
mod performing;
mod policy;

pub use actor::{run_conversation, ConversationInput};
pub use context::{ConversationContext, ConversationTimeouts};
pub use machine::Conversation;
pub use monitor::EventMonitor;
pub use policy::{
    AggregationRule, FinalClassifier, FinalOutcome, IdentifyClassifier, IdentifyOutcome,
    OperationPolicy, RequestBuilder,
};

pub(crate) use identifying::IdentifyingState;
pub(crate) use machine::Transition;
pub(crate) use performing::PerformingState;

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Arc, Mutex};

    use crate::bus::{BusResult, MessageSender};
    use crate::event::{EventHandler, OperationEvent, OperationEventType};
    use crate::message::{
        ContributorId, FinalResponse, IdentifyResponse, Message, MessageBody, OperationParams,
        OperationResult, ProgressResponse, ResponseCode, ResponseInfo, TimeMeasure,
    };

    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<Message>>,
    }

    impl RecordingSender {
        pub fn sent(&self) -> Vec<Message> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl MessageSender for RecordingSender {
        fn send_message(&self, message: Message) -> BusResult<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct RecordingHandler {
        pub events: Mutex<Vec<OperationEvent>>,
    }

    impl RecordingHandler {
        pub fn types(&self) -> Vec<OperationEventType> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| e.event_type())
                .collect()
        }

        pub fn events(&self) -> Vec<OperationEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventHandler for RecordingHandler {
        fn handle_event(&self, event: &OperationEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    /// Response to `request` from `contributor`, built the way a contributor would.
    pub fn reply(request: &Message, contributor: &ContributorId, body: MessageBody) -> Message {
        Message::reply(request, contributor.clone(), format!("{}-topic", contributor), body)
    }

    pub fn identify(
        request: &Message,
        contributor: &str,
        code: ResponseCode,
        time_to_deliver: Option<TimeMeasure>,
    ) -> Message {
        reply(
            request,
            &contributor.to_string(),
            MessageBody::IdentifyResponse(IdentifyResponse {
                contributor_id: contributor.to_string(),
                destination: format!("{}-topic", contributor),
                info: ResponseInfo::new(code, format!("{} answered", contributor)),
                time_to_deliver,
                checksum: None,
            }),
        )
    }

    /// Final response answering `request`, echoing its request number.
    pub fn final_response(
        request: &Message,
        contributor: &str,
        code: ResponseCode,
        result: OperationResult,
        partial_result: bool,
    ) -> Message {
        let request_number = match &request.body {
            MessageBody::OperationRequest(request) => request.request_number,
            _ => 0,
        };
        reply(
            request,
            &contributor.to_string(),
            MessageBody::FinalResponse(FinalResponse {
                contributor_id: contributor.to_string(),
                info: ResponseInfo::new(code, format!("{} finished", contributor)),
                result,
                partial_result,
                request_number,
            }),
        )
    }

    pub fn progress(request: &Message, contributor: &str) -> Message {
        reply(
            request,
            &contributor.to_string(),
            MessageBody::ProgressResponse(ProgressResponse {
                contributor_id: contributor.to_string(),
                info: ResponseInfo::new(ResponseCode::OperationAcceptedProgress, "accepted"),
            }),
        )
    }

    pub fn request_params(message: &Message) -> Option<&OperationParams> {
        match &message.body {
            MessageBody::OperationRequest(request) => Some(&request.params),
            MessageBody::IdentifyRequest(request) => Some(&request.params),
            _ => None,
        }
    }

    pub fn shared<T: Default>() -> Arc<T> {
        Arc::new(T::default())
    }
}
