use std::collections::HashMap;

use tracing::debug;

use crate::event::{ContributorResult, OperationEventKind};
use crate::message::{
    ContributorId, IdentifyRequest, IdentifyResponse, Message, MessageBody, OperationResult,
    ResponseCode,
};
use crate::selection::{ComponentSelector, SelectionStrategy};
use crate::ClientResult;

use super::{ConversationContext, IdentifyOutcome, Transition};

/// Identify phase: broadcast, collect responses, let the selector decide.
pub(crate) struct IdentifyingState {
    selector: Box<dyn ComponentSelector>,
    accepted: HashMap<ContributorId, IdentifyResponse>,
    already_done: Vec<ContributorId>,
    failed: Vec<ContributorId>,
    last_failure: Option<ResponseCode>,
}

impl IdentifyingState {
    pub fn start(context: &ConversationContext) -> ClientResult<Self> {
        let selector = context
            .policy
            .selection
            .build(context.operation(), &context.contributors);
        context.send(
            &context.collection_destination,
            MessageBody::IdentifyRequest(IdentifyRequest {
                params: context.params.clone(),
            }),
        )?;
        context.monitor.emit(
            OperationEventKind::IdentifyRequestSent,
            format!(
                "Identifying contributors for {} in {}",
                context.operation(),
                context.collection_id
            ),
        );
        Ok(Self {
            selector,
            accepted: HashMap::new(),
            already_done: Vec::new(),
            failed: Vec::new(),
            last_failure: None,
        })
    }

    pub fn on_message(&mut self, context: &ConversationContext, message: &Message) -> Transition {
        if let MessageBody::IdentifyResponse(response) = &message.body {
            if context.bystanders.contains(&response.contributor_id) {
                debug!(
                    "Ignoring identify response from {}, not queried",
                    response.contributor_id
                );
                return Transition::Stay;
            }
            if self.accepted.get(&response.contributor_id) == Some(response) {
                context.monitor.warning(
                    Some(response.contributor_id.as_str()),
                    "Ignoring redelivered identify response",
                );
                return Transition::Stay;
            }
        }

        if let Err(e) = self.selector.process_response(message) {
            return Transition::Fail {
                info: e.to_string(),
                code: None,
            };
        }
        let MessageBody::IdentifyResponse(response) = &message.body else {
            return Transition::Stay;
        };
        self.accepted
            .insert(response.contributor_id.clone(), response.clone());

        if is_tracked(context, &response.contributor_id) {
            self.classify(context, response);
        } else {
            debug!(
                "{} answered {}, not the named contributor",
                response.contributor_id, response.info.code
            );
        }

        if self.selector.is_finished() {
            self.decide()
        } else {
            Transition::Stay
        }
    }

    fn classify(&mut self, context: &ConversationContext, response: &IdentifyResponse) {
        let contributor_id = response.contributor_id.clone();
        match (context.policy.classify_identify)(&context.params, response) {
            IdentifyOutcome::Candidate => context.monitor.emit(
                OperationEventKind::ComponentIdentified { contributor_id },
                response.info.text.clone(),
            ),
            IdentifyOutcome::AlreadyDone => {
                self.already_done.push(contributor_id.clone());
                context.monitor.emit(
                    OperationEventKind::ComponentComplete(ContributorResult {
                        contributor_id,
                        result: response
                            .checksum
                            .clone()
                            .map(|checksum| OperationResult::Checksum(Some(checksum)))
                            .unwrap_or_default(),
                        partial: false,
                    }),
                    format!("Already performed: {}", response.info.text),
                );
            }
            IdentifyOutcome::Declined => {
                self.failed.push(contributor_id.clone());
                self.last_failure = Some(response.info.code);
                context.monitor.emit(
                    OperationEventKind::ComponentFailed {
                        contributor_id,
                        code: Some(response.info.code),
                    },
                    response.info.text.clone(),
                );
            }
            IdentifyOutcome::Unsupported => {
                debug!(
                    "{} does not support {}",
                    response.contributor_id,
                    context.operation()
                );
            }
        }
    }

    pub fn on_timeout(&mut self, context: &ConversationContext) -> Transition {
        context.monitor.emit(
            OperationEventKind::IdentifyTimeout,
            format!(
                "Identification timed out after {:?}, waiting for {:?}",
                context.timeouts.identification,
                self.selector.outstanding_components()
            ),
        );
        for contributor_id in self.selector.mark_timed_out() {
            if !is_tracked(context, &contributor_id) {
                continue;
            }
            self.failed.push(contributor_id.clone());
            context.monitor.emit(
                OperationEventKind::ComponentFailed {
                    contributor_id,
                    code: None,
                },
                "No identify response before timeout",
            );
        }

        if self.selector.has_selected_component() && self.selector.allows_partial_selection() {
            Transition::Perform(self.selector.selected_components())
        } else {
            Transition::Fail {
                info: "Identification timed out without a usable selection".to_string(),
                code: None,
            }
        }
    }

    /// Transition for a selector that already has every answer.
    pub fn decide(&self) -> Transition {
        if self.selector.has_selected_component() {
            Transition::Perform(self.selector.selected_components())
        } else if !self.already_done.is_empty() && self.failed.is_empty() {
            Transition::Complete(format!(
                "Operation already performed by {:?}",
                self.already_done
            ))
        } else {
            Transition::Fail {
                info: "No viable contributor identified".to_string(),
                code: self.last_failure,
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.selector.is_finished()
    }

    pub fn already_done(&self) -> usize {
        self.already_done.len()
    }

    pub fn failed(&self) -> usize {
        self.failed.len()
    }
}

/// Whether a contributor's identify outcome counts toward the operation.
/// An operation aimed at one named contributor only tracks that one.
fn is_tracked(context: &ConversationContext, contributor_id: &str) -> bool {
    match &context.policy.selection {
        SelectionStrategy::Specific(target) => target == contributor_id,
        _ => true,
    }
}
