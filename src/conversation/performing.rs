use tracing::{debug, warn};

use crate::event::{ContributorResult, OperationEventKind};
use crate::message::{
    ContributorId, Destination, FinalResponse, Message, MessageBody, OperationRequest,
    ResponseCode, ResultCursor,
};
use crate::selection::SelectedComponentInfo;

use super::{ConversationContext, FinalOutcome, Transition};

struct Outstanding {
    id: ContributorId,
    destination: Destination,
    /// Attempts at the current page; reset when paging moves on.
    attempts: u32,
    /// Number of the latest request; only its answer is accepted.
    request_number: u32,
    cursor: Option<ResultCursor>,
}

/// Operation phase: one request per selected contributor, aggregated by policy.
pub(crate) struct PerformingState {
    outstanding: Vec<Outstanding>,
    closed: Vec<ContributorId>,
    completed: usize,
    failed: usize,
    last_failure: Option<(String, ResponseCode)>,
}

impl PerformingState {
    /// Sends the operation request to every selected contributor.
    ///
    /// `completed` and `failed` carry the identify phase's already-done and
    /// declined contributors into the final aggregation.
    pub fn start(
        context: &ConversationContext,
        selected: Vec<SelectedComponentInfo>,
        completed: usize,
        failed: usize,
    ) -> Self {
        let mut state = Self {
            outstanding: Vec::new(),
            closed: Vec::new(),
            completed,
            failed,
            last_failure: None,
        };

        let mut sent = Vec::new();
        for component in selected {
            let mut entry = Outstanding {
                id: component.id,
                destination: component.destination,
                attempts: 0,
                request_number: 0,
                cursor: None,
            };
            if state.send_request(context, &mut entry) {
                sent.push(entry.id.clone());
                state.outstanding.push(entry);
            } else {
                state.close_failed(context, entry.id, None, "Request could not be sent");
            }
        }
        if !sent.is_empty() {
            context.monitor.emit(
                OperationEventKind::RequestSent {
                    contributor_ids: sent.clone(),
                },
                format!("{} request sent to {:?}", context.operation(), sent),
            );
        }
        state
    }

    pub fn on_message(&mut self, context: &ConversationContext, message: &Message) -> Transition {
        match &message.body {
            MessageBody::IdentifyResponse(response) => {
                debug!(
                    "Ignoring late identify response from {}",
                    response.contributor_id
                );
            }
            MessageBody::ProgressResponse(progress) => {
                if self.position(&progress.contributor_id).is_some() {
                    context.monitor.emit(
                        OperationEventKind::Progress {
                            contributor_id: progress.contributor_id.clone(),
                            code: progress.info.code,
                        },
                        progress.info.text.clone(),
                    );
                } else {
                    debug!(
                        "Ignoring progress from {} outside the operation",
                        progress.contributor_id
                    );
                }
            }
            MessageBody::FinalResponse(response) => self.on_final(context, response),
            MessageBody::IdentifyRequest(_) | MessageBody::OperationRequest(_) => {
                warn!(
                    "Unexpected {} on the reply destination of {}",
                    message.kind(),
                    context.conversation_id
                );
            }
        }
        self.check_done(context)
    }

    fn on_final(&mut self, context: &ConversationContext, response: &FinalResponse) {
        let Some(index) = self.position(&response.contributor_id) else {
            let info = if self.closed.contains(&response.contributor_id) {
                "Repeated final response from a contributor already finished"
            } else {
                "Final response from a contributor not performing this operation"
            };
            context
                .monitor
                .warning(Some(response.contributor_id.as_str()), info);
            return;
        };
        if response.request_number != self.outstanding[index].request_number {
            context.monitor.warning(
                Some(response.contributor_id.as_str()),
                format!(
                    "Ignoring final response to superseded request {}",
                    response.request_number
                ),
            );
            return;
        }

        match (context.policy.classify_final)(response) {
            FinalOutcome::Success => {
                let cursor = match response.partial_result {
                    true => response.result.next_cursor(),
                    false => None,
                };
                if response.partial_result && cursor.is_none() {
                    context.monitor.warning(
                        Some(response.contributor_id.as_str()),
                        "Partial result without a continuation point, treating as final",
                    );
                }
                let partial = cursor.is_some();
                context.monitor.emit(
                    OperationEventKind::ComponentComplete(ContributorResult {
                        contributor_id: response.contributor_id.clone(),
                        result: response.result.clone(),
                        partial,
                    }),
                    response.info.text.clone(),
                );
                if partial {
                    let mut entry = self.outstanding.remove(index);
                    entry.cursor = cursor;
                    entry.attempts = 0;
                    if self.send_request(context, &mut entry) {
                        self.outstanding.push(entry);
                    } else {
                        self.close_failed(context, entry.id, None, "Follow-up request could not be sent");
                    }
                } else {
                    let entry = self.outstanding.remove(index);
                    self.closed.push(entry.id);
                    self.completed += 1;
                }
            }
            FinalOutcome::Retryable
                if self.outstanding[index].attempts < context.policy.max_attempts =>
            {
                let mut entry = self.outstanding.remove(index);
                context.monitor.warning(
                    Some(entry.id.as_str()),
                    format!(
                        "Attempt {} of {} failed ({}), retrying",
                        entry.attempts, context.policy.max_attempts, response.info.text
                    ),
                );
                if self.send_request(context, &mut entry) {
                    self.outstanding.push(entry);
                } else {
                    self.close_failed(context, entry.id, None, "Retry could not be sent");
                }
            }
            FinalOutcome::Retryable | FinalOutcome::Failure => {
                let entry = self.outstanding.remove(index);
                self.close_failed(
                    context,
                    entry.id,
                    Some(response.info.code),
                    &response.info.text,
                );
            }
        }
    }

    pub fn on_timeout(&mut self, context: &ConversationContext) -> Transition {
        for entry in std::mem::take(&mut self.outstanding) {
            self.close_failed(
                context,
                entry.id,
                None,
                &format!(
                    "No final response within {:?}",
                    context.timeouts.operation
                ),
            );
        }
        self.check_done(context)
    }

    pub fn check_done(&self, context: &ConversationContext) -> Transition {
        if !self.outstanding.is_empty() {
            return Transition::Stay;
        }
        if context
            .policy
            .aggregation
            .is_success(self.completed, self.failed)
        {
            Transition::Complete(format!(
                "{} completed by {} contributor(s)",
                context.operation(),
                self.completed
            ))
        } else {
            let (info, code) = match &self.last_failure {
                Some((info, code)) => (info.clone(), Some(*code)),
                None => ("No final response".to_string(), None),
            };
            Transition::Fail {
                info: format!(
                    "{} of {} contributor(s) failed: {}",
                    self.failed,
                    self.completed + self.failed,
                    info
                ),
                code,
            }
        }
    }

    fn position(&self, contributor_id: &str) -> Option<usize> {
        self.outstanding.iter().position(|o| o.id == contributor_id)
    }

    fn send_request(&self, context: &ConversationContext, entry: &mut Outstanding) -> bool {
        entry.attempts += 1;
        entry.request_number += 1;
        let params = context.request_params(&entry.id, entry.cursor.as_ref());
        match context.send(
            &entry.destination,
            MessageBody::OperationRequest(OperationRequest {
                contributor_id: entry.id.clone(),
                params,
                request_number: entry.request_number,
            }),
        ) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to send request to {}: {}", entry.id, e);
                false
            }
        }
    }

    fn close_failed(
        &mut self,
        context: &ConversationContext,
        contributor_id: ContributorId,
        code: Option<ResponseCode>,
        info: &str,
    ) {
        if let Some(code) = code {
            self.last_failure = Some((info.to_string(), code));
        }
        self.failed += 1;
        self.closed.push(contributor_id.clone());
        context.monitor.emit(
            OperationEventKind::ComponentFailed {
                contributor_id,
                code,
            },
            info,
        );
    }
}
