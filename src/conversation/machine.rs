use tokio::time::Instant;
use tracing::{debug, warn};

use crate::event::OperationEventKind;
use crate::message::{CorrelationId, Message, OperationType, ResponseCode};
use crate::selection::SelectedComponentInfo;

use super::{ConversationContext, IdentifyingState, PerformingState};

/// What a phase asks the conversation to do after handling an input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Transition {
    Stay,
    Perform(Vec<SelectedComponentInfo>),
    Complete(String),
    Fail {
        info: String,
        code: Option<ResponseCode>,
    },
}

enum Phase {
    Created,
    Identifying(IdentifyingState),
    Performing(PerformingState),
    Completed,
    Failed,
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Created => "created",
            Phase::Identifying(_) => "identifying",
            Phase::Performing(_) => "performing",
            Phase::Completed => "completed",
            Phase::Failed => "failed",
        }
    }
}

/// One Identify -> Perform -> Complete state machine.
///
/// Purely synchronous: inputs are messages, phase timeouts and external
/// failures. The caller owns scheduling, see [`super::run_conversation`].
/// Phases only move forward; once ended every input is ignored.
pub struct Conversation {
    context: ConversationContext,
    phase: Phase,
    deadline: Option<Instant>,
}

impl Conversation {
    pub fn new(context: ConversationContext) -> Self {
        Self {
            context,
            phase: Phase::Created,
            deadline: None,
        }
    }

    pub fn id(&self) -> &CorrelationId {
        &self.context.conversation_id
    }

    pub fn operation(&self) -> OperationType {
        self.context.operation()
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    pub fn phase_name(&self) -> &'static str {
        self.phase.name()
    }

    /// Deadline of the current phase, if one is running.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn has_ended(&self) -> bool {
        matches!(self.phase, Phase::Completed | Phase::Failed)
    }

    pub fn start(&mut self) {
        if !matches!(self.phase, Phase::Created) {
            warn!("Conversation {} already started", self.id());
            return;
        }
        match IdentifyingState::start(&self.context) {
            Ok(state) => {
                let finished = state.is_finished();
                let transition = state.decide();
                self.phase = Phase::Identifying(state);
                self.deadline = Some(Instant::now() + self.context.timeouts.identification);
                if finished {
                    self.apply(transition);
                }
            }
            Err(e) => self.apply(Transition::Fail {
                info: format!("Identify request could not be sent: {}", e),
                code: None,
            }),
        }
    }

    pub fn on_message(&mut self, message: Message) {
        if message.correlation_id != self.context.conversation_id {
            warn!(
                "Conversation {} received a message for {}",
                self.context.conversation_id, message.correlation_id
            );
            return;
        }
        let transition = match &mut self.phase {
            Phase::Identifying(state) => state.on_message(&self.context, &message),
            Phase::Performing(state) => state.on_message(&self.context, &message),
            Phase::Created => {
                warn!(
                    "Conversation {} not started, dropping {}",
                    self.context.conversation_id,
                    message.kind()
                );
                return;
            }
            Phase::Completed | Phase::Failed => {
                debug!(
                    "Conversation {} has ended, ignoring {} from {}",
                    self.context.conversation_id,
                    message.kind(),
                    message.from
                );
                return;
            }
        };
        self.apply(transition);
    }

    /// The current phase's deadline has passed.
    pub fn on_timeout(&mut self) {
        let transition = match &mut self.phase {
            Phase::Identifying(state) => state.on_timeout(&self.context),
            Phase::Performing(state) => state.on_timeout(&self.context),
            _ => return,
        };
        self.apply(transition);
    }

    /// Ends the conversation from outside, e.g. on shutdown or overall timeout.
    pub fn fail(&mut self, info: &str) {
        if self.has_ended() {
            return;
        }
        self.apply(Transition::Fail {
            info: info.to_string(),
            code: None,
        });
    }

    fn apply(&mut self, transition: Transition) {
        match transition {
            Transition::Stay => {}
            Transition::Perform(selected) => {
                let (completed, failed) = match &self.phase {
                    Phase::Identifying(state) => (state.already_done(), state.failed()),
                    _ => (0, 0),
                };
                self.context.monitor.emit(
                    OperationEventKind::IdentificationComplete {
                        selected: selected.iter().map(|s| s.id.clone()).collect(),
                    },
                    format!("Selected {} contributor(s)", selected.len()),
                );
                let state = PerformingState::start(&self.context, selected, completed, failed);
                let transition = state.check_done(&self.context);
                self.phase = Phase::Performing(state);
                self.deadline = Some(Instant::now() + self.context.timeouts.operation);
                self.apply(transition);
            }
            Transition::Complete(info) => {
                self.phase = Phase::Completed;
                self.deadline = None;
                self.context.monitor.emit(OperationEventKind::Complete, info);
            }
            Transition::Fail { info, code } => {
                self.phase = Phase::Failed;
                self.deadline = None;
                self.context
                    .monitor
                    .emit(OperationEventKind::Failed { code }, info);
            }
        }
    }
}
