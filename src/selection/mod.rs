//! # Component Selection
//!
//! Synchronous algorithms that consume identify responses one at a time and decide
//! which contributors should perform the operation.
//!
//! | Selector                | Picks                                    | Partial on timeout |
//! |-------------------------|------------------------------------------|--------------------|
//! | [`AllPositiveSelector`] | every positively identifying contributor | configurable       |
//! | [`FastestSelector`]     | smallest normalized time to deliver      | yes                |
//! | [`SpecificSelector`]    | the caller-named contributor             | yes                |
//!
//! Every selector keeps a [`ContributorResponseStatus`] and rejects responses from
//! unknown or already-processed contributors with [`UnexpectedResponseError`].
//! A selector is finished exactly when every expected contributor is accounted for,
//! by a response or by [`ComponentSelector::mark_timed_out`].

mod all_positive;
mod fastest;
mod ledger;
mod specific;

pub use all_positive::AllPositiveSelector;
pub use fastest::FastestSelector;
pub use ledger::ContributorResponseStatus;
pub use specific::SpecificSelector;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{
    ContributorId, Destination, IdentifyResponse, Message, MessageBody, MessageKind,
    OperationType,
};

/// One contributor chosen to perform the operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectedComponentInfo {
    pub id: ContributorId,
    pub destination: Destination,
}

impl SelectedComponentInfo {
    pub fn new(id: impl Into<ContributorId>, destination: impl Into<Destination>) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnexpectedResponseError {
    #[error("Response from unexpected contributor: {contributor_id}")]
    UnknownContributor { contributor_id: ContributorId },

    #[error("Contributor {contributor_id} has already been accounted for")]
    DuplicateResponse { contributor_id: ContributorId },

    #[error("Expected {expected}, received {actual}")]
    WrongMessageKind {
        expected: MessageKind,
        actual: MessageKind,
    },

    #[error("Expected a {expected} response, received a {actual} response")]
    WrongOperation {
        expected: OperationType,
        actual: OperationType,
    },
}

pub trait ComponentSelector: Send {
    fn process_response(&mut self, message: &Message) -> Result<(), UnexpectedResponseError>;

    fn is_finished(&self) -> bool;

    fn has_selected_component(&self) -> bool;

    fn selected_components(&self) -> Vec<SelectedComponentInfo>;

    fn outstanding_components(&self) -> Vec<ContributorId>;

    /// Accounts for every outstanding contributor as timed out and returns them.
    fn mark_timed_out(&mut self) -> Vec<ContributorId>;

    /// Whether the operation may proceed with the contributors selected so far
    /// when identification times out.
    fn allows_partial_selection(&self) -> bool;
}

/// Which selector an operation uses, resolved at conversation start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionStrategy {
    AllPositive { allow_partial: bool },
    Fastest,
    Specific(ContributorId),
}

impl SelectionStrategy {
    pub fn build(
        &self,
        operation: OperationType,
        expected: &[ContributorId],
    ) -> Box<dyn ComponentSelector> {
        match self {
            SelectionStrategy::AllPositive { allow_partial } => Box::new(
                AllPositiveSelector::new(operation, expected.iter().cloned())
                    .with_partial_selection(*allow_partial),
            ),
            SelectionStrategy::Fastest => {
                Box::new(FastestSelector::new(operation, expected.iter().cloned()))
            }
            SelectionStrategy::Specific(target) => Box::new(SpecificSelector::new(
                operation,
                expected.iter().cloned(),
                target.clone(),
            )),
        }
    }
}

/// Extracts the identify response, rejecting other message kinds and operations.
pub(crate) fn identify_response(
    operation: OperationType,
    message: &Message,
) -> Result<&IdentifyResponse, UnexpectedResponseError> {
    let MessageBody::IdentifyResponse(response) = &message.body else {
        return Err(UnexpectedResponseError::WrongMessageKind {
            expected: MessageKind::IdentifyResponse,
            actual: message.kind(),
        });
    };
    if message.operation != operation {
        return Err(UnexpectedResponseError::WrongOperation {
            expected: operation,
            actual: message.operation,
        });
    }
    Ok(response)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::message::{
        IdentifyResponse, Message, MessageBody, OperationType, ResponseCode, ResponseInfo,
        TimeMeasure,
    };

    pub fn identify_response(
        operation: OperationType,
        contributor_id: &str,
        code: ResponseCode,
        time_to_deliver: Option<TimeMeasure>,
    ) -> Message {
        Message {
            correlation_id: "conversation-1".to_string(),
            collection_id: "col".to_string(),
            from: contributor_id.to_string(),
            to: "client-topic".to_string(),
            reply_to: format!("{}-topic", contributor_id),
            operation,
            body: MessageBody::IdentifyResponse(IdentifyResponse {
                contributor_id: contributor_id.to_string(),
                destination: format!("{}-topic", contributor_id),
                info: ResponseInfo::new(code, ""),
                time_to_deliver,
                checksum: None,
            }),
        }
    }

    pub fn positive(operation: OperationType, contributor_id: &str) -> Message {
        identify_response(
            operation,
            contributor_id,
            ResponseCode::IdentificationPositive,
            None,
        )
    }
}
