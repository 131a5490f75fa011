use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{ContributorId, CorrelationId, OperationResult, OperationType, ResponseCode};

/// Type tag of an [`OperationEvent`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationEventType {
    IdentifyRequestSent,
    ComponentIdentified,
    IdentificationComplete,
    RequestSent,
    Progress,
    ComponentComplete,
    ComponentFailed,
    Complete,
    Failed,
    IdentifyTimeout,
    Warning,
}

/// Result delivered by one contributor, carried by `ComponentComplete`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributorResult {
    pub contributor_id: ContributorId,
    pub result: OperationResult,
    /// More pages follow for this contributor.
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationEventKind {
    IdentifyRequestSent,
    ComponentIdentified {
        contributor_id: ContributorId,
    },
    IdentificationComplete {
        selected: Vec<ContributorId>,
    },
    RequestSent {
        contributor_ids: Vec<ContributorId>,
    },
    Progress {
        contributor_id: ContributorId,
        code: ResponseCode,
    },
    ComponentComplete(ContributorResult),
    ComponentFailed {
        contributor_id: ContributorId,
        code: Option<ResponseCode>,
    },
    Complete,
    Failed {
        code: Option<ResponseCode>,
    },
    IdentifyTimeout,
    Warning {
        contributor_id: Option<ContributorId>,
    },
}

impl OperationEventKind {
    pub fn event_type(&self) -> OperationEventType {
        match self {
            OperationEventKind::IdentifyRequestSent => OperationEventType::IdentifyRequestSent,
            OperationEventKind::ComponentIdentified { .. } => {
                OperationEventType::ComponentIdentified
            }
            OperationEventKind::IdentificationComplete { .. } => {
                OperationEventType::IdentificationComplete
            }
            OperationEventKind::RequestSent { .. } => OperationEventType::RequestSent,
            OperationEventKind::Progress { .. } => OperationEventType::Progress,
            OperationEventKind::ComponentComplete(_) => OperationEventType::ComponentComplete,
            OperationEventKind::ComponentFailed { .. } => OperationEventType::ComponentFailed,
            OperationEventKind::Complete => OperationEventType::Complete,
            OperationEventKind::Failed { .. } => OperationEventType::Failed,
            OperationEventKind::IdentifyTimeout => OperationEventType::IdentifyTimeout,
            OperationEventKind::Warning { .. } => OperationEventType::Warning,
        }
    }
}

/// One lifecycle event of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEvent {
    pub conversation_id: CorrelationId,
    pub operation: OperationType,
    pub info: String,
    pub kind: OperationEventKind,
    pub timestamp: DateTime<Utc>,
}

impl OperationEvent {
    pub fn new(
        conversation_id: impl Into<CorrelationId>,
        operation: OperationType,
        kind: OperationEventKind,
        info: impl Into<String>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            operation,
            info: info.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    pub fn event_type(&self) -> OperationEventType {
        self.kind.event_type()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            OperationEventKind::Complete | OperationEventKind::Failed { .. }
        )
    }

    pub fn contributor_id(&self) -> Option<&str> {
        match &self.kind {
            OperationEventKind::ComponentIdentified { contributor_id }
            | OperationEventKind::Progress { contributor_id, .. }
            | OperationEventKind::ComponentFailed { contributor_id, .. } => Some(contributor_id),
            OperationEventKind::ComponentComplete(result) => Some(&result.contributor_id),
            OperationEventKind::Warning { contributor_id } => contributor_id.as_deref(),
            _ => None,
        }
    }

    pub fn response_code(&self) -> Option<ResponseCode> {
        match &self.kind {
            OperationEventKind::Progress { code, .. } => Some(*code),
            OperationEventKind::ComponentFailed { code, .. }
            | OperationEventKind::Failed { code } => *code,
            _ => None,
        }
    }

    pub fn contributor_result(&self) -> Option<&ContributorResult> {
        match &self.kind {
            OperationEventKind::ComponentComplete(result) => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(OperationEventType::IdentifyRequestSent.to_string(), "IDENTIFY_REQUEST_SENT");
        assert_eq!(OperationEventType::ComponentFailed.to_string(), "COMPONENT_FAILED");
        assert_eq!(OperationEventType::Complete.to_string(), "COMPLETE");
    }

    #[test]
    fn test_accessors() {
        let failed = OperationEvent::new(
            "c1",
            OperationType::GetFile,
            OperationEventKind::ComponentFailed {
                contributor_id: "p1".to_string(),
                code: Some(ResponseCode::FileNotFoundFailure),
            },
            "no such file",
        );
        assert_eq!(failed.event_type(), OperationEventType::ComponentFailed);
        assert_eq!(failed.contributor_id(), Some("p1"));
        assert_eq!(failed.response_code(), Some(ResponseCode::FileNotFoundFailure));
        assert!(!failed.is_terminal());

        let complete = OperationEvent::new(
            "c1",
            OperationType::GetFile,
            OperationEventKind::Complete,
            "done",
        );
        assert!(complete.is_terminal());
        assert_eq!(complete.contributor_id(), None);
    }
}
