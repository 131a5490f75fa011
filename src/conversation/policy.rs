//! Per-operation customization of the generic conversation engine.
//!
//! An [`OperationPolicy`] is plain data: a selection strategy, an aggregation
//! rule, a request builder and two response classifiers. Every operation kind
//! is one constructor here rather than its own state type.

use std::fmt;

use tracing::debug;

use crate::message::{
    ContributorQuery, FinalResponse, IdentifyResponse, OperationParams, OperationType,
    ResponseCode,
};
use crate::selection::SelectionStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum AggregationRule {
    /// Every contributor must succeed.
    All,
    /// At least one contributor must succeed.
    One,
}

impl AggregationRule {
    pub fn is_success(&self, completed: usize, failed: usize) -> bool {
        match self {
            AggregationRule::All => failed == 0 && completed > 0,
            AggregationRule::One => completed > 0,
        }
    }
}

/// How an identify response counts for the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyOutcome {
    Candidate,
    /// The contributor already holds the requested end state.
    AlreadyDone,
    Declined,
    /// Counted, but not reported as a failure.
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalOutcome {
    Success,
    Retryable,
    Failure,
}

pub type RequestBuilder = fn(&OperationParams, Option<&ContributorQuery>) -> OperationParams;
pub type IdentifyClassifier = fn(&OperationParams, &IdentifyResponse) -> IdentifyOutcome;
pub type FinalClassifier = fn(&FinalResponse) -> FinalOutcome;

#[derive(Clone)]
pub struct OperationPolicy {
    pub selection: SelectionStrategy,
    pub aggregation: AggregationRule,
    pub build_request: RequestBuilder,
    pub classify_identify: IdentifyClassifier,
    pub classify_final: FinalClassifier,
    /// Total attempts per contributor, including the first.
    pub max_attempts: u32,
}

impl fmt::Debug for OperationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationPolicy")
            .field("selection", &self.selection)
            .field("aggregation", &self.aggregation)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl OperationPolicy {
    fn new(selection: SelectionStrategy, aggregation: AggregationRule) -> Self {
        Self {
            selection,
            aggregation,
            build_request: with_contributor_query,
            classify_identify: default_identify,
            classify_final: default_final,
            max_attempts: 1,
        }
    }

    pub fn get_file() -> Self {
        Self::new(SelectionStrategy::Fastest, AggregationRule::One)
    }

    pub fn put_file(partial_put_allowed: bool) -> Self {
        Self {
            classify_identify: put_identify,
            classify_final: transfer_retryable,
            ..Self::new(
                SelectionStrategy::AllPositive {
                    allow_partial: partial_put_allowed,
                },
                AggregationRule::All,
            )
        }
    }

    pub fn replace_file(contributor_id: impl Into<String>) -> Self {
        Self {
            classify_final: transfer_retryable,
            ..Self::new(
                SelectionStrategy::Specific(contributor_id.into()),
                AggregationRule::One,
            )
        }
    }

    pub fn delete_file(contributor_id: impl Into<String>) -> Self {
        Self {
            classify_identify: delete_identify,
            ..Self::new(
                SelectionStrategy::Specific(contributor_id.into()),
                AggregationRule::All,
            )
        }
    }

    /// Read-only collection queries may proceed with the contributors that answered.
    pub fn collection_query() -> Self {
        Self::new(
            SelectionStrategy::AllPositive {
                allow_partial: true,
            },
            AggregationRule::All,
        )
    }

    /// Status is gathered like any other collection query.
    pub fn get_status() -> Self {
        Self::collection_query()
    }

    pub fn for_operation(operation: OperationType, partial_put_allowed: bool) -> Option<Self> {
        match operation {
            OperationType::GetFile => Some(Self::get_file()),
            OperationType::PutFile => Some(Self::put_file(partial_put_allowed)),
            OperationType::GetChecksums
            | OperationType::GetFileIds
            | OperationType::GetAuditTrails => Some(Self::collection_query()),
            OperationType::GetStatus => Some(Self::get_status()),
            // Need a named contributor.
            OperationType::ReplaceFile | OperationType::DeleteFile => None,
        }
    }

    pub fn with_retries(mut self, retry_count: u32) -> Self {
        self.max_attempts = retry_count.saturating_add(1);
        self
    }
}

fn with_contributor_query(
    params: &OperationParams,
    query: Option<&ContributorQuery>,
) -> OperationParams {
    params.clone().with_query(query.cloned())
}

fn default_identify(_: &OperationParams, response: &IdentifyResponse) -> IdentifyOutcome {
    match response.info.code {
        ResponseCode::IdentificationPositive => IdentifyOutcome::Candidate,
        ResponseCode::RequestNotSupported => IdentifyOutcome::Unsupported,
        _ => IdentifyOutcome::Declined,
    }
}

fn put_identify(params: &OperationParams, response: &IdentifyResponse) -> IdentifyOutcome {
    if response.info.code == ResponseCode::DuplicateFileFailure {
        let supplied = match params {
            OperationParams::PutFile {
                checksum_for_validation,
                ..
            } => checksum_for_validation.as_ref(),
            _ => None,
        };
        if let (Some(supplied), Some(existing)) = (supplied, response.checksum.as_ref()) {
            if supplied.same_value(existing) {
                debug!("{} already holds the file", response.contributor_id);
                return IdentifyOutcome::AlreadyDone;
            }
        }
    }
    default_identify(params, response)
}

fn delete_identify(params: &OperationParams, response: &IdentifyResponse) -> IdentifyOutcome {
    if response.info.code == ResponseCode::FileNotFoundFailure {
        return IdentifyOutcome::AlreadyDone;
    }
    default_identify(params, response)
}

fn default_final(response: &FinalResponse) -> FinalOutcome {
    if response.info.code.is_success() {
        FinalOutcome::Success
    } else {
        FinalOutcome::Failure
    }
}

fn transfer_retryable(response: &FinalResponse) -> FinalOutcome {
    match response.info.code {
        ResponseCode::FileTransferFailure => FinalOutcome::Retryable,
        _ => default_final(response),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{ChecksumData, OperationResult, ResponseInfo};

    fn identify(code: ResponseCode, checksum: Option<ChecksumData>) -> IdentifyResponse {
        IdentifyResponse {
            contributor_id: "p1".to_string(),
            destination: "p1-topic".to_string(),
            info: ResponseInfo::new(code, ""),
            time_to_deliver: None,
            checksum,
        }
    }

    fn put_params(checksum: Option<&str>) -> OperationParams {
        OperationParams::PutFile {
            file_id: "f1".to_string(),
            file_address: "http://files/f1".to_string(),
            file_size: 10,
            checksum_for_validation: checksum.map(ChecksumData::new),
            checksum_request: None,
        }
    }

    #[test]
    fn test_aggregation_rules() {
        assert!(AggregationRule::All.is_success(3, 0));
        assert!(!AggregationRule::All.is_success(2, 1));
        assert!(AggregationRule::One.is_success(1, 2));
        assert!(!AggregationRule::One.is_success(0, 1));
    }

    #[test]
    fn test_put_duplicate_with_same_checksum_is_already_done() {
        let policy = OperationPolicy::put_file(false);
        let params = put_params(Some("ABCD"));
        let same = identify(
            ResponseCode::DuplicateFileFailure,
            Some(ChecksumData::new("abcd")),
        );
        let other = identify(
            ResponseCode::DuplicateFileFailure,
            Some(ChecksumData::new("ffff")),
        );
        assert_eq!(
            (policy.classify_identify)(&params, &same),
            IdentifyOutcome::AlreadyDone
        );
        assert_eq!(
            (policy.classify_identify)(&params, &other),
            IdentifyOutcome::Declined
        );
        assert_eq!(
            (policy.classify_identify)(&put_params(None), &same),
            IdentifyOutcome::Declined
        );
    }

    #[test]
    fn test_identify_classes() {
        let policy = OperationPolicy::get_file();
        let params = OperationParams::GetStatus;
        assert_eq!(
            (policy.classify_identify)(&params, &identify(ResponseCode::IdentificationPositive, None)),
            IdentifyOutcome::Candidate
        );
        assert_eq!(
            (policy.classify_identify)(&params, &identify(ResponseCode::RequestNotSupported, None)),
            IdentifyOutcome::Unsupported
        );
        assert_eq!(
            (OperationPolicy::delete_file("p1").classify_identify)(
                &params,
                &identify(ResponseCode::FileNotFoundFailure, None)
            ),
            IdentifyOutcome::AlreadyDone
        );
    }

    #[test]
    fn test_transfer_failure_is_retryable_for_puts_only() {
        let response = FinalResponse {
            contributor_id: "p1".to_string(),
            info: ResponseInfo::new(ResponseCode::FileTransferFailure, "connection reset"),
            result: OperationResult::None,
            partial_result: false,
            request_number: 1,
        };
        assert_eq!(
            (OperationPolicy::put_file(false).classify_final)(&response),
            FinalOutcome::Retryable
        );
        assert_eq!(
            (OperationPolicy::get_file().classify_final)(&response),
            FinalOutcome::Failure
        );
    }

    #[test]
    fn test_status_follows_the_collection_query_policy() {
        let status = OperationPolicy::get_status();
        let query = OperationPolicy::collection_query();
        assert_eq!(status.selection, query.selection);
        assert_eq!(status.aggregation, query.aggregation);
        assert_eq!(status.max_attempts, query.max_attempts);
    }

    #[test]
    fn test_request_builder_applies_query() {
        let policy = OperationPolicy::collection_query().with_retries(2);
        assert_eq!(policy.max_attempts, 3);
        let params = OperationParams::GetAuditTrails {
            file_id: None,
            query: None,
        };
        let query = ContributorQuery::new("p1");
        let built = (policy.build_request)(&params, Some(&query));
        assert_eq!(built.query(), Some(&query));
    }
}
